//! Shared pipe state.
//!
//! Both ends hold an `Arc<Shared>`. Every transition happens under the one
//! mutex, which makes the close-family operations first-wins without any
//! ordering assumptions between producer and consumer.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use hyper::body::Bytes;

use crate::error::{PipeError, TerminalError};

/// How the write side ended.
#[derive(Debug, Clone)]
pub(crate) enum Termination {
    Eof,
    Error(TerminalError),
}

#[derive(Debug, Default)]
struct State {
    /// Bytes offered by the writer and not yet consumed by the reader.
    chunk: Bytes,
    /// A write is waiting for `chunk` to be consumed.
    in_flight: bool,
    /// Latched by the first close; `Some` means writer-closed.
    writer_closed: Option<Termination>,
    /// Full teardown.
    closed: bool,
    read_waker: Option<Waker>,
    write_waker: Option<Waker>,
}

impl State {
    fn wake_reader(&mut self) {
        if let Some(waker) = self.read_waker.take() {
            waker.wake();
        }
    }

    fn wake_writer(&mut self) {
        if let Some(waker) = self.write_waker.take() {
            waker.wake();
        }
    }
}

/// Outcome of offering a chunk to the reader.
pub(crate) enum Offer {
    /// The writer side is closed, the bytes were discarded.
    Discarded,
    /// The bytes are in flight.
    Pending,
}

#[derive(Debug, Default)]
pub(crate) struct Shared {
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // No critical section panics midway, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Place `data` in flight for the reader.
    pub(crate) fn offer(&self, data: &[u8]) -> Offer {
        let mut state = self.lock();
        // A full close latches `writer_closed` too, so this covers both.
        if state.writer_closed.is_some() {
            return Offer::Discarded;
        }
        state.chunk = Bytes::copy_from_slice(data);
        state.in_flight = true;
        state.wake_reader();
        Offer::Pending
    }

    /// Ready once the reader consumed the whole in-flight chunk.
    pub(crate) fn poll_consumed(&self, cx: &mut Context<'_>) -> Poll<Result<(), PipeError>> {
        let mut state = self.lock();
        if !state.in_flight {
            return Poll::Ready(Ok(()));
        }
        if state.closed || state.writer_closed.is_some() {
            state.in_flight = false;
            state.chunk = Bytes::new();
            return Poll::Ready(Err(PipeError::Closed));
        }
        state.write_waker = Some(cx.waker().clone());
        Poll::Pending
    }

    /// Drop whatever is still in flight; used when a write is abandoned.
    pub(crate) fn retract(&self) {
        let mut state = self.lock();
        state.in_flight = false;
        state.chunk = Bytes::new();
        state.write_waker = None;
    }

    /// Copy in-flight bytes into `buf`.
    pub(crate) fn poll_read(
        &self,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<Result<usize, PipeError>> {
        let mut state = self.lock();
        if state.closed {
            return Poll::Ready(Err(PipeError::Closed));
        }
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        if !state.chunk.is_empty() {
            let n = buf.len().min(state.chunk.len());
            let head = state.chunk.split_to(n);
            buf[..n].copy_from_slice(&head);
            if state.chunk.is_empty() {
                state.in_flight = false;
                state.wake_writer();
            }
            return Poll::Ready(Ok(n));
        }
        match &state.writer_closed {
            Some(Termination::Eof) => Poll::Ready(Ok(0)),
            Some(Termination::Error(err)) => Poll::Ready(Err(PipeError::Terminated(err.clone()))),
            None => {
                state.read_waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }

    /// Take the whole in-flight chunk. `Ok(None)` is end-of-stream.
    pub(crate) fn poll_chunk(&self, cx: &mut Context<'_>) -> Poll<Result<Option<Bytes>, PipeError>> {
        let mut state = self.lock();
        if state.closed {
            return Poll::Ready(Err(PipeError::Closed));
        }
        if !state.chunk.is_empty() {
            let chunk = std::mem::take(&mut state.chunk);
            state.in_flight = false;
            state.wake_writer();
            return Poll::Ready(Ok(Some(chunk)));
        }
        match &state.writer_closed {
            Some(Termination::Eof) => Poll::Ready(Ok(None)),
            Some(Termination::Error(err)) => Poll::Ready(Err(PipeError::Terminated(err.clone()))),
            None => {
                state.read_waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }

    /// Latch the writer side. Returns `true` for the call that won.
    pub(crate) fn close_write(&self, termination: Termination) -> bool {
        let mut state = self.lock();
        if state.writer_closed.is_some() {
            return false;
        }
        state.writer_closed = Some(termination);
        state.wake_reader();
        state.wake_writer();
        true
    }

    /// Full teardown, implying writer-close with end-of-stream.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        if state.writer_closed.is_none() {
            state.writer_closed = Some(Termination::Eof);
        }
        state.closed = true;
        state.chunk = Bytes::new();
        state.wake_reader();
        state.wake_writer();
    }

    pub(crate) fn is_writer_closed(&self) -> bool {
        self.lock().writer_closed.is_some()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// `true` once the reader has nothing left to observe but end-of-stream.
    pub(crate) fn is_end_stream(&self) -> bool {
        let state = self.lock();
        state.chunk.is_empty() && matches!(state.writer_closed, Some(Termination::Eof))
    }
}
