//! Producer end of the pipe.

use std::future::poll_fn;
use std::pin::pin;
use std::sync::Arc;

use hyper::body::{Body, Buf};

use crate::error::{BoxError, PipeError, TerminalError};
use crate::pipe::state::{Offer, Shared, Termination};

/// Write half of a [`pipe`](crate::pipe::pipe).
///
/// Methods take `&self`; the writer can sit behind an `Arc` next to other
/// response state. Dropping it does not close anything, the owner is expected
/// to finish with [`close_write`](Self::close_write) or
/// [`close_with_error`](Self::close_with_error).
#[derive(Debug)]
pub struct PipeWriter {
    shared: Arc<Shared>,
}

impl PipeWriter {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Hand `data` to the reader and wait until all of it was read.
    ///
    /// Returns `Ok(0)` immediately if the write side is already closed: late
    /// writes from a producer that was not told about the close are dropped
    /// instead of failing. Fails with [`PipeError::Closed`] when the pipe is
    /// torn down while this write waits.
    pub async fn write(&self, data: &[u8]) -> Result<usize, PipeError> {
        if data.is_empty() {
            return Ok(0);
        }
        match self.shared.offer(data) {
            Offer::Discarded => return Ok(0),
            Offer::Pending => {}
        }

        let mut guard = InFlight {
            shared: &self.shared,
            armed: true,
        };
        let result = poll_fn(|cx| self.shared.poll_consumed(cx)).await;
        guard.armed = false;
        result.map(|()| data.len())
    }

    /// Write every data frame of `body` into the pipe, then close the write
    /// side with end-of-stream or with the body's error.
    ///
    /// Returns the number of bytes the reader consumed. A pipe error is
    /// returned as-is and leaves the write side as it was.
    pub async fn copy_from<B>(&self, body: B) -> Result<u64, PipeError>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let mut body = pin!(body);
        let mut copied = 0u64;
        loop {
            let frame = match poll_fn(|cx| body.as_mut().poll_frame(cx)).await {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => {
                    self.close_with_error(err);
                    return Ok(copied);
                }
                None => {
                    self.close_write();
                    return Ok(copied);
                }
            };
            // Trailers are dropped.
            let Ok(mut data) = frame.into_data() else {
                continue;
            };
            while data.has_remaining() {
                let chunk = data.chunk();
                let n = chunk.len();
                let written = self.write(chunk).await?;
                copied += written as u64;
                if written == 0 {
                    // Writer side closed under us; nothing more will be accepted.
                    return Ok(copied);
                }
                data.advance(n);
            }
        }
    }

    /// Close the write side with `err`. The reader observes `err` after the
    /// in-flight bytes. Only the first close of the write side has an effect;
    /// returns whether this call was it.
    pub fn close_with_error(&self, err: impl Into<BoxError>) -> bool {
        self.close_with(Termination::Error(TerminalError::new(err)))
    }

    /// Close the write side with a clean end-of-stream. Same first-wins rule as
    /// [`close_with_error`](Self::close_with_error).
    pub fn close_write(&self) -> bool {
        self.close_with(Termination::Eof)
    }

    pub(crate) fn close_with(&self, termination: Termination) -> bool {
        self.shared.close_write(termination)
    }

    /// Tear down the whole pipe. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Whether the write side no longer accepts bytes.
    pub fn is_closed(&self) -> bool {
        self.shared.is_writer_closed()
    }
}

/// Retracts the in-flight chunk if the write future is dropped early.
struct InFlight<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.retract();
        }
    }
}
