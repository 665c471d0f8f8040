//! Consumer end of the pipe.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyper::body::{Body, Bytes, Frame, SizeHint};

use crate::error::PipeError;
use crate::pipe::state::Shared;

/// Read half of a [`pipe`](crate::pipe::pipe), usable as an HTTP body.
///
/// Dropping the body tears the pipe down, which releases a producer blocked
/// in [`PipeWriter::write`](crate::pipe::PipeWriter::write).
#[derive(Debug)]
pub struct PipeBody {
    shared: Arc<Shared>,
}

impl PipeBody {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Read the next bytes into `buf`.
    ///
    /// `Ok(0)` with a non-empty `buf` is end-of-stream and repeats on every
    /// later call. A producer error is returned as
    /// [`PipeError::Terminated`], again on every later call.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, PipeError> {
        poll_fn(|cx| self.shared.poll_read(cx, buf)).await
    }

    /// Tear down the pipe. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Whether the pipe was torn down.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Body for PipeBody {
    type Data = Bytes;
    type Error = PipeError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.shared.poll_chunk(cx) {
            Poll::Ready(Ok(Some(chunk))) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
            Poll::Ready(Ok(None)) => Poll::Ready(None),
            Poll::Ready(Err(err)) => Poll::Ready(Some(Err(err))),
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.shared.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::default()
    }
}

impl Drop for PipeBody {
    fn drop(&mut self) {
        self.shared.close();
    }
}
