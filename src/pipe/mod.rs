//! Unbuffered byte pipe between a body producer and a body consumer.
//!
//! # Data Flow
//! ```text
//! producer task                        consumer
//!     PipeWriter::write(bytes) ──────▶ PipeBody::read / poll_frame
//!         (waits until consumed)
//!     PipeWriter::close_write()  ────▶ Ok(0) / None      (end-of-stream)
//!     PipeWriter::close_with_error ──▶ Err(Terminated)   (same error every read)
//!                                      PipeBody::close / drop (full teardown)
//! ```
//!
//! # Design Decisions
//! - No internal buffer: at most one chunk is in flight, the producer waits for
//!   the consumer (backpressure)
//! - Writer-side close is latched once; later writes are discarded with `Ok(0)`
//! - Full close implies writer-side close and wakes both ends
//!
//! # Example
//! ```no_run
//! # async fn demo(upstream: axum::body::Body) {
//! let (writer, body) = proxy_serve::pipe::pipe();
//! tokio::spawn(async move {
//!     let _ = writer.copy_from(upstream).await;
//! });
//! let response = axum::http::Response::new(axum::body::Body::new(body));
//! # let _ = response;
//! # }
//! ```

mod reader;
mod state;
mod writer;

use std::sync::Arc;

pub use reader::PipeBody;
pub use writer::PipeWriter;

pub(crate) use state::Termination;

/// Create a connected writer/body pair.
pub fn pipe() -> (PipeWriter, PipeBody) {
    let shared = Arc::new(state::Shared::default());
    (PipeWriter::new(shared.clone()), PipeBody::new(shared))
}
