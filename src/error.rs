//! Error types shared by the pipe and the bridge.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by push handlers.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// The error a producer closed the pipe with.
///
/// Shared behind an `Arc` so every read after writer-close observes the
/// same value.
#[derive(Debug, Clone, Error)]
#[error(transparent)]
pub struct TerminalError(Arc<dyn StdError + Send + Sync>);

impl TerminalError {
    /// Wrap a producer error.
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self(Arc::from(err.into()))
    }

    /// Borrow the original error.
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }

    /// Attempt to downcast to the producer's concrete error type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Whether two terminal errors are the same recorded value.
    pub fn same_as(&self, other: &TerminalError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Errors surfaced by [`PipeWriter`](crate::pipe::PipeWriter) and
/// [`PipeBody`](crate::pipe::PipeBody).
#[derive(Debug, Clone, Error)]
pub enum PipeError {
    /// The pipe was torn down while a write was in flight, or read after teardown.
    #[error("read/write on closed pipe")]
    Closed,

    /// The producer closed the write side with an error.
    #[error(transparent)]
    Terminated(#[from] TerminalError),
}

impl PipeError {
    /// The producer's terminal error, if this is one.
    pub fn terminal(&self) -> Option<&TerminalError> {
        match self {
            PipeError::Terminated(err) => Some(err),
            PipeError::Closed => None,
        }
    }
}

/// Errors raised by the handler bridge and its response sink.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Header mutation or status change after the header was committed.
    #[error("response headers already committed")]
    HeadersCommitted,

    /// The handler panicked; carries the panic message.
    #[error("handler panicked: {0}")]
    HandlerPanicked(String),

    /// The handler task was dropped before it finished.
    #[error("handler task cancelled")]
    HandlerCancelled,

    /// The handler task went away without ever committing a header.
    #[error("handler task ended without committing a response")]
    NoResponse,
}
