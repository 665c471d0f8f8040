//! Response-in-progress and the write view handed to push handlers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tokio::sync::oneshot;

use crate::error::{BridgeError, PipeError};
use crate::observability::metrics;
use crate::pipe::{PipeWriter, Termination};

/// Status and headers fixed by the header commit.
#[derive(Debug)]
pub(crate) struct Head {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

#[derive(Debug)]
struct Pending {
    headers: HeaderMap,
    /// Taken by the one commit.
    commit: Option<oneshot::Sender<Head>>,
}

/// State shared by the sink and the task driving the handler.
#[derive(Debug)]
pub(crate) struct Inflight {
    pending: Mutex<Pending>,
    body: PipeWriter,
    default_status: StatusCode,
}

impl Inflight {
    pub(crate) fn new(
        body: PipeWriter,
        commit: oneshot::Sender<Head>,
        default_status: StatusCode,
    ) -> Self {
        Self {
            pending: Mutex::new(Pending {
                headers: HeaderMap::new(),
                commit: Some(commit),
            }),
            body,
            default_status,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commit the header with `status`. Returns `false` if already committed.
    pub(crate) fn commit(&self, status: StatusCode) -> bool {
        let mut pending = self.lock();
        let Some(tx) = pending.commit.take() else {
            return false;
        };
        let headers = std::mem::take(&mut pending.headers);
        drop(pending);

        tracing::debug!(status = status.as_u16(), "Response header committed");
        if tx.send(Head { status, headers }).is_err() {
            tracing::debug!("Consumer went away before the header commit");
        }
        true
    }

    /// Commit with the default status if nothing committed yet.
    pub(crate) fn commit_default(&self) -> bool {
        self.commit(self.default_status)
    }

    pub(crate) fn is_committed(&self) -> bool {
        self.lock().commit.is_none()
    }

    pub(crate) fn finish(&self, termination: Termination) -> bool {
        self.body.close_with(termination)
    }

    fn with_headers<F>(&self, f: F) -> Result<(), BridgeError>
    where
        F: FnOnce(&mut HeaderMap),
    {
        let mut pending = self.lock();
        if pending.commit.is_none() {
            return Err(BridgeError::HeadersCommitted);
        }
        f(&mut pending.headers);
        Ok(())
    }
}

/// Push-style response writer passed to a [`Handler`](crate::bridge::Handler).
///
/// Headers may be changed until the header is committed. The commit happens on
/// [`set_status`](Self::set_status), on the first [`write`](Self::write), or
/// when the handler returns without doing either.
#[derive(Debug)]
pub struct ResponseSink {
    inflight: Arc<Inflight>,
}

impl ResponseSink {
    pub(crate) fn new(inflight: Arc<Inflight>) -> Self {
        Self { inflight }
    }

    /// Replace all values of `name`.
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) -> Result<(), BridgeError> {
        self.inflight.with_headers(|headers| {
            headers.insert(name, value);
        })
    }

    /// Add a value to `name`, keeping existing ones.
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) -> Result<(), BridgeError> {
        self.inflight.with_headers(|headers| {
            headers.append(name, value);
        })
    }

    /// Remove every value of `name`.
    pub fn remove_header(&self, name: &HeaderName) -> Result<(), BridgeError> {
        self.inflight.with_headers(|headers| {
            headers.remove(name);
        })
    }

    /// Set the status and commit the header.
    pub fn set_status(&self, status: StatusCode) -> Result<(), BridgeError> {
        if self.inflight.commit(status) {
            Ok(())
        } else {
            tracing::warn!(status = status.as_u16(), "Superfluous set_status call");
            Err(BridgeError::HeadersCommitted)
        }
    }

    /// Write body bytes, committing the default status first if needed.
    ///
    /// Waits until the consumer read the bytes. Returns `Ok(0)` once the body
    /// was closed for writing.
    pub async fn write(&self, data: &[u8]) -> Result<usize, PipeError> {
        self.inflight.commit_default();
        let n = self.inflight.body.write(data).await?;
        metrics::record_body_bytes(n);
        Ok(n)
    }

    /// Whether the header was committed.
    pub fn is_committed(&self) -> bool {
        self.inflight.is_committed()
    }
}
