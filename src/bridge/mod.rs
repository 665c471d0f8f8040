//! Bridge from push-style handlers to pull-style responses.
//!
//! # Data Flow
//! ```text
//! HandlerBridge::run(ctx)
//!     → ctx.take_request()
//!     → spawn handler task ─────────▶ handler.serve(request, sink)
//!     → wait for header commit ◀──────  set_status / first write / return
//!     → ctx.serve(Response<PipeBody>)   sink.write(bytes) ──▶ PipeBody
//!                                       return Ok  → body ends with EOF
//!                                       Err/panic  → body ends with the error
//! ```
//!
//! # Design Decisions
//! - The caller waits for the header only, never for the body
//! - Handler failures never reach the caller of `run`; the body reader sees them
//!   as the terminal read error
//! - A guard in the handler task commits and closes the body even when the task
//!   is dropped

mod context;
mod handler;
mod sink;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use futures_util::FutureExt;
use tokio::sync::oneshot;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{BoxError, BridgeError, TerminalError};
use crate::observability::metrics;
use crate::pipe::{self, PipeBody, Termination};

pub use context::{OneshotContext, ServeContext};
pub use handler::Handler;
pub use sink::ResponseSink;

use sink::{Head, Inflight};

/// Runs a push-style [`Handler`] and serves its response as soon as the header
/// is committed.
#[derive(Debug)]
pub struct HandlerBridge<H> {
    handler: Arc<H>,
    default_status: StatusCode,
}

impl<H> Clone for HandlerBridge<H> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            default_status: self.default_status,
        }
    }
}

impl<H: Handler> HandlerBridge<H> {
    /// Bridge `handler` with a default status of `200 OK`.
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            default_status: StatusCode::OK,
        }
    }

    /// Status committed when the handler writes or returns without setting one.
    pub fn with_default_status(mut self, status: StatusCode) -> Self {
        self.default_status = status;
        self
    }

    /// Run the handler on the context's request and deliver the response to
    /// `ctx` once the header is committed.
    ///
    /// The handler keeps running in its own task while the body is read.
    /// Handler failures are not returned here.
    pub async fn run<C>(&self, ctx: &mut C) -> Result<(), BridgeError>
    where
        C: ServeContext + ?Sized,
    {
        let response = self.respond(ctx.take_request()).await?;
        ctx.serve(response);
        Ok(())
    }

    /// Run the handler on `request` and return the response as soon as the
    /// header is committed.
    pub async fn respond(&self, request: Request<Body>) -> Result<Response<PipeBody>, BridgeError> {
        let span = tracing::debug_span!(
            "bridge",
            call_id = %Uuid::new_v4(),
            method = %request.method(),
            path = %request.uri().path(),
        );

        let (writer, body) = pipe::pipe();
        let (commit_tx, commit_rx) = oneshot::channel();
        let inflight = Arc::new(Inflight::new(writer, commit_tx, self.default_status));
        let sink = ResponseSink::new(inflight.clone());

        tokio::spawn(drive(self.handler.clone(), request, sink, inflight).instrument(span.clone()));

        let head = commit_rx.await.map_err(|_| BridgeError::NoResponse)?;
        span.in_scope(|| tracing::debug!(status = head.status.as_u16(), "Serving bridged response"));
        metrics::record_bridged_response(head.status.as_u16());
        Ok(assemble(head, body))
    }
}

fn assemble(head: Head, body: PipeBody) -> Response<PipeBody> {
    let mut response = Response::new(body);
    *response.status_mut() = head.status;
    *response.headers_mut() = head.headers;
    response
}

async fn drive<H: Handler>(
    handler: Arc<H>,
    request: Request<Body>,
    sink: ResponseSink,
    inflight: Arc<Inflight>,
) {
    let guard = Completion {
        inflight,
        done: false,
    };

    // Closure handlers may run code before handing back their future.
    let outcome = AssertUnwindSafe(async move { handler.serve(request, sink).await })
        .catch_unwind()
        .await;

    let result = match outcome {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(&*panic);
            tracing::error!(panic = %message, "Handler panicked");
            Err(BridgeError::HandlerPanicked(message).into())
        }
    };
    guard.complete(result);
}

/// Finishes the response exactly once, including when the task is dropped.
struct Completion {
    inflight: Arc<Inflight>,
    done: bool,
}

impl Completion {
    fn complete(mut self, result: Result<(), BoxError>) {
        self.finish(result);
    }

    fn finish(&mut self, result: Result<(), BoxError>) {
        if self.done {
            return;
        }
        self.done = true;

        if self.inflight.commit_default() {
            tracing::debug!("Handler returned without committing; using default status");
        }
        match result {
            Ok(()) => {
                self.inflight.finish(Termination::Eof);
                metrics::record_handler_completion("ok");
                tracing::debug!("Handler finished");
            }
            Err(err) => {
                tracing::warn!(error = %err, "Handler failed; terminating response body");
                metrics::record_handler_completion("error");
                self.inflight.finish(Termination::Error(TerminalError::new(err)));
            }
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.done {
            self.finish(Err(BridgeError::HandlerCancelled.into()));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipeError;
    use axum::http::{header, HeaderValue};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    async fn read_chunk(body: &mut PipeBody) -> Result<Vec<u8>, PipeError> {
        let mut buf = [0u8; 64];
        let n = body.read(&mut buf).await?;
        Ok(buf[..n].to_vec())
    }

    #[tokio::test]
    async fn status_without_body() {
        let bridge = HandlerBridge::new(|_req: Request<Body>, sink: ResponseSink| async move {
            sink.set_status(StatusCode::NOT_FOUND)?;
            Ok::<(), BoxError>(())
        });
        let mut response = bridge.respond(Request::default()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_chunk(response.body_mut()).await.unwrap(), b"");
    }

    #[tokio::test]
    async fn writes_stream_in_order_with_default_status() {
        let bridge = HandlerBridge::new(|_req: Request<Body>, sink: ResponseSink| async move {
            sink.write(b"hello").await?;
            sink.write(b"world").await?;
            Ok::<(), BoxError>(())
        });
        let mut response = bridge.respond(Request::default()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.body_mut();
        assert_eq!(read_chunk(body).await.unwrap(), b"hello");
        assert_eq!(read_chunk(body).await.unwrap(), b"world");
        assert_eq!(read_chunk(body).await.unwrap(), b"");
    }

    #[tokio::test]
    async fn handler_error_ends_body() {
        let bridge = HandlerBridge::new(|_req: Request<Body>, sink: ResponseSink| async move {
            sink.write(b"partial").await?;
            Err::<(), BoxError>(io::Error::new(io::ErrorKind::ConnectionReset, "upstream reset").into())
        });
        let mut response = bridge.respond(Request::default()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.body_mut();
        assert_eq!(read_chunk(body).await.unwrap(), b"partial");
        let err = read_chunk(body).await.unwrap_err();
        let source = err.terminal().unwrap().downcast_ref::<io::Error>().unwrap();
        assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn panic_ends_body_with_error() {
        let bridge = HandlerBridge::new(|_req: Request<Body>, sink: ResponseSink| async move {
            sink.set_status(StatusCode::ACCEPTED)?;
            if sink.is_committed() {
                panic!("handler blew up");
            }
            Ok::<(), BoxError>(())
        });
        let mut response = bridge.respond(Request::default()).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let err = read_chunk(response.body_mut()).await.unwrap_err();
        let bridge_err = err.terminal().unwrap().downcast_ref::<BridgeError>().unwrap();
        assert!(matches!(bridge_err, BridgeError::HandlerPanicked(msg) if msg == "handler blew up"));
    }

    #[tokio::test]
    async fn panic_before_commit_still_serves() {
        let bridge = HandlerBridge::new(|req: Request<Body>, _sink: ResponseSink| async move {
            if req.uri().path() == "/" {
                panic!("no output");
            }
            Ok::<(), BoxError>(())
        });
        let mut response = bridge.respond(Request::default()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(read_chunk(response.body_mut()).await.is_err());
    }

    #[tokio::test]
    async fn panic_while_building_future_is_reported() {
        let bridge = HandlerBridge::new(|req: Request<Body>, _sink: ResponseSink| {
            if req.uri().path() == "/" {
                panic!("panicked before the future existed");
            }
            async move { Ok::<(), BoxError>(()) }
        });
        let mut response = bridge.respond(Request::default()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let err = read_chunk(response.body_mut()).await.unwrap_err();
        let bridge_err = err.terminal().unwrap().downcast_ref::<BridgeError>().unwrap();
        assert!(
            matches!(bridge_err, BridgeError::HandlerPanicked(msg) if msg == "panicked before the future existed"),
            "unexpected terminal error: {bridge_err}"
        );
    }

    #[tokio::test]
    async fn oneshot_context_catches_response() {
        let bridge = HandlerBridge::new(|_req: Request<Body>, sink: ResponseSink| async move {
            sink.set_status(StatusCode::CREATED)?;
            sink.write(b"made").await?;
            Ok::<(), BoxError>(())
        });
        let mut ctx = OneshotContext::new(Request::default());
        bridge.run(&mut ctx).await.unwrap();
        let mut response = ctx.into_response().unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(read_chunk(response.body_mut()).await.unwrap(), b"made");
    }

    #[tokio::test]
    async fn silent_handler_commits_default() {
        let bridge = HandlerBridge::new(|_req: Request<Body>, _sink: ResponseSink| async move { Ok::<(), BoxError>(()) })
            .with_default_status(StatusCode::NO_CONTENT);
        let mut response = bridge.respond(Request::default()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(read_chunk(response.body_mut()).await.unwrap(), b"");
    }

    #[tokio::test]
    async fn headers_set_before_commit_are_served() {
        let bridge = HandlerBridge::new(|_req: Request<Body>, sink: ResponseSink| async move {
            sink.set_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))?;
            sink.write(b"x").await?;
            assert!(sink
                .set_header(header::CONTENT_LENGTH, HeaderValue::from_static("1"))
                .is_err());
            Ok::<(), BoxError>(())
        });
        let mut response = bridge.respond(Request::default()).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert!(!response.headers().contains_key(header::CONTENT_LENGTH));
        assert_eq!(read_chunk(response.body_mut()).await.unwrap(), b"x");
        assert_eq!(read_chunk(response.body_mut()).await.unwrap(), b"");
    }

    #[tokio::test]
    async fn run_returns_before_body_finishes() {
        let bridge = HandlerBridge::new(|_req: Request<Body>, sink: ResponseSink| async move {
            sink.set_status(StatusCode::OK)?;
            tokio::time::sleep(Duration::from_millis(50)).await;
            sink.write(b"late").await?;
            Ok::<(), BoxError>(())
        });
        let mut response = timeout(Duration::from_millis(30), bridge.respond(Request::default()))
            .await
            .expect("header must arrive before the body")
            .unwrap();
        assert_eq!(read_chunk(response.body_mut()).await.unwrap(), b"late");
    }

    #[tokio::test]
    async fn dropped_body_unblocks_handler() {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(std::sync::Mutex::new(Some(tx)));
        let bridge = HandlerBridge::new(move |_req: Request<Body>, sink: ResponseSink| {
            let tx = tx.clone();
            async move {
                let result = sink.write(b"nobody reads this").await;
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(result.map_err(|e| e.to_string()));
                }
                Ok::<(), BoxError>(())
            }
        });
        let response = bridge.respond(Request::default()).await.unwrap();
        drop(response);
        let result = timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
        assert_eq!(result, Err("read/write on closed pipe".to_string()));
    }

    struct ServeOnce {
        served: usize,
        status: Option<StatusCode>,
    }

    impl ServeContext for ServeOnce {
        fn take_request(&mut self) -> Request<Body> {
            Request::builder().uri("/items/7").body(Body::empty()).unwrap()
        }

        fn serve(&mut self, response: Response<PipeBody>) {
            self.served += 1;
            self.status = Some(response.status());
        }
    }

    #[tokio::test]
    async fn commit_happens_once() {
        let commits = Arc::new(AtomicUsize::new(0));
        let c = commits.clone();
        let bridge = HandlerBridge::new(move |req: Request<Body>, sink: ResponseSink| {
            let c = c.clone();
            async move {
                assert_eq!(req.uri().path(), "/items/7");
                if sink.set_status(StatusCode::CREATED).is_ok() {
                    c.fetch_add(1, Ordering::SeqCst);
                }
                if sink.set_status(StatusCode::OK).is_ok() {
                    c.fetch_add(1, Ordering::SeqCst);
                }
                let _ = sink.write(b"ignored").await;
                Ok::<(), BoxError>(())
            }
        });
        let mut ctx = ServeOnce {
            served: 0,
            status: None,
        };
        bridge.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.served, 1);
        assert_eq!(ctx.status, Some(StatusCode::CREATED));
        assert_eq!(commits.load(Ordering::SeqCst), 1);
    }
}
