//! Push-style handler capability.

use std::future::Future;

use axum::body::Body;
use axum::http::Request;

use crate::bridge::ResponseSink;
use crate::error::BoxError;

/// A handler that writes its response into a [`ResponseSink`].
///
/// An `Err` return, or a panic, becomes the terminal error of the response
/// body. The status and any bytes written before that are still delivered.
pub trait Handler: Send + Sync + 'static {
    fn serve(
        &self,
        request: Request<Body>,
        sink: ResponseSink,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request<Body>, ResponseSink) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    fn serve(
        &self,
        request: Request<Body>,
        sink: ResponseSink,
    ) -> impl Future<Output = Result<(), BoxError>> + Send {
        (self)(request, sink)
    }
}
