//! Consumer-side capability: where the request comes from and where the
//! finished response goes.

use axum::body::Body;
use axum::http::{Request, Response};

use crate::pipe::PipeBody;

/// A pipeline stage that supplies the inbound request and accepts the bridged
/// response.
pub trait ServeContext {
    /// Hand out the inbound request. Called once per bridged call.
    fn take_request(&mut self) -> Request<Body>;

    /// Accept the response once its header is committed. The body keeps
    /// streaming after this returns.
    fn serve(&mut self, response: Response<PipeBody>);
}

/// A context holding one request and catching the one response.
#[derive(Debug, Default)]
pub struct OneshotContext {
    request: Option<Request<Body>>,
    response: Option<Response<PipeBody>>,
}

impl OneshotContext {
    pub fn new(request: Request<Body>) -> Self {
        Self {
            request: Some(request),
            response: None,
        }
    }

    /// The served response, if any.
    pub fn into_response(self) -> Option<Response<PipeBody>> {
        self.response
    }
}

impl ServeContext for OneshotContext {
    fn take_request(&mut self) -> Request<Body> {
        self.request.take().unwrap_or_default()
    }

    fn serve(&mut self, response: Response<PipeBody>) {
        self.response = Some(response);
    }
}
