//! Push-to-pull HTTP response bridge.
//!
//! A push-style handler writes status, headers and body bytes into a
//! [`ResponseSink`](bridge::ResponseSink). [`HandlerBridge`](bridge::HandlerBridge)
//! runs it in its own task and hands the consumer a `Response` as soon as the
//! header is committed, with a [`PipeBody`](pipe::PipeBody) that streams the
//! bytes as the handler produces them.

pub mod bridge;
pub mod config;
pub mod error;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipe;

pub use bridge::{Handler, HandlerBridge, OneshotContext, ResponseSink, ServeContext};
pub use config::ServeConfig;
pub use error::{BoxError, BridgeError, PipeError, TerminalError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipe::{pipe, PipeBody, PipeWriter};
