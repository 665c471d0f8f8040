//! HTTP host for bridged handlers.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, timeout + trace layers)
//!     → HandlerBridge::respond (handler task, header commit)
//!     → Response<PipeBody> streamed to client
//! ```

pub mod server;

pub use server::{build_router, HttpServer};
