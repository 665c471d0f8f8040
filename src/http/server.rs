//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router that hands every request to a handler bridge
//! - Wire up middleware (tracing, request timeout)
//! - Bind server to listener and shut down gracefully

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::bridge::{Handler, HandlerBridge};
use crate::config::ServeConfig;
use crate::handlers::StaticFiles;

/// HTTP server serving a push-style handler through the bridge.
pub struct HttpServer {
    router: Router,
    config: ServeConfig,
}

impl HttpServer {
    /// Create a server for the static file handler described by `config`.
    pub fn new(config: ServeConfig) -> Self {
        let files = StaticFiles::from_config(&config.files);
        Self::with_handler(config, files)
    }

    /// Create a server for any push-style handler.
    pub fn with_handler<H: Handler>(config: ServeConfig, handler: H) -> Self {
        let default_status =
            StatusCode::from_u16(config.bridge.default_status).unwrap_or(StatusCode::OK);
        let bridge = HandlerBridge::new(handler).with_default_status(default_status);
        let router = build_router(bridge, Duration::from_secs(config.timeouts.request_secs));
        Self { router, config }
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown requested");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServeConfig {
        &self.config
    }

    /// The router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router<H: Handler>(bridge: HandlerBridge<H>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/{*path}", any(bridge_handler::<H>))
        .route("/", any(bridge_handler::<H>))
        .with_state(bridge)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

async fn bridge_handler<H: Handler>(
    State(bridge): State<HandlerBridge<H>>,
    request: Request<Body>,
) -> Response {
    match bridge.respond(request).await {
        Ok(response) => response.map(Body::new),
        Err(e) => {
            tracing::error!(error = %e, "Bridged handler produced no response");
            (StatusCode::INTERNAL_SERVER_ERROR, "Handler produced no response").into_response()
        }
    }
}
