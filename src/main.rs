//! proxy-serve: a static file server built on the push-to-pull handler bridge.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request      ┌──────────────────────────────────────────────────────┐
//!     ────────────────────┼─▶ axum Router ──▶ HandlerBridge::respond             │
//!                         │                       │ spawn                        │
//!                         │                       ▼                              │
//!                         │                 StaticFiles::serve(request, sink)    │
//!                         │                       │ set_status / write           │
//!     Client Response     │                       ▼                              │
//!     ◀───────────────────┼── Response<PipeBody> ◀── header commit + pipe        │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use proxy_serve::config::validation::validate_config;
use proxy_serve::config::{load_config, ConfigError, ServeConfig};
use proxy_serve::lifecycle::{signals, Shutdown};
use proxy_serve::observability::{logging, metrics};
use proxy_serve::HttpServer;

#[derive(Parser)]
#[command(name = "proxy-serve")]
#[command(about = "Serve files through the push-to-pull handler bridge", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the directory files are served from.
    #[arg(short, long)]
    root: Option<String>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServeConfig::default(),
    };
    if let Some(root) = cli.root {
        config.files.root = root;
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability);
    tracing::info!("proxy-serve v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        root = %config.files.root,
        strip_prefix = %config.files.strip_prefix,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_ctrl_c_listener(shutdown.clone());

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
