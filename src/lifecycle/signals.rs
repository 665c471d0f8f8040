//! OS signal handling.
//!
//! SIGINT (Ctrl+C) triggers graceful shutdown.

use crate::lifecycle::Shutdown;

/// Trigger `shutdown` when Ctrl+C is received.
pub fn spawn_ctrl_c_listener(shutdown: Shutdown) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                shutdown.trigger();
            }
            Err(e) => tracing::error!(error = %e, "Failed to install Ctrl+C handler"),
        }
    });
}
