//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use proxy_serve::bridge::Handler;
use proxy_serve::{HttpServer, ServeConfig, Shutdown};
use tokio::net::TcpListener;

/// Start a server for `handler` on an ephemeral port.
///
/// The server stops when the returned `Shutdown` is triggered.
#[allow(dead_code)]
pub async fn start_server<H: Handler>(config: ServeConfig, handler: H) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::with_handler(config, handler);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    (addr, shutdown)
}

/// Start the static file server described by `config`.
#[allow(dead_code)]
pub async fn start_file_server(config: ServeConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    (addr, shutdown)
}

/// A client that never reuses connections between tests.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// A fresh directory under the system temp dir, populated with `files`.
#[allow(dead_code)]
pub fn site_dir(name: &str, files: &[(&str, &[u8])]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("proxy-serve-it-{}-{}", std::process::id(), name));
    let _ = std::fs::remove_dir_all(&dir);
    for (path, content) in files {
        let full = dir.join(path);
        std::fs::create_dir_all(full.parent().unwrap_or(Path::new(&dir))).unwrap();
        std::fs::write(full, content).unwrap();
    }
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
