//! Push-style static file server.
//!
//! Writes status, headers and file contents into a [`ResponseSink`]; the
//! bridge turns that into a streamed response.

use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use percent_encoding::percent_decode_str;
use tokio::io::AsyncReadExt;

use crate::bridge::{Handler, ResponseSink};
use crate::config::FilesConfig;
use crate::error::BoxError;

/// Served in place of a directory.
const INDEX_FILE: &str = "index.html";

/// Serves files below `root` for GET and HEAD requests. A directory is
/// served through its `index.html`.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    strip_prefix: String,
    chunk_size: usize,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            strip_prefix: String::new(),
            chunk_size: 16 * 1024,
        }
    }

    pub fn from_config(config: &FilesConfig) -> Self {
        Self::new(&config.root)
            .strip_prefix(config.strip_prefix.clone())
            .chunk_size(config.chunk_size)
    }

    /// Only serve paths under `prefix`, resolving the remainder against the root.
    pub fn strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Bytes read from disk per body write.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Map a request path to a file below the root. `None` when the path is
    /// outside the prefix, is not valid percent-encoded UTF-8, or tries to
    /// leave the root.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let rest = path.strip_prefix(self.strip_prefix.as_str())?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }

        let mut resolved = self.root.clone();
        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            let decoded = percent_decode_str(segment).decode_utf8().ok()?;
            // An encoded separator or NUL must not smuggle in another component.
            if decoded.contains(['/', '\\', '\0']) {
                return None;
            }
            for component in Path::new(&*decoded).components() {
                match component {
                    Component::Normal(part) => resolved.push(part),
                    Component::CurDir => {}
                    Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
                }
            }
        }
        Some(resolved)
    }

    async fn serve_file(&self, method: &Method, path: &str, sink: &ResponseSink) -> Result<(), BoxError> {
        let Some(mut file_path) = self.resolve(path) else {
            return not_found(sink).await;
        };
        if tokio::fs::metadata(&file_path).await.is_ok_and(|m| m.is_dir()) {
            file_path.push(INDEX_FILE);
        }

        let mut file = match tokio::fs::File::open(&file_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return not_found(sink).await,
            Err(e) => return Err(e.into()),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return not_found(sink).await;
        }

        sink.set_header(header::CONTENT_TYPE, HeaderValue::from_static(content_type(&file_path)))?;
        sink.set_header(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()))?;
        sink.set_status(StatusCode::OK)?;
        tracing::debug!(file = %file_path.display(), bytes = metadata.len(), "Serving file");

        if method == Method::HEAD {
            return Ok(());
        }

        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            if sink.write(&buf[..n]).await? == 0 {
                tracing::debug!(file = %file_path.display(), "Response body closed, stopping");
                return Ok(());
            }
        }
    }
}

impl Handler for StaticFiles {
    fn serve(
        &self,
        request: Request<Body>,
        sink: ResponseSink,
    ) -> impl Future<Output = Result<(), BoxError>> + Send {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        async move {
            if method != Method::GET && method != Method::HEAD {
                sink.set_header(header::ALLOW, HeaderValue::from_static("GET, HEAD"))?;
                sink.set_status(StatusCode::METHOD_NOT_ALLOWED)?;
                return Ok(());
            }
            self.serve_file(&method, &path, &sink).await
        }
    }
}

async fn not_found(sink: &ResponseSink) -> Result<(), BoxError> {
    sink.set_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))?;
    sink.set_status(StatusCode::NOT_FOUND)?;
    sink.write(b"404 page not found\n").await?;
    Ok(())
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}
