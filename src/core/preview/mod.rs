//! Preview server: serves the build output, injects a live-reload client
//! into HTML pages and pushes reload signals over a websocket.

#![allow(clippy::result_large_err)] // Preview helpers return AppError for consistent diagnostics.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Request,
    },
    http::{header, HeaderValue, Response},
    middleware::{self, Next},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;

/// Websocket endpoint pushing `reload` messages.
pub const LIVERELOAD_PATH: &str = "/__livereload";
/// Client script injected into every HTML page.
pub const LIVERELOAD_SCRIPT_PATH: &str = "/__livereload.js";

const LIVERELOAD_SCRIPT: &str = r#"(function () {
  var scheme = location.protocol === "https:" ? "wss:" : "ws:";
  function connect() {
    var socket = new WebSocket(scheme + "//" + location.host + "/__livereload");
    socket.onmessage = function (event) {
      if (event.data === "reload") {
        location.reload();
      }
    };
    socket.onclose = function () {
      setTimeout(connect, 1000);
    };
  }
  connect();
})();
"#;

const SCRIPT_TAG: &str = "<script src=\"/__livereload.js\"></script>";
const MAX_INJECT_BYTES: usize = 16 * 1024 * 1024;

struct PreviewState {
    reload: broadcast::Sender<()>,
}

/// Build the preview router serving `base_dir`. Exposed separately from
/// [`PreviewServer`] so routes can be exercised without binding a socket.
pub fn router(base_dir: &Path, reload: broadcast::Sender<()>) -> Router {
    let state = Arc::new(PreviewState { reload });
    Router::new()
        .route(LIVERELOAD_PATH, get(handle_socket_upgrade))
        .route(LIVERELOAD_SCRIPT_PATH, get(handle_script))
        .fallback_service(ServeDir::new(base_dir))
        .layer(middleware::from_fn(inject_reload_script))
        .layer(Extension(state))
}

/// Preview server configuration. Nothing is bound until [`start`](Self::start).
#[derive(Debug, Clone)]
pub struct PreviewServer {
    base_dir: PathBuf,
    port: u16,
    reload_delay: Duration,
}

impl PreviewServer {
    pub fn new(base_dir: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            base_dir: base_dir.into(),
            port,
            reload_delay: Duration::ZERO,
        }
    }

    pub fn with_reload_delay(mut self, delay: Duration) -> Self {
        self.reload_delay = delay;
        self
    }

    /// Bind the listener on localhost and serve in the background.
    pub async fn start(self) -> Result<PreviewHandle, AppError> {
        let bind_addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = TcpListener::bind(bind_addr).await.map_err(|err| {
            AppError::new(
                ErrorCategory::InternalError,
                format!("failed to bind preview server on {}: {}", bind_addr, err),
            )
            .with_code("BLD-PREVIEW-001")
        })?;
        let local_addr = listener.local_addr().map_err(|err| {
            AppError::new(
                ErrorCategory::InternalError,
                format!("failed to determine preview server address: {}", err),
            )
            .with_code("BLD-PREVIEW-002")
        })?;

        let (reload, _) = broadcast::channel(16);
        let app = router(&self.base_dir, reload.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::info!(
            addr = %local_addr,
            base_dir = %self.base_dir.display(),
            "preview server listening on http://{}",
            local_addr
        );
        Ok(PreviewHandle {
            local_addr,
            reloader: Reloader {
                sender: reload,
                delay: self.reload_delay,
            },
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// Running preview server. Dropping the handle without calling
/// [`shutdown`](Self::shutdown) leaves the server running until the
/// runtime stops.
pub struct PreviewHandle {
    local_addr: SocketAddr,
    reloader: Reloader,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl PreviewHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.local_addr)
    }

    /// Signal connected browsers to reload after the configured delay.
    /// Returns the number of clients notified.
    pub async fn reload(&self) -> usize {
        self.reloader.reload().await
    }

    /// Detached reload trigger, usable after the handle moves elsewhere.
    pub fn reloader(&self) -> Reloader {
        self.reloader.clone()
    }

    /// Stop accepting connections and wait for the server task to end.
    pub async fn shutdown(mut self) -> Result<(), AppError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match (&mut self.task).await {
            Ok(Ok(())) => {
                tracing::info!(addr = %self.local_addr, "preview server stopped");
                Ok(())
            }
            Ok(Err(err)) => Err(AppError::new(
                ErrorCategory::InternalError,
                format!("preview server terminated: {}", err),
            )
            .with_code("BLD-PREVIEW-003")),
            Err(err) => Err(AppError::new(
                ErrorCategory::InternalError,
                format!("preview server task failed: {}", err),
            )
            .with_code("BLD-PREVIEW-003")),
        }
    }
}

/// Sends reload signals to browsers connected to a preview server.
#[derive(Debug, Clone)]
pub struct Reloader {
    sender: broadcast::Sender<()>,
    delay: Duration,
}

impl Reloader {
    pub async fn reload(&self) -> usize {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let notified = self.sender.send(()).unwrap_or(0);
        tracing::debug!(clients = notified, "preview reload sent");
        notified
    }
}

async fn handle_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        LIVERELOAD_SCRIPT,
    )
}

async fn handle_socket_upgrade(
    Extension(state): Extension<Arc<PreviewState>>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    let updates = state.reload.subscribe();
    upgrade.on_upgrade(move |socket| forward_reloads(socket, updates))
}

async fn forward_reloads(mut socket: WebSocket, mut updates: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    if socket.send(Message::Text("reload".into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn inject_reload_script(request: Request, next: Next) -> Response<Body> {
    let response = next.run(request).await;
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("text/html"))
        .unwrap_or(false);
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_INJECT_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "failed to buffer html response for reload injection");
            return Response::from_parts(parts, Body::empty());
        }
    };
    let html = String::from_utf8_lossy(&bytes);
    let injected = inject_script_tag(&html);
    parts.headers.remove(header::CONTENT_LENGTH);
    if let Ok(length) = HeaderValue::from_str(&injected.len().to_string()) {
        parts.headers.insert(header::CONTENT_LENGTH, length);
    }
    Response::from_parts(parts, Body::from(injected))
}

/// Insert the client script before the last `</body>`, or append it when the
/// document has none.
fn inject_script_tag(html: &str) -> String {
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + SCRIPT_TAG.len());
            out.push_str(&html[..index]);
            out.push_str(SCRIPT_TAG);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{}{}", html, SCRIPT_TAG),
    }
}
