//! Remote-control sub-server.
//!
//! A small fixed-port HTTP server exposing playback commands so any browser
//! on the LAN can drive the session. Commands are forwarded to the
//! orchestrator over a channel; the server itself holds no playback state.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};

/// A playback command issued from the control page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Next,
    Prev,
    /// Target volume in percent, 0 to 100.
    Volume(u8),
}

/// Handle to the running remote-control server.
#[derive(Debug)]
pub struct RemoteServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RemoteServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shut the server down and wait for it to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

impl Drop for RemoteServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Bind the remote-control server on `port` (all interfaces) and start
/// serving. Commands are delivered on `commands`; if the orchestrator has
/// gone away the handler reports 500.
pub async fn start_remote_server(
    port: u16,
    commands: mpsc::Sender<PlayerCommand>,
) -> Result<RemoteServer> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .map_err(|e| Error::Bind {
            addr: format!("0.0.0.0:{port}"),
            source: e,
        })?;
    let addr = listener.local_addr()?;

    let app = Router::new()
        .route("/", get(control_page))
        .route("/:command", get(dispatch_command))
        .layer(TraceLayer::new_for_http())
        .with_state(commands);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!("remote server error: {e}");
        }
    });

    tracing::info!(%addr, "remote control listening");
    Ok(RemoteServer {
        addr,
        shutdown: Some(shutdown_tx),
        task,
    })
}

async fn control_page() -> Html<&'static str> {
    Html(CONTROL_PAGE)
}

async fn dispatch_command(
    State(commands): State<mpsc::Sender<PlayerCommand>>,
    AxumPath(command): AxumPath<String>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    let parsed = match command.as_str() {
        "play" => PlayerCommand::Play,
        "pause" => PlayerCommand::Pause,
        "next" => PlayerCommand::Next,
        "prev" => PlayerCommand::Prev,
        "volume" => match params.get("val").and_then(|v| v.parse::<u8>().ok()) {
            Some(val) if val <= 100 => PlayerCommand::Volume(val),
            _ => return (StatusCode::BAD_REQUEST, "volume requires val=0..100"),
        },
        _ => return (StatusCode::NOT_FOUND, "unknown command"),
    };

    tracing::debug!(?parsed, "remote command");
    if commands.send(parsed).await.is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "player is gone");
    }
    (StatusCode::OK, "OK")
}

const CONTROL_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Cast Remote</title>
<style>
  body { font-family: sans-serif; text-align: center; background: #111; color: #eee; }
  button { font-size: 1.4em; margin: 0.4em; padding: 0.6em 1.2em; border-radius: 8px;
           border: none; background: #2d6cdf; color: white; }
  input[type=range] { width: 80%; }
</style>
</head>
<body>
<h2>Cast Remote</h2>
<div>
  <button onclick="send('prev')">&#9198;</button>
  <button onclick="send('play')">&#9654;</button>
  <button onclick="send('pause')">&#10074;&#10074;</button>
  <button onclick="send('next')">&#9197;</button>
</div>
<div>
  <input type="range" min="0" max="100" value="50"
         onchange="fetch('/volume?val=' + this.value)">
</div>
<script>
  function send(cmd) { fetch('/' + cmd); }
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_port_already_in_use() {
        let (tx, _rx) = mpsc::channel(4);
        let first = start_remote_server(0, tx.clone()).await.unwrap();
        let port = first.addr().port();
        let err = start_remote_server(port, tx).await.unwrap_err();
        assert!(matches!(err, Error::Bind { .. }));
        first.stop().await;
    }
}
