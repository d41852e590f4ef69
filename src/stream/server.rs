//! Session stream server.
//!
//! Owns one HTTP listener per playback session, bound to an ephemeral port.
//! Starting a new session atomically replaces the previous one: the prior
//! child process is cancelled, the prior listener closed and its port
//! released before the new listener is bound. A single mutex over the
//! session slot makes `start` and `stop` mutually exclusive; request
//! handlers only ever see an immutable per-session snapshot.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};
use crate::stream::descriptor::{EqualizerGains, MediaKind, StreamDescriptor};
use crate::stream::filters::build_transcode_args;
use crate::stream::image::render_image;
use crate::stream::runner::run_transcoder;

/// The single fixed request path a session serves.
pub const STREAM_PATH: &str = "/stream";

/// How long session teardown may take before we give up waiting.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounded buffer between the transcoder and the response body; small so a
/// stalled peer applies backpressure to ffmpeg instead of filling memory.
const STREAM_CHANNEL_CAPACITY: usize = 8;

/// Immutable per-session state handed to request handlers.
#[derive(Clone)]
struct SessionContext {
    descriptor: Arc<StreamDescriptor>,
    eq: EqualizerGains,
    ffmpeg: Arc<PathBuf>,
    cancel: CancellationToken,
}

/// A live session: listener address plus the handles needed to tear it down.
struct ActiveSession {
    addr: SocketAddr,
    cancel: CancellationToken,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// One-session-at-a-time HTTP stream server.
pub struct SessionServer {
    ffmpeg: Arc<PathBuf>,
    advertise: IpAddr,
    current: Mutex<Option<ActiveSession>>,
}

impl SessionServer {
    /// Create a server that invokes the given ffmpeg binary and advertises
    /// `advertise` in playable URLs (auto-detected when `None`).
    pub fn new(ffmpeg: PathBuf, advertise: Option<IpAddr>) -> Self {
        Self {
            ffmpeg: Arc::new(ffmpeg),
            advertise: advertise.unwrap_or_else(detect_local_ip),
            current: Mutex::new(None),
        }
    }

    /// Start a session for `descriptor`, replacing any prior session.
    ///
    /// The previous session's listener and child process are fully torn down
    /// before the new listener is bound; the returned URL is accepting
    /// connections by the time this resolves. The equalizer gains are
    /// snapshotted here and used for every request of this session.
    pub async fn start(
        &self,
        descriptor: StreamDescriptor,
        eq: EqualizerGains,
    ) -> Result<String> {
        let mut slot = self.current.lock().await;
        if let Some(previous) = slot.take() {
            teardown(previous).await;
        }

        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| Error::Bind {
                addr: "0.0.0.0:0".to_string(),
                source: e,
            })?;
        let addr = listener.local_addr()?;

        let cancel = CancellationToken::new();
        let ctx = SessionContext {
            descriptor: Arc::new(descriptor),
            eq,
            ffmpeg: Arc::clone(&self.ffmpeg),
            cancel: cancel.clone(),
        };

        let app = Router::new()
            .route(STREAM_PATH, get(serve_stream))
            .layer(TraceLayer::new_for_http())
            .with_state(ctx);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!("session server error: {e}");
            }
        });

        *slot = Some(ActiveSession {
            addr,
            cancel,
            shutdown: shutdown_tx,
            task,
        });

        let url = format!("http://{}:{}{}", self.advertise, addr.port(), STREAM_PATH);
        tracing::info!(%url, "session ready");
        Ok(url)
    }

    /// Stop the current session, if any. Idempotent.
    pub async fn stop(&self) {
        let mut slot = self.current.lock().await;
        if let Some(previous) = slot.take() {
            teardown(previous).await;
        }
    }

    /// Local address of the active session's listener, if one is serving.
    pub async fn current_addr(&self) -> Option<SocketAddr> {
        self.current.lock().await.as_ref().map(|s| s.addr)
    }
}

/// Cancel the session's child process, close its listener, and wait for the
/// serve task to finish. If teardown cannot be confirmed within
/// [`TEARDOWN_TIMEOUT`] the task is aborted and the anomaly logged; the
/// caller proceeds best-effort.
async fn teardown(session: ActiveSession) {
    let port = session.addr.port();
    session.cancel.cancel();
    let _ = session.shutdown.send(());

    let abort = session.task.abort_handle();
    match tokio::time::timeout(TEARDOWN_TIMEOUT, session.task).await {
        Ok(Ok(())) => tracing::debug!(port, "previous session torn down"),
        Ok(Err(e)) => tracing::warn!(port, "previous session task failed during teardown: {e}"),
        Err(_) => {
            abort.abort();
            tracing::warn!(
                port,
                "could not confirm teardown within {TEARDOWN_TIMEOUT:?}, proceeding"
            );
        }
    }
}

/// `GET /stream` handler: dispatch on the session's media kind.
async fn serve_stream(State(ctx): State<SessionContext>) -> Response {
    match ctx.descriptor.kind {
        MediaKind::Image => serve_image(&ctx).await,
        MediaKind::Video | MediaKind::Audio => serve_transcoded(&ctx),
    }
}

/// Whole-payload image response with an accurate length header.
async fn serve_image(ctx: &SessionContext) -> Response {
    let descriptor = Arc::clone(&ctx.descriptor);
    let rendered = tokio::task::spawn_blocking(move || render_image(&descriptor)).await;

    match rendered {
        Ok(Ok(payload)) => (
            [
                (header::CONTENT_TYPE, payload.content_type.to_string()),
                (header::CONTENT_LENGTH, payload.bytes.len().to_string()),
            ],
            payload.bytes,
        )
            .into_response(),
        Ok(Err(e)) => {
            tracing::error!(source = %ctx.descriptor.source, "failed to serve image: {e}");
            StatusCode::from_u16(e.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response()
        }
        Err(e) => {
            tracing::error!("image render task failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Continuous transcoded byte stream; connection-delimited, no length header.
fn serve_transcoded(ctx: &SessionContext) -> Response {
    let args = build_transcode_args(&ctx.descriptor, &ctx.eq);
    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

    let ffmpeg = (*ctx.ffmpeg).clone();
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        match run_transcoder(ffmpeg, args, tx, cancel).await {
            Ok(status) => tracing::debug!(?status, "transcode finished"),
            Err(e) => tracing::error!("transcoder could not run: {e}"),
        }
    });

    (
        [(
            header::CONTENT_TYPE,
            ctx.descriptor.kind.stream_content_type(),
        )],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}

/// Best-effort LAN address detection via a UDP connect (no packet is sent);
/// falls back to loopback.
fn detect_local_ip() -> IpAddr {
    fn probe() -> std::io::Result<IpAddr> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("8.8.8.8:80")?;
        Ok(socket.local_addr()?.ip())
    }
    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_local_ip_does_not_panic() {
        let ip = detect_local_ip();
        assert!(!ip.is_multicast());
    }

    #[tokio::test]
    async fn stop_is_idempotent_when_idle() {
        let server = SessionServer::new(PathBuf::from("ffmpeg"), None);
        server.stop().await;
        server.stop().await;
        assert!(server.current_addr().await.is_none());
    }
}
