use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures::StreamExt;
use serde::Serialize;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use webm_stream::{ColorSweep, EncodeTask, SessionStats, Settings, SinkError, sink};

use crate::config;

#[derive(Default)]
struct LiveStats {
    sessions_started: AtomicU64,
    sessions_active: AtomicU64,
    sessions_failed: AtomicU64,
    sessions_closed_by_client: AtomicU64,
    chunks_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

#[derive(Serialize)]
struct StatsResponse {
    sessions_started: u64,
    sessions_active: u64,
    sessions_failed: u64,
    sessions_closed_by_client: u64,
    chunks_sent: u64,
    bytes_sent: u64,
}

impl From<&LiveStats> for StatsResponse {
    fn from(stats: &LiveStats) -> Self {
        Self {
            sessions_started: stats.sessions_started.load(Ordering::Relaxed),
            sessions_active: stats.sessions_active.load(Ordering::Relaxed),
            sessions_failed: stats.sessions_failed.load(Ordering::Relaxed),
            sessions_closed_by_client: stats.sessions_closed_by_client.load(Ordering::Relaxed),
            chunks_sent: stats.chunks_sent.load(Ordering::Relaxed),
            bytes_sent: stats.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone)]
struct AppState {
    cancel: CancellationToken,
    sessions: TaskTracker,
    stats: Arc<LiveStats>,
}

fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/stats", get(stats))
        .route("/stream", get(stream))
        .with_state(state)
}

/// Serves until `cancel` fires, then waits for every open stream to finalize.
pub(crate) fn start_api_server(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let state = AppState {
            cancel: cancel.clone(),
            sessions: TaskTracker::new(),
            stats: Arc::new(LiveStats::default()),
        };
        let sessions = state.sessions.clone();
        let app = app_router(state);

        let addr = config::config().listen_addr();
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                log::error!("Error binding {}: {}", addr, e);
                cancel.cancel();
                return;
            }
        };
        log::info!("API server started on {}", addr);
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(cancel))
            .await
        {
            log::error!("Error starting API server: {}", e);
        }

        sessions.close();
        log::info!("waiting for {} open streams", sessions.len());
        sessions.wait().await;
    })
}

async fn shutdown_signal(cancel: CancellationToken) {
    cancel.cancelled().await;
    log::info!("Shutting down API server...");
}

async fn index() -> &'static str {
    "webm live stream: connect a WebSocket to /stream"
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.stats.as_ref()))
}

async fn stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let sessions = state.sessions.clone();
    ws.on_upgrade(move |socket| sessions.track_future(stream_session(socket, state)))
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Completed,
    /// The client left and the worker's last writes hit the closed channel.
    ClientClosed,
    Failed,
}

impl SessionEnd {
    fn classify(result: &anyhow::Result<SessionStats>, client_gone: bool) -> Self {
        match result {
            Ok(_) => SessionEnd::Completed,
            Err(e)
                if client_gone
                    && matches!(
                        e.downcast_ref::<webm_stream::Error>(),
                        Some(webm_stream::Error::Sink(SinkError::Closed))
                    ) =>
            {
                SessionEnd::ClientClosed
            }
            Err(_) => SessionEnd::Failed,
        }
    }
}

/// Streams one synthetic sweep to the client as binary WebM chunks.
async fn stream_session(mut socket: WebSocket, state: AppState) {
    let config = config::config();
    let settings = Settings::new(config.width(), config.height())
        .with_frame_rate(config.frame_rate());
    let sweep = ColorSweep::new(config.width(), config.height(), config.frame_rate())
        .until(config.duration_ms());
    let frame_interval = Duration::from_millis(sweep.step_ms() as u64);
    // paced to wall clock so the client sees a live stream
    let source = sweep.inspect(move |_| std::thread::sleep(frame_interval));

    let (sink, mut chunks) = sink::channel(config.channel_capacity(), config.stall_timeout());
    let task = EncodeTask::spawn_with_cancel(settings, source, sink, state.cancel.child_token());

    let stats = &state.stats;
    stats.sessions_started.fetch_add(1, Ordering::Relaxed);
    stats.sessions_active.fetch_add(1, Ordering::Relaxed);
    log::info!("stream session started");

    let mut client_gone = false;
    // on server shutdown the task finalizes and the chunk stream ends on its own
    loop {
        tokio::select! {
            chunk = chunks.next() => {
                let Some(chunk) = chunk else {
                    break;
                };
                let len = chunk.len() as u64;
                if let Err(e) = socket.send(Message::Binary(chunk)).await {
                    log::debug!("client send failed: {}", e);
                    client_gone = true;
                    task.stop();
                    break;
                }
                stats.chunks_sent.fetch_add(1, Ordering::Relaxed);
                stats.bytes_sent.fetch_add(len, Ordering::Relaxed);
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    log::debug!("client went away");
                    client_gone = true;
                    task.stop();
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    // unblocks a worker waiting on a full channel
    drop(chunks);
    let result = task.join().await;
    match SessionEnd::classify(&result, client_gone) {
        SessionEnd::Completed => log::info!("stream session finished: {:?}", result),
        SessionEnd::ClientClosed => {
            stats.sessions_closed_by_client.fetch_add(1, Ordering::Relaxed);
            log::info!("stream session closed by client");
        }
        SessionEnd::Failed => {
            stats.sessions_failed.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = &result {
                log::warn!("stream session ended with error: {}", e);
            }
        }
    }
    stats.sessions_active.fetch_sub(1, Ordering::Relaxed);
    let _ = socket.send(Message::Close(None)).await;
}
