//! Loopback HTTP surface: candidate-port binding, the `/ws` upgrade,
//! `/health`, and the debug-only `/test/broadcast` fan-out endpoint.

use std::io::ErrorKind;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::{Local, SecondsFormat};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use snapwatch_core::WsMessage;

use crate::broadcast::broadcast as fan_out;
use crate::connection;
use crate::error::ServerError;
use crate::registry::ClientRegistry;

/// Ports tried in order, loopback only. Clients discover the daemon by
/// probing the same list, so the order must stay deterministic.
pub const CANDIDATE_PORTS: [u16; 50] = [
    8887, 49205, 49231, 49267, 49303, 49327, 49411, 49437, 49471, 49513, 49559, 49607, 49633,
    49669, 49717, 49741, 49807, 49843, 49879, 49921, 49957, 50021, 50051, 50083, 50119, 50153,
    50207, 50239, 50273, 50311, 50359, 50413, 50441, 50483, 50509, 50551, 50617, 50653, 50677,
    50713, 50759, 50803, 50837, 50869, 50917, 50953, 51011, 51047, 51083, 51113,
];

/// State shared by every route handler and connection task.
pub struct AppState {
    pub registry: ClientRegistry,
    pub version: &'static str,
    pub debug_mode: bool,
}

impl AppState {
    pub fn new(version: &'static str, debug_mode: bool) -> Self {
        Self {
            registry: ClientRegistry::new(),
            version,
            debug_mode,
        }
    }
}

/// Bind the first free candidate port on loopback. `AddrInUse` moves on to
/// the next candidate; any other bind error is fatal, as is exhausting the
/// list.
pub async fn bind_candidate_port() -> Result<(TcpListener, u16), ServerError> {
    let mut last_in_use: Option<std::io::Error> = None;

    for port in CANDIDATE_PORTS {
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => {
                tracing::info!(port, "bound loopback listener");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == ErrorKind::AddrInUse => {
                tracing::debug!(port, "candidate port in use; trying next");
                last_in_use = Some(err);
            }
            Err(source) => return Err(ServerError::Bind { port, source }),
        }
    }

    Err(ServerError::NoFreePort {
        source: last_in_use.unwrap_or_else(|| {
            std::io::Error::new(ErrorKind::AddrInUse, "all candidate ports in use")
        }),
    })
}

/// Routes: `/ws`, `/health`, and — only in debug mode — `/test/broadcast`.
/// No origin checks: binding to loopback is the trust boundary.
pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health));
    if state.debug_mode {
        tracing::info!("debug mode: registering /test/broadcast");
        router = router.route("/test/broadcast", post(test_broadcast));
    }
    router.with_state(state)
}

/// Serve until the shutdown channel fires.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), ServerError> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            tracing::info!("shutting down front end");
        })
        .await
        .map_err(ServerError::Serve)
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_socket(socket, state))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": state.version,
        "timestamp": Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

async fn test_broadcast(
    State(state): State<Arc<AppState>>,
    body: Result<Json<WsMessage>, JsonRejection>,
) -> StatusCode {
    match body {
        Ok(Json(msg)) => {
            fan_out(&state.registry, &msg).await;
            StatusCode::OK
        }
        Err(err) => {
            tracing::debug!(error = %err, "rejecting test broadcast body");
            StatusCode::BAD_REQUEST
        }
    }
}
