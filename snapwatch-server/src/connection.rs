//! Per-connection lifecycle: the token challenge/response handshake and the
//! reader loop that follows it.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use chrono::Local;
use futures_util::{SinkExt, StreamExt};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{timeout, timeout_at, Instant};

use snapwatch_core::WsMessage;

use crate::broadcast::send_frame;
use crate::http::AppState;
use crate::registry::FrameWriter;

/// Window between sending `hello` and receiving a valid `hello_ack`.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// Per-frame read deadline once a connection is established.
pub const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Runs as the reader task for one upgraded socket; returns when the
/// connection is torn down.
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sink, mut frames) = socket.split();
    let writer: FrameWriter = Arc::new(AsyncMutex::new(sink));
    let registry = &state.registry;

    let id = registry.insert(writer.clone()).await;
    let token = challenge_token();
    tracing::info!(conn = id, "new client connection; sending challenge");

    if !send_frame(registry, id, &writer, &WsMessage::hello(&token, state.version)).await {
        registry.remove(id).await;
        registry.clear_close_request(id).await;
        return;
    }

    let handshake_deadline = Instant::now() + HANDSHAKE_TIMEOUT;
    let mut authenticated = false;

    loop {
        // A failed write from the broadcaster queues teardown here.
        if registry.close_requested(id).await {
            break;
        }

        let frame = if authenticated {
            timeout(READ_IDLE_TIMEOUT, frames.next()).await
        } else {
            timeout_at(handshake_deadline, frames.next()).await
        };

        let message = match frame {
            Err(_) if !authenticated => {
                tracing::warn!(conn = id, "handshake timeout");
                send_close(&writer, close_code::POLICY, "handshake timeout").await;
                break;
            }
            Err(_) => {
                tracing::warn!(conn = id, "read deadline expired");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                tracing::debug!(conn = id, error = %err, "socket read failed");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Transport-level control frames are answered by the protocol
            // layer; nothing to do here.
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => continue,
        };

        let msg: WsMessage = match serde_json::from_str(&text) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::debug!(conn = id, error = %err, "unreadable frame");
                break;
            }
        };

        if !authenticated {
            if msg.kind != "hello_ack" {
                tracing::warn!(conn = id, kind = %msg.kind, "expected hello_ack");
                break;
            }
            if msg.token() != Some(token.as_str()) {
                tracing::warn!(conn = id, "invalid handshake token");
                send_close(&writer, close_code::POLICY, "invalid token").await;
                break;
            }

            authenticated = true;
            registry.promote(id).await;
            let authenticated_count = registry.authenticated_count().await;
            tracing::info!(
                conn = id,
                authenticated = authenticated_count,
                "handshake complete",
            );
            send_frame(registry, id, &writer, &WsMessage::connected(Local::now())).await;
            continue;
        }

        match msg.kind.as_str() {
            "ping" => {
                send_frame(registry, id, &writer, &WsMessage::pong(Local::now())).await;
            }
            other => {
                tracing::debug!(conn = id, kind = %other, "ignoring unknown message");
            }
        }
    }

    registry.remove(id).await;
    registry.clear_close_request(id).await;
    let _ = writer.lock().await.close().await;
    let remaining = registry.authenticated_count().await;
    tracing::info!(
        conn = id,
        remaining = remaining,
        "client disconnected",
    );
}

/// One-shot challenge secret: 16 random bytes, hex-encoded. Never leaves the
/// process except inside the `hello` frame it answers.
fn challenge_token() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

async fn send_close(writer: &FrameWriter, code: u16, reason: &'static str) {
    let frame = Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }));
    let _ = writer.lock().await.send(frame).await;
}
