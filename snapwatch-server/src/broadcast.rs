//! Frame delivery: single-recipient sends and authenticated fan-out, both
//! through the per-connection write lock.

use axum::extract::ws::Message;
use futures_util::SinkExt;
use snapwatch_core::WsMessage;

use crate::registry::{ClientRegistry, ConnId, FrameWriter};

/// Write one JSON frame to a single client, serialised against concurrent
/// writers by the connection's lock.
///
/// On a write failure the connection is queued for teardown and dropped from
/// the registry; the reader task observes the request and performs the
/// actual close, so the transport is never closed under an active reader.
/// Returns false when the frame could not be written.
pub async fn send_frame(
    registry: &ClientRegistry,
    id: ConnId,
    writer: &FrameWriter,
    msg: &WsMessage,
) -> bool {
    let frame = match serde_json::to_string(msg) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::error!(error = %err, kind = %msg.kind, "failed to encode frame");
            return false;
        }
    };

    let result = {
        let mut sink = writer.lock().await;
        sink.send(Message::Text(frame.into())).await
    };

    match result {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(conn = id, error = %err, "write failed; queueing teardown");
            registry.request_close(id).await;
            registry.remove(id).await;
            false
        }
    }
}

/// Deliver `msg` to every currently authenticated connection.
///
/// The target list is a snapshot; writes on one connection are totally
/// ordered by its lock, but there is no cross-connection ordering and the
/// iteration order is unspecified. A failed write tears down only the
/// offending connection.
pub async fn broadcast(registry: &ClientRegistry, msg: &WsMessage) {
    let targets = registry.authenticated_snapshot().await;
    tracing::debug!(kind = %msg.kind, clients = targets.len(), "broadcasting");

    for (id, writer) in targets {
        send_frame(registry, id, &writer, msg).await;
    }
}
