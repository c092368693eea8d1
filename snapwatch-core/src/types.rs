//! Wire and event types shared across the daemon.

use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One detected capture occurrence, produced by the tailer at most once per
/// matching log line and consumed by the detection bridge. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// Instant parsed from the line's leading bracketed field, in the local
    /// zone unless the line carried an explicit one.
    pub timestamp: DateTime<Local>,
    /// Raw matched line, kept for logging and tests.
    pub source_line: String,
}

/// A JSON frame exchanged over the WebSocket surface.
///
/// `kind` is serialised as `"type"`. Unknown kinds pass through untouched so
/// the test broadcast endpoint can relay opaque messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl WsMessage {
    /// Server challenge opening the handshake.
    pub fn hello(token: &str, version: &str) -> Self {
        Self {
            kind: "hello".to_string(),
            payload: Some(json!({ "token": token, "version": version })),
        }
    }

    /// Client response echoing the challenge token.
    pub fn hello_ack(token: &str) -> Self {
        Self {
            kind: "hello_ack".to_string(),
            payload: Some(json!({ "token": token })),
        }
    }

    /// Server acknowledgement completing the handshake.
    pub fn connected(now: DateTime<Local>) -> Self {
        Self {
            kind: "connected".to_string(),
            payload: Some(json!({ "timestamp": rfc3339(now) })),
        }
    }

    pub fn ping() -> Self {
        Self {
            kind: "ping".to_string(),
            payload: None,
        }
    }

    pub fn pong(now: DateTime<Local>) -> Self {
        Self {
            kind: "pong".to_string(),
            payload: Some(json!({ "timestamp": rfc3339(now) })),
        }
    }

    /// Capture notification fanned out to every authenticated client.
    pub fn screenshot_detected(at: DateTime<Local>) -> Self {
        Self {
            kind: "screenshot_detected".to_string(),
            payload: Some(json!({
                "timestamp": at.format("%H:%M:%S").to_string(),
                "time": rfc3339(at),
            })),
        }
    }

    /// Token string carried in a `hello` / `hello_ack` payload, if any.
    pub fn token(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|payload| payload.get("token"))
            .and_then(Value::as_str)
    }
}

fn rfc3339(at: DateTime<Local>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_instant() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 5, 12, 11, 26, 23).unwrap()
    }

    #[test]
    fn kind_field_serialises_as_type() {
        let msg = WsMessage::hello("deadbeef", "1.0.0");
        let value: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "hello");
        assert_eq!(value["payload"]["token"], "deadbeef");
        assert_eq!(value["payload"]["version"], "1.0.0");
    }

    #[test]
    fn payload_omitted_when_absent() {
        let encoded = serde_json::to_string(&WsMessage::ping()).unwrap();
        assert_eq!(encoded, r#"{"type":"ping"}"#);
    }

    #[test]
    fn screenshot_payload_carries_both_timestamp_shapes() {
        let msg = WsMessage::screenshot_detected(fixed_instant());
        let payload = msg.payload.unwrap();
        assert_eq!(payload["timestamp"], "11:26:23");
        let time = payload["time"].as_str().unwrap();
        assert!(
            time.starts_with("2025-05-12T11:26:23"),
            "unexpected time rendering: {time}"
        );
    }

    #[test]
    fn opaque_kinds_roundtrip() {
        let raw = r#"{"type":"test_broadcast","payload":{"foo":"bar"}}"#;
        let msg: WsMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.kind, "test_broadcast");
        assert_eq!(serde_json::to_string(&msg).unwrap(), raw);
    }

    #[test]
    fn token_accessor_reads_payload() {
        assert_eq!(WsMessage::hello_ack("cafe").token(), Some("cafe"));
        assert_eq!(WsMessage::ping().token(), None);
    }
}
