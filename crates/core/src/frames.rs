//! Duplex session wire frames.
//!
//! Every frame is a UTF-8 JSON object with a `type` discriminator. Frames
//! with an unrecognised `type` decode to [`ClientFrame::Unknown`] and are
//! dropped by the session reader.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FRAME_PING: &str = "ping";
pub const FRAME_PONG: &str = "pong";
pub const FRAME_CLIPBOARD_SYNC: &str = "clipboard_sync";
pub const FRAME_NOTIFICATION_SYNC: &str = "notification_sync";
pub const FRAME_SYNC_REQUEST: &str = "sync_request";
pub const FRAME_SYNC_ACK: &str = "sync_ack";
pub const FRAME_CONNECTED: &str = "connected";

/// A frame sent by a device over its session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Ping,
    Pong,
    SyncRequest {
        #[serde(default)]
        request_id: Option<serde_json::Value>,
    },
    #[serde(other)]
    Unknown,
}

impl ClientFrame {
    /// Decode a text frame. Returns `None` for anything that is not a JSON
    /// object with a string `type`.
    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// A frame sent by the hub to a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Pong,
    Connected { device_id: Uuid },
    SyncAck { request_id: Option<serde_json::Value> },
    ClipboardSync { data: serde_json::Value },
    NotificationSync { data: serde_json::Value },
}

impl ServerFrame {
    /// Serialize to the JSON text carried by a transport text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ping() {
        assert_eq!(ClientFrame::decode(r#"{"type":"ping"}"#), Some(ClientFrame::Ping));
    }

    #[test]
    fn decodes_sync_request_with_and_without_id() {
        assert_eq!(
            ClientFrame::decode(r#"{"type":"sync_request","request_id":"r1"}"#),
            Some(ClientFrame::SyncRequest {
                request_id: Some(serde_json::json!("r1"))
            })
        );
        assert_eq!(
            ClientFrame::decode(r#"{"type":"sync_request"}"#),
            Some(ClientFrame::SyncRequest { request_id: None })
        );
    }

    #[test]
    fn unknown_type_is_tolerated() {
        assert_eq!(
            ClientFrame::decode(r#"{"type":"telemetry","cpu":3}"#),
            Some(ClientFrame::Unknown)
        );
    }

    #[test]
    fn garbage_does_not_decode() {
        assert_eq!(ClientFrame::decode("not json"), None);
        assert_eq!(ClientFrame::decode(r#"{"kind":"ping"}"#), None);
    }

    #[test]
    fn pong_encodes_bare_type() {
        assert_eq!(ServerFrame::Pong.encode().unwrap(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn clipboard_sync_wraps_data() {
        let frame = ServerFrame::ClipboardSync {
            data: serde_json::json!({"id": "x"}),
        };
        let json: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(json["type"], FRAME_CLIPBOARD_SYNC);
        assert_eq!(json["data"]["id"], "x");
    }
}
