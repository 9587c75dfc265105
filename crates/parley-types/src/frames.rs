use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Frames sent by the server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayFrame {
    /// Server confirms the connection is registered and live
    Ready { username: String },

    /// A message addressed to this connection's user
    Message(Message),

    /// The server could not process the client's last frame.
    /// `persisted` tells the sender whether the message made it to the
    /// store despite the failure.
    Error { reason: String, persisted: bool },
}

/// Inbound frame from a client: one direct message. The server ignores
/// `sender_id` and uses the authenticated identity instead, so a client
/// cannot spoof another sender.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    #[serde(default)]
    pub sender_id: Option<String>,
    pub recipient_id: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frame_sender_is_optional() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"recipient_id":"bob","content":"hi"}"#).unwrap();
        assert_eq!(frame.sender_id, None);
        assert_eq!(frame.recipient_id, "bob");
        assert_eq!(frame.content, "hi");
    }

    #[test]
    fn client_frame_accepts_spoofed_sender_field() {
        // Older clients send their own sender_id; it parses but is ignored upstream.
        let frame: ClientFrame = serde_json::from_str(
            r#"{"sender_id":"mallory","recipient_id":"bob","content":"hi"}"#,
        )
        .unwrap();
        assert_eq!(frame.sender_id.as_deref(), Some("mallory"));
    }

    #[test]
    fn gateway_frame_is_tagged() {
        let frame = GatewayFrame::Ready {
            username: "alice".into(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""type":"Ready""#));
    }
}
