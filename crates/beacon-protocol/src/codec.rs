//! Decode and encode entry points for the wire envelope.

use crate::events::{ClientEvent, ServerEvent};
use serde_json::Value;
use thiserror::Error;

/// Protocol errors. The display string is the reply message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is not valid JSON.
    #[error("Invalid JSON")]
    InvalidJson,

    /// JSON object without a recognized `event` tag.
    #[error("Unknown event")]
    UnknownEvent(String),

    /// Recognized event with missing or mistyped fields. The inner string
    /// carries the serde detail for logs.
    #[error("Invalid payload")]
    Payload(String),

    /// Outbound frame failed to serialize.
    #[error("Encode failed")]
    Encode(String),
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// - [`ProtocolError::InvalidJson`] when the frame is not JSON;
/// - [`ProtocolError::UnknownEvent`] when the `event` tag is absent or not
///   one of the recognized kinds;
/// - [`ProtocolError::Payload`] when the tag is known but fields are wrong.
pub fn decode_client(raw: &str) -> Result<ClientEvent, ProtocolError> {
    let value: Value = serde_json::from_str(raw).map_err(|_| ProtocolError::InvalidJson)?;
    let tag = value
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !ClientEvent::is_known(tag) {
        return Err(ProtocolError::UnknownEvent(tag.to_string()));
    }
    serde_json::from_value(value).map_err(|e| ProtocolError::Payload(e.to_string()))
}

/// Serialize one outbound frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_server(event: &ServerEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(|e| ProtocolError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            decode_client("not json"),
            Err(ProtocolError::InvalidJson)
        ));
        assert_eq!(
            decode_client("{{").unwrap_err().to_string(),
            "Invalid JSON"
        );
    }

    #[test]
    fn rejects_unknown_events() {
        let err = decode_client(r#"{"event":"teleport"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownEvent(ref tag) if tag == "teleport"));
        assert_eq!(err.to_string(), "Unknown event");

        // A frame without any event tag is just as unknown.
        assert!(matches!(
            decode_client(r#"{"data": 1}"#),
            Err(ProtocolError::UnknownEvent(_))
        ));
    }

    #[test]
    fn rejects_bad_payloads_for_known_events() {
        // joinLive requires roomId
        assert!(matches!(
            decode_client(r#"{"event":"joinLive"}"#),
            Err(ProtocolError::Payload(_))
        ));
        // message requires both receiverId and message
        assert!(matches!(
            decode_client(r#"{"event":"message","receiverId":"bob"}"#),
            Err(ProtocolError::Payload(_))
        ));
    }

    #[test]
    fn decodes_known_events() {
        let event = decode_client(r#"{"event":"joinLive","roomId":"s1"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinLive {
                room_id: "s1".into()
            }
        );

        let event = decode_client(r#"{"event":"onlineUsers"}"#).unwrap();
        assert_eq!(event, ClientEvent::OnlineUsers);
    }

    #[test]
    fn encode_round_trip() {
        let frame = ServerEvent::error("Authenticate first");
        let raw = encode_server(&frame).unwrap();
        assert_eq!(raw, r#"{"event":"error","message":"Authenticate first"}"#);
    }
}
