//! Wire framing for the IKPdb proxy protocol.
//!
//! One message per frame, in both directions:
//!
//! ```text
//! "length=" <decimal byte length of json> <SENTINEL> <json>
//! ```
//!
//! The length prefix is advisory framing metadata for the layer below the
//! framer; decoding only relies on the sentinel.

use crate::protocol::{BreakEvent, Command, DebugEvent, InboundMessage, Reply};

/// Fixed delimiter between framing metadata and the JSON payload. Shared by
/// both directions of the protocol; must match the backend exactly.
pub const SENTINEL: &str = "LLADpcdtbdpac";

/// Encode a command into a single wire frame.
pub fn encode_command(command: &Command) -> String {
    // Serialization cannot fail here: every field is a plain string, an
    // integer, or an already-parsed JSON value.
    let json = serde_json::to_string(command).unwrap_or_default();
    format!("length={}{}{}", json.len(), SENTINEL, json)
}

/// Decode one framed message.
///
/// Malformed frames are tolerated, not fatal: a missing sentinel, an
/// unparsable or non-object payload, or an unclassifiable shape is logged
/// and yields `None`. The caller never sees an error for bad bytes.
pub fn decode_message(raw: &str) -> Option<InboundMessage> {
    let payload = match raw.split_once(SENTINEL) {
        Some((_prefix, payload)) => payload,
        None => {
            tracing::warn!("dropping frame without sentinel");
            return None;
        }
    };

    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("dropping unparsable frame payload: {err}");
            return None;
        }
    };
    if !value.is_object() {
        tracing::warn!("dropping non-object frame payload");
        return None;
    }

    // Push events bypass reply correlation entirely: they are classified by
    // command tag and carry no id.
    let tag = value
        .get("command")
        .and_then(|tag| tag.as_str())
        .map(str::to_owned);
    match tag.as_deref() {
        Some("programBreak") => {
            return decode_event(value).map(|body| InboundMessage::Event(DebugEvent::ProgramBreak(body)))
        }
        Some("programEnd") => {
            return decode_event(value).map(|body| InboundMessage::Event(DebugEvent::ProgramEnd(body)))
        }
        _ => {}
    }

    if value.get("_id").is_none() {
        tracing::debug!("dropping message with no id and no recognized event tag");
        return None;
    }
    match serde_json::from_value::<Reply>(value) {
        Ok(reply) => Some(InboundMessage::Reply(reply)),
        Err(err) => {
            tracing::warn!("dropping malformed reply: {err}");
            None
        }
    }
}

fn decode_event(value: serde_json::Value) -> Option<BreakEvent> {
    match serde_json::from_value(value) {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::warn!("dropping malformed push event: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(json: &str) -> String {
        format!("length={}{}{}", json.len(), SENTINEL, json)
    }

    #[test]
    fn codec_encode_frame_layout() {
        let cmd = Command {
            name: "getStatus".into(),
            id: 1,
            args: serde_json::json!({}),
        };
        let encoded = encode_command(&cmd);
        assert!(encoded.starts_with("length="));
        assert!(encoded.contains(SENTINEL));

        // The length prefix is the byte length of the JSON after the sentinel.
        let (prefix, json) = encoded.split_once(SENTINEL).unwrap();
        let declared: usize = prefix.strip_prefix("length=").unwrap().parse().unwrap();
        assert_eq!(declared, json.len());
    }

    #[test]
    fn codec_length_prefix_counts_bytes_not_chars() {
        let cmd = Command {
            name: "evaluate".into(),
            id: 2,
            args: serde_json::json!({"expression": "réponse"}),
        };
        let encoded = encode_command(&cmd);
        let (prefix, json) = encoded.split_once(SENTINEL).unwrap();
        let declared: usize = prefix.strip_prefix("length=").unwrap().parse().unwrap();
        assert_eq!(declared, json.len());
        assert_ne!(json.len(), json.chars().count());
    }

    #[test]
    fn codec_round_trip_reconstructs_command() {
        let cmd = Command {
            name: "setBreakpoint".into(),
            id: 42,
            args: serde_json::json!({"file_name": "a.py", "line_number": 6, "condition": "x > 1"}),
        };
        let decoded = decode_message(&encode_command(&cmd)).unwrap();
        match decoded {
            InboundMessage::Reply(reply) => {
                assert_eq!(reply.id, 42);
                assert_eq!(reply.command.as_deref(), Some("setBreakpoint"));
                assert_eq!(reply.args, cmd.args);
            }
            other => panic!("expected reply-shaped message, got {other:?}"),
        }
    }

    #[test]
    fn codec_decode_reply() {
        let json = r#"{"_id": 3, "commandExecStatus": "ok", "result": {"executionStatus": "running"}}"#;
        let decoded = decode_message(&frame(json)).unwrap();
        match decoded {
            InboundMessage::Reply(reply) => {
                assert_eq!(reply.id, 3);
                assert!(reply.is_success());
            }
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn codec_decode_program_break_event() {
        let json = r#"{"command": "programBreak", "frames": [{"id": 1, "name": "f", "line_number": 3, "file_path": "/a.py"}]}"#;
        let decoded = decode_message(&frame(json)).unwrap();
        match decoded {
            InboundMessage::Event(DebugEvent::ProgramBreak(event)) => {
                assert_eq!(event.frames.len(), 1);
                assert_eq!(event.frames[0].file_path, "/a.py");
            }
            other => panic!("expected programBreak event, got {other:?}"),
        }
    }

    #[test]
    fn codec_decode_program_end_event() {
        let decoded = decode_message(&frame(r#"{"command": "programEnd"}"#)).unwrap();
        assert!(matches!(
            decoded,
            InboundMessage::Event(DebugEvent::ProgramEnd(_))
        ));
    }

    #[test]
    fn codec_missing_sentinel_dropped() {
        assert!(decode_message(r#"length=2{}"#).is_none());
    }

    #[test]
    fn codec_corrupt_json_dropped() {
        assert!(decode_message(&frame(r#"{"_id": 3, "resu"#)).is_none());
    }

    #[test]
    fn codec_non_object_payload_dropped() {
        assert!(decode_message(&frame("42")).is_none());
        assert!(decode_message(&frame("[1, 2]")).is_none());
        assert!(decode_message(&frame("null")).is_none());
    }

    #[test]
    fn codec_no_id_no_tag_dropped() {
        assert!(decode_message(&frame(r#"{"result": {}}"#)).is_none());
    }

    #[test]
    fn codec_non_integer_id_dropped() {
        assert!(decode_message(&frame(r#"{"_id": "seven"}"#)).is_none());
    }

    #[test]
    fn codec_sentinel_split_uses_first_occurrence() {
        // A sentinel inside a JSON string must not confuse decoding.
        let json = format!(r#"{{"_id": 9, "commandExecStatus": "ok", "result": {{"value": "{SENTINEL}"}}}}"#);
        let decoded = decode_message(&frame(&json)).unwrap();
        match decoded {
            InboundMessage::Reply(reply) => {
                assert_eq!(reply.result["value"], SENTINEL);
            }
            other => panic!("expected reply, got {other:?}"),
        }
    }
}
