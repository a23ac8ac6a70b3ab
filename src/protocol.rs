//! IKPdb protocol message types.
//!
//! Serde structures for the JSON payloads exchanged with the IKPdb proxy,
//! with field names matching the wire exactly (`_id`, `commandExecStatus`,
//! `line_number`, `f_locals`, ...).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// An outbound command envelope: `{"command": name, "_id": id, "args": args}`.
///
/// The id is assigned by the session on send and is unique and strictly
/// increasing for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// The command name, e.g. `"setBreakpoint"`.
    #[serde(rename = "command")]
    pub name: String,
    /// Sequence number used to correlate the reply.
    #[serde(rename = "_id")]
    pub id: u64,
    /// Command-specific arguments.
    pub args: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A decoded inbound message: either a reply to a command we sent, or a
/// backend-initiated push event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Correlated reply; carries the originating `_id`.
    Reply(Reply),
    /// Unsolicited event; carries no id and bypasses reply correlation.
    Event(DebugEvent),
}

/// A reply to a previously-sent command.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reply {
    /// Sequence number of the command this reply answers.
    #[serde(rename = "_id")]
    pub id: u64,
    /// Command-name echo, when the backend includes one.
    #[serde(default)]
    pub command: Option<String>,
    /// Completion status. Absent or `"error"` means the command failed.
    #[serde(rename = "commandExecStatus", default)]
    pub exec_status: Option<String>,
    /// Failure detail lines.
    #[serde(default)]
    pub messages: Vec<String>,
    /// Command-specific result payload.
    #[serde(default)]
    pub result: serde_json::Value,
    /// Argument echo, when the backend includes one.
    #[serde(default)]
    pub args: serde_json::Value,
    /// Execution status reported on the envelope itself; the `reconnect`
    /// reply puts it here rather than under `result`.
    #[serde(rename = "executionStatus", default)]
    pub execution_status: Option<String>,
}

impl Reply {
    /// Whether the backend reported successful completion. A missing
    /// `commandExecStatus` field counts as failure.
    pub fn is_success(&self) -> bool {
        matches!(self.exec_status.as_deref(), Some(status) if status != "error")
    }

    /// The execution status carried by this reply, wherever the backend
    /// put it (envelope field or `result.executionStatus`).
    pub fn reported_execution_status(&self) -> Option<ExecutionStatus> {
        let raw = self
            .execution_status
            .as_deref()
            .or_else(|| self.result.get("executionStatus").and_then(|v| v.as_str()))?;
        match raw {
            "running" => Some(ExecutionStatus::Running),
            "stopped" => Some(ExecutionStatus::Stopped),
            _ => None,
        }
    }
}

/// A backend-initiated push event.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    /// The program stopped: breakpoint hit, step completed, or an
    /// unmanaged exception.
    ProgramBreak(BreakEvent),
    /// The program ran to completion.
    ProgramEnd(BreakEvent),
}

/// Backend-authoritative state attached to a push event. Fields live on the
/// message envelope itself, not under `result`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BreakEvent {
    /// Call stack at the stop point, innermost frame first.
    #[serde(default)]
    pub frames: Vec<StackFrame>,
    /// Present when the stop was caused by an unmanaged exception.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

/// One stack frame as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Backend frame id, used by `evaluate` and `setVariable`.
    pub id: i64,
    /// Function or code-block name.
    pub name: String,
    /// Thread the frame belongs to.
    #[serde(default)]
    pub thread: Option<i64>,
    /// 1-based line in the wire domain.
    pub line_number: u32,
    /// Absolute path of the source file on the backend host.
    pub file_path: String,
    /// Local variables of the frame.
    #[serde(rename = "f_locals", default)]
    pub locals: Vec<RemoteVariable>,
}

impl StackFrame {
    /// The frame's line in the UI domain (0-based).
    pub fn ui_line(&self) -> u32 {
        self.line_number.saturating_sub(1)
    }
}

/// A variable as reported by the backend (frame locals, `evaluate` results,
/// `getProperties` children).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteVariable {
    /// Backend object id; used to fetch children via `getProperties`.
    #[serde(default)]
    pub id: Option<i64>,
    /// Variable name.
    pub name: String,
    /// Rendered value.
    pub value: String,
    /// Python type name.
    #[serde(rename = "type", default)]
    pub variable_type: Option<String>,
    /// Number of children, if the variable is a container.
    #[serde(default)]
    pub children_count: Option<i64>,
}

/// Exception details attached to a `programBreak` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Exception class name.
    #[serde(rename = "type")]
    pub exception_type: String,
    /// Exception message.
    pub info: String,
}

/// Result payload of the `evaluate` command.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvaluateResult {
    /// Rendered value of the expression.
    pub value: String,
    /// Python type name of the value.
    #[serde(rename = "type", default)]
    pub value_type: Option<String>,
}

/// Whether the debuggee is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// The program is executing.
    Running,
    /// The program is paused (breakpoint, step, exception).
    Stopped,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_command_wire_field_names() {
        let cmd = Command {
            name: "setBreakpoint".into(),
            id: 7,
            args: serde_json::json!({"file_name": "a.py", "line_number": 6}),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"command\":\"setBreakpoint\""));
        assert!(json.contains("\"_id\":7"));
        assert!(json.contains("\"args\""));

        let decoded: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, decoded);
    }

    #[test]
    fn protocol_reply_success_detection() {
        let reply: Reply = serde_json::from_str(
            r#"{"_id": 1, "commandExecStatus": "ok", "result": {}}"#,
        )
        .unwrap();
        assert!(reply.is_success());
    }

    #[test]
    fn protocol_reply_error_status_is_failure() {
        let reply: Reply = serde_json::from_str(
            r#"{"_id": 1, "commandExecStatus": "error", "messages": ["boom"]}"#,
        )
        .unwrap();
        assert!(!reply.is_success());
        assert_eq!(reply.messages, vec!["boom".to_string()]);
    }

    #[test]
    fn protocol_reply_missing_status_is_failure() {
        let reply: Reply = serde_json::from_str(r#"{"_id": 1, "result": {}}"#).unwrap();
        assert!(!reply.is_success());
    }

    #[test]
    fn protocol_reply_execution_status_in_result() {
        let reply: Reply = serde_json::from_str(
            r#"{"_id": 2, "commandExecStatus": "ok", "result": {"executionStatus": "stopped"}}"#,
        )
        .unwrap();
        assert_eq!(
            reply.reported_execution_status(),
            Some(ExecutionStatus::Stopped)
        );
    }

    #[test]
    fn protocol_reply_execution_status_on_envelope() {
        // The reconnect reply reports status on the envelope itself.
        let reply: Reply = serde_json::from_str(
            r#"{"_id": 3, "commandExecStatus": "ok", "executionStatus": "running"}"#,
        )
        .unwrap();
        assert_eq!(
            reply.reported_execution_status(),
            Some(ExecutionStatus::Running)
        );
    }

    #[test]
    fn protocol_reply_unknown_execution_status_ignored() {
        let reply: Reply = serde_json::from_str(
            r#"{"_id": 4, "commandExecStatus": "ok", "result": {"executionStatus": "terminated"}}"#,
        )
        .unwrap();
        assert_eq!(reply.reported_execution_status(), None);
    }

    #[test]
    fn protocol_break_event_from_envelope() {
        // frames/exception are top-level siblings of the command tag.
        let json = r#"{
            "command": "programBreak",
            "frames": [{
                "id": 11,
                "name": "main",
                "thread": 140,
                "line_number": 12,
                "file_path": "/work/a.py",
                "f_locals": [
                    {"id": 5, "name": "x", "value": "42", "type": "int", "children_count": 0}
                ]
            }],
            "exception": {"type": "ValueError", "info": "bad input"}
        }"#;
        let event: BreakEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.frames.len(), 1);

        let frame = &event.frames[0];
        assert_eq!(frame.name, "main");
        assert_eq!(frame.line_number, 12);
        assert_eq!(frame.ui_line(), 11);
        assert_eq!(frame.locals.len(), 1);
        assert_eq!(frame.locals[0].variable_type.as_deref(), Some("int"));

        let exception = event.exception.unwrap();
        assert_eq!(exception.exception_type, "ValueError");
        assert_eq!(exception.info, "bad input");
    }

    #[test]
    fn protocol_break_event_defaults_when_sparse() {
        let event: BreakEvent = serde_json::from_str(r#"{"command": "programEnd"}"#).unwrap();
        assert!(event.frames.is_empty());
        assert!(event.exception.is_none());
    }

    #[test]
    fn protocol_execution_status_serde() {
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::Running).unwrap(),
            "\"running\""
        );
        let status: ExecutionStatus = serde_json::from_str("\"stopped\"").unwrap();
        assert_eq!(status, ExecutionStatus::Stopped);
    }

    #[test]
    fn protocol_evaluate_result_parse() {
        let result: EvaluateResult =
            serde_json::from_str(r#"{"value": "3", "type": "int"}"#).unwrap();
        assert_eq!(result.value, "3");
        assert_eq!(result.value_type.as_deref(), Some("int"));
    }

    #[test]
    fn protocol_stack_frame_ui_line_saturates() {
        let frame = StackFrame {
            id: 1,
            name: "<module>".into(),
            thread: None,
            line_number: 0,
            file_path: "/a.py".into(),
            locals: vec![],
        };
        assert_eq!(frame.ui_line(), 0);
    }
}
