//! Breakpoint model and UI <-> wire conversions.

use serde::{Deserialize, Serialize};

/// A breakpoint as the UI tracks it.
///
/// `line` is 0-based (UI domain); the wire's `setBreakpoint` arguments use
/// 1-based lines and a bare file name, see [`Breakpoint::to_set_args`].
/// Reconciliation identity is the `(text, line, condition)` triple; the
/// backend id is assigned output, not a matching key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Source path as the UI shows it, with its leading slash.
    pub text: String,
    /// 0-based line.
    pub line: u32,
    /// Optional condition expression.
    #[serde(default)]
    pub condition: Option<String>,
    /// Backend-assigned breakpoint number; `None` until synced.
    #[serde(default)]
    pub id: Option<i64>,
}

impl Breakpoint {
    /// Create an unconditional breakpoint, not yet known to the backend.
    pub fn new(text: impl Into<String>, line: u32) -> Self {
        Self {
            text: text.into(),
            line,
            condition: None,
            id: None,
        }
    }

    /// Attach a condition expression.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Whether `other` denotes the same breakpoint for reconciliation.
    pub fn same_key(&self, other: &Breakpoint) -> bool {
        self.text == other.text && self.line == other.line && self.condition == other.condition
    }

    /// Arguments for the `setBreakpoint` command: file name without the
    /// leading slash, 1-based line, condition only when present.
    pub fn to_set_args(&self) -> serde_json::Value {
        let file_name = self.text.strip_prefix('/').unwrap_or(&self.text);
        let mut args = serde_json::json!({
            "file_name": file_name,
            "line_number": self.line + 1,
        });
        if let Some(condition) = &self.condition {
            args["condition"] = serde_json::Value::String(condition.clone());
        }
        args
    }
}
