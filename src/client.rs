//! Typed command surface over a [`DebugSession`].
//!
//! Wraps the raw request machinery with the backend's command vocabulary
//! and tracks the reported execution status, notifying a callback only
//! when the value actually changes.

use tokio::sync::mpsc;

use crate::breakpoint::Breakpoint;
use crate::dispatcher::EventHandler;
use crate::error::IkpdbError;
use crate::protocol::{EvaluateResult, ExecutionStatus, RemoteVariable, StackFrame};
use crate::session::{DebugSession, SessionState};
use crate::sync::{synchronize, AfterSync, SyncReport};
use crate::transport::Transport;

/// Callback invoked when the tracked execution status changes.
pub type StateChangeHandler = Box<dyn Fn(Option<ExecutionStatus>) + Send + Sync>;

/// High-level debugger client.
///
/// Every operation is a thin translation to the wire vocabulary; the
/// session underneath owns correlation and lifecycle. Execution-state
/// bookkeeping lives here so the embedding UI gets one deduplicated
/// stream of status changes.
pub struct DebugClient {
    session: DebugSession,
    execution: Option<ExecutionStatus>,
    on_state_change: Option<StateChangeHandler>,
}

impl DebugClient {
    /// Create a client routing backend push events to `on_event`.
    pub fn new(on_event: EventHandler) -> Self {
        Self {
            session: DebugSession::new(on_event),
            execution: None,
            on_state_change: None,
        }
    }

    /// Set the callback for execution-status changes.
    pub fn set_state_change_handler(&mut self, handler: StateChangeHandler) {
        self.on_state_change = Some(handler);
    }

    /// The underlying session, for raw requests the typed surface lacks.
    pub fn session(&self) -> &DebugSession {
        &self.session
    }

    /// Connection state of the underlying session.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Last execution status reported by the backend, if any.
    pub fn execution_status(&self) -> Option<ExecutionStatus> {
        self.execution
    }

    /// Attach to the backend over the given plumbing.
    pub async fn attach(
        &mut self,
        transport: Box<dyn Transport>,
        inbound: mpsc::Receiver<String>,
    ) -> Result<(), IkpdbError> {
        self.session.attach(transport, inbound).await
    }

    /// Tear the session down and forget the tracked execution status.
    pub async fn detach(&mut self) {
        self.session.detach().await;
        self.set_execution(None);
    }

    /// Start the debugged script.
    pub async fn run_script(&mut self) -> Result<Option<ExecutionStatus>, IkpdbError> {
        self.execution_command("runScript").await
    }

    /// Step over the current line.
    pub async fn step_over(&mut self) -> Result<Option<ExecutionStatus>, IkpdbError> {
        self.execution_command("stepOver").await
    }

    /// Step into the call on the current line.
    pub async fn step_into(&mut self) -> Result<Option<ExecutionStatus>, IkpdbError> {
        self.execution_command("stepInto").await
    }

    /// Step out of the current frame.
    pub async fn step_out(&mut self) -> Result<Option<ExecutionStatus>, IkpdbError> {
        self.execution_command("stepOut").await
    }

    /// Resume execution until the next break.
    pub async fn resume(&mut self) -> Result<Option<ExecutionStatus>, IkpdbError> {
        self.execution_command("resume").await
    }

    /// Ask the backend for its current execution status.
    pub async fn get_status(&mut self) -> Result<Option<ExecutionStatus>, IkpdbError> {
        self.execution_command("getStatus").await
    }

    /// Evaluate `expression`, optionally in the context of a stopped frame.
    pub async fn evaluate(
        &self,
        expression: &str,
        frame: Option<&StackFrame>,
        global: bool,
        disable_break: bool,
    ) -> Result<EvaluateResult, IkpdbError> {
        let args = serde_json::json!({
            "expression": expression,
            "frame": frame.map(|f| f.id),
            "thread": frame.and_then(|f| f.thread),
            "global": global,
            "disableBreak": disable_break,
        });
        let reply = self.session.request("evaluate", args).await?;
        serde_json::from_value(reply.result)
            .map_err(|err| IkpdbError::InvalidReply(format!("evaluate result: {err}")))
    }

    /// Assign `value` to `name` within the given frame.
    pub async fn set_variable(
        &self,
        frame_id: i64,
        name: &str,
        value: &str,
    ) -> Result<(), IkpdbError> {
        self.session
            .request(
                "setVariable",
                serde_json::json!({"frame": frame_id, "name": name, "value": value}),
            )
            .await?;
        Ok(())
    }

    /// Expand a container variable's children.
    ///
    /// A reply without children is an error: the backend only hands out
    /// expandable ids, so an empty expansion means the id went stale.
    pub async fn get_properties(
        &self,
        variable_id: i64,
    ) -> Result<Vec<RemoteVariable>, IkpdbError> {
        let reply = self
            .session
            .request("getProperties", serde_json::json!({"id": variable_id}))
            .await?;
        let properties = reply
            .result
            .get("properties")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let children: Vec<RemoteVariable> = serde_json::from_value(properties)
            .map_err(|err| IkpdbError::InvalidReply(format!("getProperties result: {err}")))?;
        if children.is_empty() {
            return Err(IkpdbError::InvalidReply(format!(
                "variable {variable_id} has no children"
            )));
        }
        Ok(children)
    }

    /// Enable or disable an existing backend breakpoint.
    pub async fn change_breakpoint_state(
        &self,
        breakpoint_number: i64,
        enabled: bool,
    ) -> Result<(), IkpdbError> {
        self.session
            .request(
                "changeBreakpointState",
                serde_json::json!({"breakpoint_number": breakpoint_number, "enabled": enabled}),
            )
            .await?;
        Ok(())
    }

    /// List the breakpoints the backend currently holds.
    pub async fn list_breakpoints(&self) -> Result<Vec<Breakpoint>, IkpdbError> {
        let reply = self
            .session
            .request("getBreakpoints", serde_json::json!({}))
            .await?;
        serde_json::from_value(reply.result)
            .map_err(|err| IkpdbError::InvalidReply(format!("getBreakpoints result: {err}")))
    }

    /// Reconcile `local` against the backend and track the resulting
    /// execution status.
    pub async fn sync_breakpoints(
        &mut self,
        local: Vec<Breakpoint>,
        after: AfterSync,
    ) -> Result<SyncReport, IkpdbError> {
        let report = synchronize(&self.session, local, after).await?;
        if report.execution.is_some() {
            self.set_execution(report.execution);
        }
        Ok(report)
    }

    /// Re-establish protocol state after the embedding application has
    /// restored the connection: tell the backend we are back, then
    /// resynchronize breakpoints. Never re-runs the script; execution is
    /// only queried, whatever the backend reported on reconnect.
    pub async fn reconnect_sync(
        &mut self,
        local: Vec<Breakpoint>,
    ) -> Result<SyncReport, IkpdbError> {
        let running = self.session.reconnect().await?;
        tracing::debug!(running, "backend acknowledged reconnect");
        self.sync_breakpoints(local, AfterSync::QueryStatus).await
    }

    async fn execution_command(
        &mut self,
        name: &str,
    ) -> Result<Option<ExecutionStatus>, IkpdbError> {
        let reply = self.session.request(name, serde_json::json!({})).await?;
        let status = reply.reported_execution_status();
        if status.is_some() {
            self.set_execution(status);
        }
        Ok(status)
    }

    fn set_execution(&mut self, next: Option<ExecutionStatus>) {
        if self.execution == next {
            return;
        }
        self.execution = next;
        if let Some(handler) = &self.on_state_change {
            handler(next);
        }
    }
}

impl std::fmt::Debug for DebugClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugClient")
            .field("session", &self.session)
            .field("execution", &self.execution)
            .finish()
    }
}
