//! Reply correlation and push-event routing.
//!
//! Tracks in-flight commands by sequence number, resolves each continuation
//! at most once via a oneshot channel, and routes backend-initiated events
//! to the registered handler without touching the pending table.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::protocol::{DebugEvent, InboundMessage, Reply};

/// Callback invoked synchronously for backend-initiated events.
pub type EventHandler = Box<dyn Fn(DebugEvent) + Send + Sync>;

/// A command failure reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFailure {
    /// Name of the command that failed.
    pub command: String,
    /// Failure detail lines from the backend, possibly empty.
    pub messages: Vec<String>,
}

/// Outcome delivered to a pending continuation.
pub type CommandOutcome = Result<Reply, CommandFailure>;

/// Owns the pending-callback table and the command-name echo table.
///
/// At most one continuation exists per id, and ids are never reused within
/// a session, so a reply can never be ambiguous about which command it
/// answers.
pub struct Dispatcher {
    pending: HashMap<u64, oneshot::Sender<CommandOutcome>>,
    /// Names of in-flight commands, kept for failure messages.
    sent: HashMap<u64, String>,
    event_handler: Option<EventHandler>,
}

impl Dispatcher {
    /// Create an empty dispatcher with no event handler.
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            sent: HashMap::new(),
            event_handler: None,
        }
    }

    /// Set the handler for backend-initiated events.
    pub fn set_event_handler(&mut self, handler: EventHandler) {
        self.event_handler = Some(handler);
    }

    /// Register an in-flight command and return the receiver its outcome
    /// will be delivered on. Dropping the receiver is allowed; the tables
    /// are still cleaned up when the reply arrives.
    pub fn register(&mut self, id: u64, command: &str) -> oneshot::Receiver<CommandOutcome> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        self.sent.insert(id, command.to_string());
        rx
    }

    /// Remove an in-flight command without resolving it (transmit failed).
    pub fn unregister(&mut self, id: u64) {
        self.pending.remove(&id);
        self.sent.remove(&id);
    }

    /// How many commands are awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Route one decoded message.
    ///
    /// Events go straight to the handler. Replies remove their id from both
    /// tables unconditionally, then resolve the continuation with success or
    /// failure. A reply for an unknown id (e.g. a post-detach straggler) is
    /// logged and ignored.
    pub fn dispatch(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::Event(event) => {
                if let Some(handler) = &self.event_handler {
                    handler(event);
                } else {
                    tracing::debug!("push event dropped: no handler registered");
                }
            }
            InboundMessage::Reply(reply) => {
                let command = self.sent.remove(&reply.id);
                let Some(sender) = self.pending.remove(&reply.id) else {
                    tracing::warn!(id = reply.id, "ignoring reply for unknown command id");
                    return;
                };
                let outcome = if reply.is_success() {
                    Ok(reply)
                } else {
                    Err(CommandFailure {
                        command: command.unwrap_or_else(|| "<unknown>".into()),
                        messages: reply.messages,
                    })
                };
                // A dropped receiver means the caller did not want the reply;
                // table cleanup above already happened.
                let _ = sender.send(outcome);
            }
        }
    }

    /// Drop every pending continuation without resolving it, clear the echo
    /// table, and replace the event handler with a no-op. Used on detach.
    pub fn abandon_all(&mut self) {
        self.pending.clear();
        self.sent.clear();
        self.event_handler = None;
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
