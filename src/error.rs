//! IKPdb client error types.

use thiserror::Error;

/// Errors from IKPdb client operations.
#[derive(Debug, Error)]
pub enum IkpdbError {
    /// Transport-level communication error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend reported that a command did not complete successfully.
    #[error("command {command} failed{}", format_messages(messages))]
    CommandFailed {
        /// Name of the command that failed.
        command: String,
        /// Failure detail lines from the backend, possibly empty.
        messages: Vec<String>,
    },

    /// A reply arrived but its payload did not have the expected shape.
    #[error("invalid reply payload: {0}")]
    InvalidReply(String),

    /// Operation requires an attached session.
    #[error("session not attached")]
    NotAttached,

    /// The session was torn down while the command was still in flight;
    /// its continuation was discarded without being invoked.
    #[error("command abandoned by detach")]
    Abandoned,

    /// `attach()` was called on a session that already left the
    /// disconnected state. Detached sessions are terminal; create a new one.
    #[error("session already attached")]
    AlreadyAttached,
}

fn format_messages(messages: &[String]) -> String {
    if messages.is_empty() {
        String::new()
    } else {
        format!(": {}", messages.join(" "))
    }
}
