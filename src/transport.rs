//! Transport boundary.
//!
//! The socket itself, along with its reconnect and backoff mechanics, lives
//! in the embedding application; the session only needs connect/send/close.
//! Inbound traffic is delivered by the external framer as complete message
//! strings over the channel handed to
//! [`DebugSession::attach`](crate::session::DebugSession::attach): the first
//! delivery is a readiness signal, every one after that is a protocol frame.

use crate::error::IkpdbError;

/// Outbound half of the debugger connection.
pub trait Transport: Send {
    /// Request a connection open.
    fn connect(&mut self) -> Result<(), IkpdbError>;

    /// Hand one encoded frame to the transport. The transport owns any
    /// buffering; the session applies no back-pressure of its own.
    fn send(&mut self, frame: &str) -> Result<(), IkpdbError>;

    /// Close the connection.
    fn close(&mut self);
}
