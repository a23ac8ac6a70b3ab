//! ikpdb-client — wire-protocol client for the IKPdb remote debugger.
//!
//! This crate implements the client side of the IKPdb protocol. It handles
//! message framing, command/reply correlation, push-event routing, session
//! lifecycle, and three-way breakpoint synchronization. The socket itself
//! is supplied by the embedding application through the [`Transport`] trait
//! and an inbound frame channel.

pub mod breakpoint;
pub mod client;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod session;
pub mod sync;
pub mod transport;

// Re-export key types for convenience.
pub use breakpoint::Breakpoint;
pub use client::{DebugClient, StateChangeHandler};
pub use dispatcher::{CommandFailure, CommandOutcome, Dispatcher, EventHandler};
pub use error::IkpdbError;
pub use protocol::*;
pub use session::{DebugSession, SessionState};
pub use sync::{partition, synchronize, AfterSync, BreakpointDiff, SyncReport};
pub use transport::Transport;
