//! Protocol session: connection lifecycle, command dispatch, reply
//! correlation, and push-event routing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::codec;
use crate::dispatcher::{CommandOutcome, Dispatcher, EventHandler};
use crate::error::IkpdbError;
use crate::protocol::{Command, ExecutionStatus, Reply};
use crate::transport::Transport;

/// Connection state of a [`DebugSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection requested yet.
    Disconnected,
    /// A connection open has been requested on the transport.
    Connecting,
    /// Waiting for the framer's readiness signal.
    Handshaking,
    /// Steady state: every delivered frame is decoded and dispatched.
    Attached,
    /// Terminal. Attaching again requires a new session.
    Detached,
}

/// A session with an IKPdb backend.
///
/// Owns the connection state machine, the monotonic command-id counter, and
/// the pending-callback table. All replies and events flow through a single
/// reader task, so dispatches for one session never run concurrently.
pub struct DebugSession {
    state: SessionState,
    next_id: AtomicU64,
    dispatcher: Arc<Mutex<Dispatcher>>,
    transport: Mutex<Option<Box<dyn Transport>>>,
    reader: Option<JoinHandle<()>>,
}

impl DebugSession {
    /// Create a session routing push events to `on_event`.
    pub fn new(on_event: EventHandler) -> Self {
        let mut dispatcher = Dispatcher::new();
        dispatcher.set_event_handler(on_event);
        Self {
            state: SessionState::Disconnected,
            next_id: AtomicU64::new(0),
            dispatcher: Arc::new(Mutex::new(dispatcher)),
            transport: Mutex::new(None),
            reader: None,
        }
    }

    /// The current connection state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// How many commands are currently awaiting a reply.
    pub async fn pending_commands(&self) -> usize {
        self.dispatcher.lock().await.pending_count()
    }

    /// Attach to the backend: open the transport, wait for the framer's
    /// readiness signal, then start steady-state dispatch.
    ///
    /// The first frame delivered on `inbound` is interpreted purely as a
    /// readiness signal and is consumed and discarded regardless of content;
    /// every frame after it is decoded and dispatched.
    pub async fn attach(
        &mut self,
        mut transport: Box<dyn Transport>,
        mut inbound: mpsc::Receiver<String>,
    ) -> Result<(), IkpdbError> {
        if self.state != SessionState::Disconnected {
            return Err(IkpdbError::AlreadyAttached);
        }

        self.state = SessionState::Connecting;
        transport.connect()?;
        *self.transport.lock().await = Some(transport);

        let (ready_tx, ready_rx) = oneshot::channel();
        let dispatcher = self.dispatcher.clone();
        self.state = SessionState::Handshaking;
        self.reader = Some(tokio::spawn(async move {
            if inbound.recv().await.is_none() {
                // Framer went away before signalling readiness; dropping
                // ready_tx surfaces the failure to attach().
                return;
            }
            if ready_tx.send(()).is_err() {
                return;
            }
            while let Some(raw) = inbound.recv().await {
                if let Some(message) = codec::decode_message(&raw) {
                    dispatcher.lock().await.dispatch(message);
                }
            }
            tracing::debug!("inbound frame channel closed, reader exiting");
        }));

        match ready_rx.await {
            Ok(()) => {
                self.state = SessionState::Attached;
                tracing::debug!("session attached");
                Ok(())
            }
            // Connection failures do not transition state by themselves;
            // the caller decides whether to detach.
            Err(_) => Err(IkpdbError::Transport(
                "connection closed before readiness signal".into(),
            )),
        }
    }

    /// Assign the next id, register the continuation, encode and transmit.
    ///
    /// Fire-and-forget once handed to the transport: dropping the returned
    /// receiver is the "no continuation" case, and the reply still cleans up
    /// the pending tables when it arrives. No timeout is applied; a reply
    /// that never comes leaves the receiver pending until [`detach`] clears
    /// the table.
    ///
    /// [`detach`]: DebugSession::detach
    pub async fn send_command(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<oneshot::Receiver<CommandOutcome>, IkpdbError> {
        if self.state != SessionState::Attached {
            return Err(IkpdbError::NotAttached);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let rx = self.dispatcher.lock().await.register(id, name);
        let command = Command {
            name: name.into(),
            id,
            args,
        };
        let frame = codec::encode_command(&command);

        let send_result = match self.transport.lock().await.as_mut() {
            Some(transport) => transport.send(&frame),
            None => Err(IkpdbError::NotAttached),
        };
        if let Err(err) = send_result {
            self.dispatcher.lock().await.unregister(id);
            return Err(err);
        }
        tracing::debug!(id, command = name, "command sent");
        Ok(rx)
    }

    /// Send a command and wait for its reply.
    pub async fn request(&self, name: &str, args: serde_json::Value) -> Result<Reply, IkpdbError> {
        let rx = self.send_command(name, args).await?;
        match rx.await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(failure)) => Err(IkpdbError::CommandFailed {
                command: failure.command,
                messages: failure.messages,
            }),
            // Sender dropped without a reply: the table was cleared by detach.
            Err(_) => Err(IkpdbError::Abandoned),
        }
    }

    /// Issue a `reconnect` command and report whether the backend says the
    /// program is still running. The caller feeds that into the breakpoint
    /// synchronizer to decide what follows resynchronization.
    pub async fn reconnect(&self) -> Result<bool, IkpdbError> {
        let reply = self.request("reconnect", serde_json::json!({})).await?;
        Ok(reply.reported_execution_status() == Some(ExecutionStatus::Running))
    }

    /// Tear down the session: close the transport, abandon every in-flight
    /// command (continuations are never invoked), and drop the push-event
    /// handler. Terminal; the session cannot be reattached.
    pub async fn detach(&mut self) {
        if self.state == SessionState::Detached {
            return;
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut transport) = self.transport.lock().await.take() {
            transport.close();
        }
        self.dispatcher.lock().await.abandon_all();
        self.state = SessionState::Detached;
        tracing::debug!("session detached");
    }
}

impl std::fmt::Debug for DebugSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSession")
            .field("state", &self.state)
            .field("next_id", &self.next_id)
            .finish()
    }
}
