//! The caller's handle on a streaming-chat connection.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use chatlink_protocol::{RequestFrame, RequestKind};

use crate::callbacks::SessionCallbacks;
use crate::driver::{Command, EVENT_CHANNEL_CAPACITY, SessionDriver};
use crate::transport::{Connector, TungsteniteConnector};
use crate::types::{ConfigUpdate, ConnectionState, SessionConfig, SessionSnapshot};

/// A resilient connection to one chat thread.
///
/// Frames sent while the socket is down are queued and flushed in order on
/// the next open. Unexpected closes are retried with exponential backoff;
/// [`disconnect`](Self::disconnect) and [`cancel`](Self::cancel) are not.
///
/// Every method returns immediately. The work runs on a driver task spawned
/// at construction, so a session must be created inside a Tokio runtime.
/// Dropping the handle disconnects.
#[derive(Debug)]
pub struct ConnectionSession {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionSession {
    /// Creates a session that opens real WebSocket connections. Does not
    /// connect yet.
    pub fn new(config: SessionConfig, callbacks: SessionCallbacks) -> Self {
        let connector = TungsteniteConnector::new(config.max_message_size);
        Self::with_connector(config, callbacks, Arc::new(connector))
    }

    /// Creates a session that opens sockets through `connector`.
    pub fn with_connector(
        config: SessionConfig,
        callbacks: SessionCallbacks,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state) = watch::channel(ConnectionState::Idle);

        let driver = SessionDriver::new(config, callbacks, connector, state_tx, events_tx);
        tokio::spawn(driver.run(commands_rx, events_rx));

        Self { commands, state }
    }

    /// Opens the socket. No-op while connecting or open. Resets the
    /// reconnect budget.
    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    /// Sends a frame now if the socket is open; otherwise queues it and
    /// starts connecting.
    pub fn send(&self, frame: RequestFrame) {
        self.command(Command::Send(frame));
    }

    /// Sends a chat turn on the configured thread.
    pub fn send_chat(&self, message: impl Into<String>) {
        self.command(Command::SendTurn {
            kind: RequestKind::Chat,
            message: message.into(),
        });
    }

    /// Sends a deep-research turn on the configured thread.
    pub fn send_research(&self, message: impl Into<String>) {
        self.command(Command::SendTurn {
            kind: RequestKind::DeepResearch,
            message: message.into(),
        });
    }

    /// Asks the backend to stop the current reply, then disconnects.
    /// Queued frames and partial reply text are discarded.
    pub fn cancel(&self) {
        self.command(Command::Cancel);
    }

    /// Closes the socket without scheduling a reconnect. Idempotent.
    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    /// Applies a partial config update. Takes effect on the next connect.
    pub fn update_config(&self, update: ConfigUpdate) {
        self.command(Command::UpdateConfig(update));
    }

    /// `true` only while the socket is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watches state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Point-in-time view of the session internals, taken after every
    /// earlier call on this handle has been processed. `None` if the driver
    /// has stopped.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Snapshot(tx)).ok()?;
        rx.await.ok()
    }

    fn command(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            debug!("session driver has stopped, dropping command");
        }
    }
}
