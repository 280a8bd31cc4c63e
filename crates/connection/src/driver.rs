//! The task that owns a session's socket and state.
//!
//! Every mutation happens here, one input at a time: caller commands from
//! the [`ConnectionSession`](crate::ConnectionSession) handle, and socket
//! events posted by the connect task, the pumps and reconnect timers.
//! Socket events carry a generation number; letting go of a socket bumps
//! the current generation first, so nothing the old socket says afterwards
//! (including its close) can reach the callbacks or trigger a reconnect.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use chatlink_protocol::constants::{WS_WRITE_QUEUE_CAPACITY, is_normal_close};
use chatlink_protocol::{FrameCodec, RequestFrame, RequestKind, validate_endpoint};

use crate::accumulator::StreamAccumulator;
use crate::callbacks::SessionCallbacks;
use crate::error::SessionError;
use crate::pumps::{ping::ping_pump, read::read_pump, write::write_pump};
use crate::queue::OutboundQueue;
use crate::reconnection::{ReconnectPolicy, reconnect_timer};
use crate::transport::{CloseInfo, Connector, SocketEvent, WsSink, WsStream};
use crate::types::{ConfigUpdate, ConnectionState, SessionConfig, SessionSnapshot};

/// Capacity of the socket-event channel feeding the driver.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Requests from the session handle.
pub(crate) enum Command {
    Connect,
    Send(RequestFrame),
    /// A turn addressed to the configured thread.
    SendTurn {
        kind: RequestKind,
        message: String,
    },
    Cancel,
    Disconnect,
    UpdateConfig(ConfigUpdate),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Who asked for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// The caller, through `connect()`. Starts a fresh retry budget.
    Caller,
    /// `send()` found no socket.
    Send,
    /// A reconnect timer fired.
    Retry,
}

/// The live socket.
struct Socket {
    generation: u64,
    /// Set once the handshake completes.
    writer: Option<mpsc::Sender<tungstenite::Message>>,
    /// Stops the connect task, read pump and ping pump.
    reader: CancellationToken,
    /// Hard-stops the write pump.
    writer_abort: CancellationToken,
}

/// A socket being closed on purpose, waiting for its write pump to flush.
struct Closing {
    generation: u64,
    writer_abort: CancellationToken,
}

struct PendingTimer {
    id: u64,
    cancel: CancellationToken,
}

pub(crate) struct SessionDriver {
    config: SessionConfig,
    callbacks: SessionCallbacks,
    connector: Arc<dyn Connector>,
    codec: FrameCodec,
    policy: ReconnectPolicy,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    socket: Option<Socket>,
    closing: Option<Closing>,
    /// Connect requested while `Closing`; runs once the close finishes.
    connect_after_close: Option<Trigger>,
    generation: u64,
    reconnect_attempts: u32,
    intentional_close: bool,
    queue: OutboundQueue,
    accumulator: StreamAccumulator,
    reconnect_timer: Option<PendingTimer>,
    next_timer_id: u64,
    events_tx: mpsc::Sender<SocketEvent>,
}

impl SessionDriver {
    pub(crate) fn new(
        config: SessionConfig,
        callbacks: SessionCallbacks,
        connector: Arc<dyn Connector>,
        state_tx: watch::Sender<ConnectionState>,
        events_tx: mpsc::Sender<SocketEvent>,
    ) -> Self {
        Self {
            codec: FrameCodec::new(config.max_message_size),
            policy: ReconnectPolicy::new(config.reconnect.clone()),
            config,
            callbacks,
            connector,
            state: ConnectionState::Idle,
            state_tx,
            socket: None,
            closing: None,
            connect_after_close: None,
            generation: 0,
            reconnect_attempts: 0,
            intentional_close: false,
            queue: OutboundQueue::new(),
            accumulator: StreamAccumulator::new(),
            reconnect_timer: None,
            next_timer_id: 0,
            events_tx,
        }
    }

    /// Processes inputs until the session handle is dropped, then tears the
    /// socket down.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::Receiver<SocketEvent>,
    ) {
        loop {
            tokio::select! {
                biased;
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event).await,
            }
        }

        self.disconnect();
        debug!("session driver stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => self.connect(Trigger::Caller),
            Command::Send(frame) => self.send(frame).await,
            Command::SendTurn { kind, message } => {
                let thread_id = self.config.thread_id.clone().unwrap_or_default();
                let frame = match kind {
                    RequestKind::DeepResearch => RequestFrame::deep_research(thread_id, message),
                    RequestKind::Chat => RequestFrame::chat(thread_id, message),
                    RequestKind::Cancel => RequestFrame::cancel(thread_id),
                };
                self.send(frame).await;
            }
            Command::Cancel => self.cancel().await,
            Command::Disconnect => self.disconnect(),
            Command::UpdateConfig(update) => {
                if let Some(callbacks) = update.apply_to(&mut self.config) {
                    self.callbacks.merge(callbacks);
                }
                debug!(endpoint = %self.config.endpoint(), "session config updated");
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn handle_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Opened {
                generation,
                sink,
                stream,
            } => self.on_open(generation, sink, stream).await,
            SocketEvent::ConnectFailed { generation, error } => {
                if self.is_current(generation) {
                    self.on_connect_failed(error);
                }
            }
            SocketEvent::Frame { generation, text } => {
                if self.is_current(generation) {
                    self.on_frame(&text);
                }
            }
            SocketEvent::Error { generation, error } => {
                if self.is_current(generation) {
                    warn!(generation, error = %error, "socket error");
                    self.callbacks.error(SessionError::Transport(error));
                }
            }
            SocketEvent::Closed { generation, close } => {
                if self.is_closing(generation) {
                    self.finish_closing();
                } else if self.is_current(generation) {
                    self.on_close(close);
                } else {
                    trace!(generation, "ignoring close from detached socket");
                }
            }
            SocketEvent::Released { generation } => {
                if self.is_closing(generation) {
                    self.finish_closing();
                }
            }
            SocketEvent::ReconnectDue { timer } => {
                let ours = self.reconnect_timer.as_ref().is_some_and(|t| t.id == timer);
                if !ours {
                    return;
                }
                self.reconnect_timer = None;
                if self.intentional_close || self.state != ConnectionState::Closed {
                    return;
                }
                info!(attempt = self.reconnect_attempts, "reconnecting");
                self.connect(Trigger::Retry);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    fn connect(&mut self, trigger: Trigger) {
        if self.state.is_active() {
            debug!(state = ?self.state, "connect ignored: already connecting or open");
            return;
        }
        if self.state == ConnectionState::Closing {
            debug!("connect deferred until the closing socket is released");
            self.connect_after_close = Some(match self.connect_after_close {
                Some(Trigger::Caller) => Trigger::Caller,
                _ => trigger,
            });
            return;
        }

        self.cancel_reconnect_timer();
        if trigger == Trigger::Caller {
            self.reconnect_attempts = 0;
        }
        self.intentional_close = false;

        let url = self.config.endpoint();
        if let Err(e) = validate_endpoint(&url) {
            warn!(url = %url, error = %e, "cannot connect");
            self.callbacks.error(SessionError::ConnectFailure {
                url,
                reason: e.to_string(),
            });
            return;
        }

        if !self.transition(ConnectionState::Connecting) {
            return;
        }
        self.generation += 1;
        let generation = self.generation;
        let reader = CancellationToken::new();
        info!(url = %url, generation, ?trigger, "connecting");

        let connecting = self.connector.connect(&url);
        let events_tx = self.events_tx.clone();
        let cancel = reader.clone();
        tokio::spawn(async move {
            let event = tokio::select! {
                _ = cancel.cancelled() => return,
                result = connecting => match result {
                    Ok((sink, stream)) => SocketEvent::Opened { generation, sink, stream },
                    Err(error) => SocketEvent::ConnectFailed { generation, error },
                },
            };
            let _ = events_tx.send(event).await;
        });

        self.socket = Some(Socket {
            generation,
            writer: None,
            reader,
            writer_abort: CancellationToken::new(),
        });
    }

    async fn send(&mut self, frame: RequestFrame) {
        if self.state == ConnectionState::Open {
            self.transmit(frame).await;
            return;
        }

        trace!(state = ?self.state, kind = ?frame.kind, "socket not open, queueing frame");
        self.queue.enqueue(frame);
        if !self.state.is_active() {
            self.connect(Trigger::Send);
        }
    }

    async fn cancel(&mut self) {
        if self.state == ConnectionState::Open {
            let thread_id = self.config.thread_id.clone().unwrap_or_default();
            self.transmit(RequestFrame::cancel(thread_id)).await;
        } else {
            debug!(state = ?self.state, "cancel: socket not open, skipping cancel frame");
        }
        self.disconnect();
    }

    /// Intentional close. Idempotent.
    fn disconnect(&mut self) {
        self.intentional_close = true;
        self.connect_after_close = None;
        self.cancel_reconnect_timer();
        self.queue.clear();
        self.accumulator.clear();
        self.reconnect_attempts = 0;

        let Some(socket) = self.socket.take() else {
            return;
        };

        // Detach before closing so the close cannot schedule a reconnect.
        self.generation += 1;
        socket.reader.cancel();

        match socket.writer {
            Some(writer) => {
                // Dropping the last sender lets the write pump flush and close.
                drop(writer);
                if let Some(previous) = self.closing.take() {
                    previous.writer_abort.cancel();
                }
                self.closing = Some(Closing {
                    generation: socket.generation,
                    writer_abort: socket.writer_abort,
                });
                self.transition(ConnectionState::Closing);
            }
            None => {
                self.transition(ConnectionState::Closed);
            }
        }
        info!(generation = socket.generation, "disconnected");
    }

    // -----------------------------------------------------------------------
    // Socket events
    // -----------------------------------------------------------------------

    async fn on_open(&mut self, generation: u64, sink: WsSink, stream: WsStream) {
        let Some(socket) = self.socket.as_mut().filter(|s| s.generation == generation) else {
            debug!(generation, "dropping socket from a superseded connect");
            return;
        };

        let (write_tx, write_rx) = mpsc::channel(WS_WRITE_QUEUE_CAPACITY);
        tokio::spawn(write_pump(
            sink,
            write_rx,
            generation,
            self.events_tx.clone(),
            socket.writer_abort.clone(),
            socket.reader.clone(),
        ));
        tokio::spawn(read_pump(
            stream,
            generation,
            write_tx.clone(),
            self.events_tx.clone(),
            socket.reader.clone(),
        ));
        if let Some(period) = self.config.keepalive {
            tokio::spawn(ping_pump(period, write_tx.clone(), socket.reader.clone()));
        }
        socket.writer = Some(write_tx);

        self.transition(ConnectionState::Open);
        self.reconnect_attempts = 0;
        info!(generation, "connected");
        self.callbacks.connected();

        let pending = self.queue.drain();
        if !pending.is_empty() {
            debug!(count = pending.len(), "flushing queued frames");
        }
        for frame in pending {
            self.transmit(frame).await;
        }
    }

    fn on_connect_failed(&mut self, error: tungstenite::Error) {
        if let tungstenite::Error::Url(e) = &error {
            // Same as a socket that cannot be constructed: no retry.
            let url = self.config.endpoint();
            warn!(url = %url, error = %e, "cannot connect");
            if let Some(socket) = self.socket.take() {
                socket.reader.cancel();
            }
            self.transition(ConnectionState::Closed);
            self.callbacks.error(SessionError::ConnectFailure {
                url,
                reason: e.to_string(),
            });
            return;
        }

        warn!(error = %error, "connection attempt failed");
        self.callbacks.error(SessionError::Transport(error));
        self.on_close(None);
    }

    fn on_frame(&mut self, text: &str) {
        match self.codec.decode(text) {
            Ok(event) => {
                trace!(kind = %event.kind, "inbound event");
                let forwarded = self.accumulator.apply(event);
                self.callbacks.message(forwarded);
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                self.callbacks.error(SessionError::MalformedFrame(e));
            }
        }
    }

    /// Unexpected close: notify, then retry or give up.
    fn on_close(&mut self, close: Option<CloseInfo>) {
        if let Some(socket) = self.socket.take() {
            socket.reader.cancel();
            socket.writer_abort.cancel();
        }

        match &close {
            Some(info) if !is_normal_close(info.code) => {
                warn!(code = info.code, reason = %info.reason, "socket closed abnormally");
            }
            Some(info) => debug!(code = info.code, "socket closed"),
            None => debug!("socket closed without a close frame"),
        }

        self.transition(ConnectionState::Closed);
        self.callbacks.disconnected();

        if self.intentional_close {
            return;
        }
        if self.policy.should_retry(self.reconnect_attempts) {
            self.reconnect_attempts += 1;
            let delay = self.policy.delay_for(self.reconnect_attempts);
            info!(
                attempt = self.reconnect_attempts,
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnect"
            );
            self.schedule_reconnect(delay);
        } else {
            warn!(
                attempts = self.reconnect_attempts,
                "reconnect attempts exhausted, staying disconnected"
            );
            self.callbacks.retry_exhausted(self.reconnect_attempts);
        }
    }

    fn finish_closing(&mut self) {
        self.closing = None;
        self.transition(ConnectionState::Closed);
        if let Some(trigger) = self.connect_after_close.take() {
            self.connect(trigger);
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Writes a frame to the open socket, re-queueing it if the writer is gone.
    async fn transmit(&mut self, frame: RequestFrame) {
        let text = match self.codec.encode(&frame) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to encode frame");
                self.callbacks.error(SessionError::Encode(e));
                return;
            }
        };

        let writer = self.socket.as_ref().and_then(|s| s.writer.clone());
        let Some(writer) = writer else {
            self.queue.enqueue(frame);
            return;
        };

        trace!(kind = ?frame.kind, "sending frame");
        if writer
            .send(tungstenite::Message::Text(text.into()))
            .await
            .is_err()
        {
            debug!("writer gone, re-queueing frame");
            self.queue.enqueue(frame);
        }
    }

    fn schedule_reconnect(&mut self, delay: std::time::Duration) {
        self.cancel_reconnect_timer();
        self.next_timer_id += 1;
        let id = self.next_timer_id;
        let cancel = CancellationToken::new();
        tokio::spawn(reconnect_timer(
            id,
            delay,
            self.events_tx.clone(),
            cancel.clone(),
        ));
        self.reconnect_timer = Some(PendingTimer { id, cancel });
    }

    fn cancel_reconnect_timer(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.cancel.cancel();
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.socket
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }

    fn is_closing(&self, generation: u64) -> bool {
        self.closing
            .as_ref()
            .is_some_and(|c| c.generation == generation)
    }

    /// Applies a state change, rejecting transitions the state machine forbids.
    fn transition(&mut self, next: ConnectionState) -> bool {
        match self.state.transition(next) {
            Ok(state) => {
                debug!(from = ?self.state, to = ?state, "state change");
                self.state = state;
                self.state_tx.send_replace(state);
                true
            }
            Err(e) => {
                warn!(error = %e, "rejected state change");
                false
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            reconnect_attempts: self.reconnect_attempts,
            pending_frames: self.queue.len(),
            accumulated_text: self.accumulator.text().to_string(),
            has_socket: self.socket.is_some(),
            intentional_close: self.intentional_close,
        }
    }
}
