//! In-memory sockets for session tests.

use futures_util::{sink, stream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

use chatlink_protocol::ResponseEvent;

use crate::callbacks::SessionCallbacks;
use crate::error::SessionError;
use crate::transport::{ConnectFuture, Connector, WsSink, WsStream};

type Decision = Result<(WsSink, WsStream), tungstenite::Error>;

/// Hands every connect attempt to the test, which accepts or rejects it.
pub(crate) struct MockConnector {
    pending_tx: mpsc::UnboundedSender<PendingSocket>,
}

impl MockConnector {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<PendingSocket>) {
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        (Self { pending_tx }, pending_rx)
    }
}

impl Connector for MockConnector {
    fn connect(&self, url: &str) -> ConnectFuture {
        let (decision, rx) = oneshot::channel::<Decision>();
        let _ = self.pending_tx.send(PendingSocket {
            url: url.to_string(),
            decision,
        });
        Box::pin(async move {
            rx.await
                .unwrap_or(Err(tungstenite::Error::ConnectionClosed))
        })
    }
}

/// A connect attempt waiting on the test.
pub(crate) struct PendingSocket {
    pub url: String,
    decision: oneshot::Sender<Decision>,
}

impl PendingSocket {
    /// Completes the handshake and returns the server side of the socket.
    pub(crate) fn accept(self) -> ServerEnd {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Result<Message, tungstenite::Error>>();

        let sink = sink::unfold(out_tx, |tx, msg: Message| async move {
            tx.send(msg)
                .map_err(|_| tungstenite::Error::ConnectionClosed)?;
            Ok::<_, tungstenite::Error>(tx)
        });
        let stream = stream::unfold(in_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        let _ = self
            .decision
            .send(Ok((Box::pin(sink) as WsSink, Box::pin(stream) as WsStream)));
        ServerEnd {
            url: self.url,
            outbound: out_rx,
            inbound: Some(in_tx),
        }
    }

    /// Resolves once the session has abandoned this attempt.
    pub(crate) async fn decision_dropped(mut self) -> bool {
        self.decision.closed().await;
        true
    }

    /// Fails the handshake as a refused connection would.
    pub(crate) fn reject(self) {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let _ = self.decision.send(Err(tungstenite::Error::Io(refused)));
    }
}

/// The server's view of an accepted socket.
pub(crate) struct ServerEnd {
    pub url: String,
    outbound: mpsc::UnboundedReceiver<Message>,
    inbound: Option<mpsc::UnboundedSender<Result<Message, tungstenite::Error>>>,
}

impl ServerEnd {
    pub(crate) fn push(&self, event: serde_json::Value) {
        self.push_text(&event.to_string());
    }

    pub(crate) fn push_text(&self, text: &str) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Ok(Message::Text(text.to_string().into())));
        }
    }

    /// Ends the stream without a close frame.
    pub(crate) fn drop_connection(&mut self) {
        self.inbound = None;
    }

    /// Sends a close frame with `code`, then ends the stream.
    pub(crate) fn close_with(&mut self, code: u16) {
        if let Some(tx) = self.inbound.take() {
            let _ = tx.send(Ok(Message::Close(Some(CloseFrame {
                code: code.into(),
                reason: "server closing".to_string().into(),
            }))));
        }
    }

    /// Next text frame the client wrote, skipping control frames. `None` once
    /// the client sends a close frame or drops the socket.
    pub(crate) async fn next_text(&mut self) -> Option<String> {
        loop {
            match self.outbound.recv().await? {
                Message::Text(text) => return Some(text.as_str().to_owned()),
                Message::Close(_) => return None,
                _ => continue,
            }
        }
    }

    /// Next text frame, parsed as JSON.
    pub(crate) async fn next_json(&mut self) -> Option<serde_json::Value> {
        let text = self.next_text().await?;
        serde_json::from_str(&text).ok()
    }

    /// Waits for the client's close frame, skipping anything else.
    pub(crate) async fn closed_by_client(&mut self) -> bool {
        while let Some(msg) = self.outbound.recv().await {
            if matches!(msg, Message::Close(_)) {
                return true;
            }
        }
        false
    }
}

/// What a session reported through its callbacks.
#[derive(Debug)]
pub(crate) enum Recorded {
    Message(ResponseEvent),
    Error(SessionError),
    Connect,
    Disconnect,
    Exhausted(u32),
}

/// Callbacks that forward everything to a channel.
pub(crate) fn recorder() -> (SessionCallbacks, mpsc::UnboundedReceiver<Recorded>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let on_message = tx.clone();
    let on_error = tx.clone();
    let on_connect = tx.clone();
    let on_disconnect = tx.clone();
    let callbacks = SessionCallbacks::new()
        .on_message(move |e| {
            let _ = on_message.send(Recorded::Message(e));
        })
        .on_error(move |e| {
            let _ = on_error.send(Recorded::Error(e));
        })
        .on_connect(move || {
            let _ = on_connect.send(Recorded::Connect);
        })
        .on_disconnect(move || {
            let _ = on_disconnect.send(Recorded::Disconnect);
        })
        .on_retry_exhausted(move |n| {
            let _ = tx.send(Recorded::Exhausted(n));
        });
    (callbacks, rx)
}
