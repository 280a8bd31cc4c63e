//! WebSocket read pump: forwards inbound frames to the driver.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::transport::{CloseInfo, SocketEvent};

/// Reads messages from the socket until it ends, errors, or is detached.
///
/// Text frames go to the driver undecoded. When the socket ends on its own
/// the pump reports `Closed`; when `detach` is cancelled it exits silently.
pub(crate) async fn read_pump<S>(
    mut read: S,
    generation: u64,
    write_tx: mpsc::Sender<tungstenite::Message>,
    events_tx: mpsc::Sender<SocketEvent>,
    detach: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let mut close: Option<CloseInfo> = None;

    loop {
        tokio::select! {
            _ = detach.cancelled() => return,

            msg = read.next() => {
                match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        trace!(generation, len = text.as_str().len(), "received text frame");
                        let event = SocketEvent::Frame {
                            generation,
                            text: text.as_str().to_owned(),
                        };
                        if events_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(data))) => {
                        trace!("received ping, sending pong");
                        let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                    }
                    Some(Ok(tungstenite::Message::Pong(_))) => {
                        trace!("received pong");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        close = frame.map(|f| CloseInfo {
                            code: u16::from(f.code),
                            reason: f.reason.as_str().to_owned(),
                        });
                        debug!(generation, ?close, "received close frame");
                        break;
                    }
                    Some(Ok(_)) => {
                        trace!("ignoring non-text frame");
                    }
                    Some(Err(e)) => {
                        warn!(generation, "WebSocket read error: {e}");
                        let _ = events_tx.send(SocketEvent::Error { generation, error: e }).await;
                        break;
                    }
                    None => {
                        debug!(generation, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    if !detach.is_cancelled() {
        let _ = events_tx.send(SocketEvent::Closed { generation, close }).await;
    }
}
