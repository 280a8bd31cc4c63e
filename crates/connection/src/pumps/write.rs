//! WebSocket write pump: serialises outbound messages.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use chatlink_protocol::constants::WS_WRITE_WAIT;

use crate::transport::SocketEvent;

/// Writes queued messages to the socket in order.
///
/// Ends when every sender of `write_rx` is gone (graceful close: queued
/// frames are flushed first) or when `abort` fires. Either way a close frame
/// is sent and `Released` is posted. A failed or stalled write reports
/// `Error` + `Closed` and stops the reader through `reader`.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    generation: u64,
    events_tx: mpsc::Sender<SocketEvent>,
    abort: CancellationToken,
    reader: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = abort.cancelled() => break,
            msg = write_rx.recv() => {
                let Some(m) = msg else { break };
                let failure = match tokio::time::timeout(WS_WRITE_WAIT, write.send(m)).await {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e),
                    Err(_) => Some(tungstenite::Error::Io(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "write timed out",
                    ))),
                };
                if let Some(e) = failure {
                    error!(generation, "WebSocket write error: {e}");
                    reader.cancel();
                    let _ = events_tx.send(SocketEvent::Error { generation, error: e }).await;
                    let _ = events_tx.send(SocketEvent::Closed { generation, close: None }).await;
                    let _ = events_tx.send(SocketEvent::Released { generation }).await;
                    return;
                }
            }
        }
    }

    let close = tungstenite::Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "client closing".into(),
    }));
    let _ = tokio::time::timeout(WS_WRITE_WAIT, write.send(close)).await;
    debug!(generation, "write pump finished");
    let _ = events_tx.send(SocketEvent::Released { generation }).await;
}
