//! WebSocket link from a native client to the relay.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::error::SignalError;
use crate::protocol::SignalEvent;
use crate::session::platform::Signaler;

/// Queues events for the writer task spawned by [`connect`].
#[derive(Debug, Clone)]
pub struct WsSignaler {
    tx: mpsc::UnboundedSender<String>,
}

impl Signaler for WsSignaler {
    fn emit(&self, event: SignalEvent) -> Result<(), SignalError> {
        let frame = event.to_frame()?;
        self.tx.send(frame).map_err(|_| SignalError::Closed)
    }
}

/// Connect to `url` (e.g. `ws://127.0.0.1:3000/ws`).
///
/// The inbound receiver closes when the relay connection does.
pub async fn connect(url: &str) -> Result<(WsSignaler, mpsc::UnboundedReceiver<SignalEvent>), SignalError> {
    let (socket, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(Box::new)?;
    let (mut sink, mut stream) = socket.split();
    tracing::info!(%url, "connected to relay");

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = sink.send(Message::text(frame)).await {
                tracing::warn!(error = %e, "relay write failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "relay read failed");
                    break;
                }
            };
            match serde_json::from_str::<SignalEvent>(text.as_str()) {
                Ok(event) => {
                    if in_tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "undecodable frame from relay"),
            }
        }
        tracing::info!("relay connection closed");
    });

    Ok((WsSignaler { tx: out_tx }, in_rx))
}
