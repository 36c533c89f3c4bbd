use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::{debug, info, warn};

use super::messages::{RealtimeInputMessage, ServerMessage, SetupMessage};

/// Connection settings for the realtime endpoint
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// WebSocket endpoint URL
    pub endpoint: String,
    /// API key appended as a query parameter
    pub api_key: String,
    pub model: String,
    pub voice: String,
    pub system_prompt: String,
}

/// Events surfaced from the socket to the session's event loop
#[derive(Debug)]
pub enum LiveEvent {
    /// Setup acknowledged; streaming may begin
    Open,
    /// A content-bearing server message
    Message(ServerMessage),
    /// The remote end closed the session
    Closed,
    /// Transport or protocol error
    Error(String),
}

enum Outbound {
    Frame(RealtimeInputMessage),
    Close,
}

/// Outbound frames waiting for the writer; frames beyond this are dropped
/// rather than queued (fire-and-forget, no backpressure onto capture)
const OUTBOUND_QUEUE: usize = 8;

/// Client half of one live session: a cloneable handle that feeds the writer
/// task. Inbound events arrive on the receiver returned by [`connect`].
///
/// [`connect`]: LiveClient::connect
#[derive(Clone)]
pub struct LiveClient {
    outbound_tx: mpsc::Sender<Outbound>,
}

impl LiveClient {
    /// Open the WebSocket, send the setup message, and spawn the reader and
    /// writer tasks. Returns the client handle and the inbound event channel.
    pub async fn connect(cfg: &LiveConfig) -> Result<(Self, mpsc::Receiver<LiveEvent>)> {
        info!("Connecting to realtime endpoint: {}", cfg.endpoint);

        let url = format!("{}?key={}", cfg.endpoint, cfg.api_key);
        let (ws, _) = connect_async(url)
            .await
            .context("Failed to connect to realtime endpoint")?;

        let (mut ws_tx, mut ws_rx) = ws.split();

        let setup = SetupMessage::new(&cfg.model, &cfg.voice, &cfg.system_prompt);
        let payload = serde_json::to_string(&setup).context("Failed to serialize setup")?;
        ws_tx
            .send(tungstenite::Message::Text(payload))
            .await
            .context("Failed to send setup message")?;

        info!("Setup sent for model {}", cfg.model);

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE);
        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                match msg {
                    Outbound::Frame(frame) => {
                        let payload = match serde_json::to_string(&frame) {
                            Ok(p) => p,
                            Err(e) => {
                                warn!("Failed to serialize outbound frame: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_tx.send(tungstenite::Message::Text(payload)).await {
                            // Frame is dropped; capture keeps running
                            debug!("Dropped outbound frame: {}", e);
                        }
                    }
                    Outbound::Close => {
                        let _ = ws_tx.send(tungstenite::Message::Close(None)).await;
                        break;
                    }
                }
            }
            debug!("Writer task stopped");
        });

        let (event_tx, event_rx) = mpsc::channel::<LiveEvent>(64);
        tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(tungstenite::Message::Text(text)) => {
                        Self::route_payload(text.as_bytes(), &event_tx).await;
                    }
                    Ok(tungstenite::Message::Binary(bytes)) => {
                        Self::route_payload(&bytes, &event_tx).await;
                    }
                    Ok(tungstenite::Message::Close(_)) => break,
                    Ok(_) => {} // ping/pong handled by tungstenite
                    Err(e) => {
                        let _ = event_tx.send(LiveEvent::Error(e.to_string())).await;
                        break;
                    }
                }
            }
            let _ = event_tx.send(LiveEvent::Closed).await;
            debug!("Reader task stopped");
        });

        Ok((Self { outbound_tx }, event_rx))
    }

    async fn route_payload(bytes: &[u8], event_tx: &mpsc::Sender<LiveEvent>) {
        match serde_json::from_slice::<ServerMessage>(bytes) {
            Ok(msg) => {
                if msg.setup_complete.is_some() {
                    let _ = event_tx.send(LiveEvent::Open).await;
                }
                if msg.server_content.is_some() {
                    let _ = event_tx.send(LiveEvent::Message(msg)).await;
                }
            }
            Err(e) => warn!("Failed to parse server message: {}", e),
        }
    }

    /// Queue one encoded audio frame, fire-and-forget. Returns false when the
    /// frame was dropped (queue full or connection gone).
    pub fn send_audio_frame(&self, data: String, mime_type: String) -> bool {
        let frame = RealtimeInputMessage::audio_frame(data, mime_type);
        self.outbound_tx.try_send(Outbound::Frame(frame)).is_ok()
    }

    /// Request an orderly close. Idempotent; safe to call more than once.
    pub async fn close(&self) {
        let _ = self.outbound_tx.send(Outbound::Close).await;
    }
}
