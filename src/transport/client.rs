use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::messages::{
    ClientMessage, Content, GenerationConfig, MediaChunk, RealtimeInput, ServerMessage, Setup,
    TextPart, TransportEvent,
};
use crate::error::{LiveError, Result};

/// Parameters for opening a live connection
#[derive(Debug, Clone)]
pub struct LiveSetup {
    /// Model identifier, with or without the `models/` prefix
    pub model: String,
    /// Response modality declaration (`AUDIO`)
    pub response_modality: String,
    pub system_instruction: String,
}

impl LiveSetup {
    pub fn to_message(&self) -> ClientMessage {
        let model = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };

        ClientMessage::Setup(Setup {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec![self.response_modality.clone()],
            },
            system_instruction: Content {
                parts: vec![TextPart {
                    text: self.system_instruction.clone(),
                }],
            },
        })
    }
}

/// Frames queued for the connection writer
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Media(MediaChunk),
    Close,
}

/// An open transport: fire-and-forget outbound queue plus inbound events
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    inbound: Option<mpsc::Receiver<TransportEvent>>,
    tasks: Vec<JoinHandle<()>>,
}

impl TransportHandle {
    pub fn new(
        outbound: mpsc::UnboundedSender<OutboundFrame>,
        inbound: mpsc::Receiver<TransportEvent>,
    ) -> Self {
        Self {
            outbound,
            inbound: Some(inbound),
            tasks: Vec::new(),
        }
    }

    fn with_tasks(mut self, tasks: Vec<JoinHandle<()>>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Sender for outbound media; sends never wait for acknowledgment
    pub fn sender(&self) -> mpsc::UnboundedSender<OutboundFrame> {
        self.outbound.clone()
    }

    /// Take the inbound event stream (once)
    pub fn take_inbound(&mut self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.inbound.take()
    }

    /// Ask for a graceful close and stop listening. Never fails.
    pub fn close(mut self) {
        if self.outbound.send(OutboundFrame::Close).is_err() {
            debug!("Transport writer already gone at close");
        }
        self.inbound = None;

        // The writer drains the close frame and exits on its own; the reader
        // must not deliver anything further.
        if let Some(reader) = self.tasks.pop() {
            reader.abort();
        }
    }
}

/// Opens live connections to the remote assistant
#[async_trait::async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, setup: &LiveSetup) -> Result<TransportHandle>;
}

/// Default bound on the websocket handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Websocket connector for the Gemini Live `BidiGenerateContent` endpoint
pub struct GeminiLiveConnector {
    endpoint: String,
    api_key: String,
    connect_timeout: Duration,
}

impl GeminiLiveConnector {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn url(&self) -> String {
        format!("{}?key={}", self.endpoint, self.api_key)
    }
}

#[async_trait::async_trait]
impl TransportConnector for GeminiLiveConnector {
    async fn connect(&self, setup: &LiveSetup) -> Result<TransportHandle> {
        if self.api_key.is_empty() {
            return Err(LiveError::ConfigurationError(
                "API key is missing for live mode".to_string(),
            ));
        }

        info!("Connecting to live endpoint {} (model {})", self.endpoint, setup.model);

        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(self.url()))
            .await
            .map_err(|_| {
                LiveError::TransportError(format!(
                    "Connection timed out after {:?}",
                    self.connect_timeout
                ))
            })?
            .map_err(|e| LiveError::TransportError(format!("Connection failed: {}", e)))?;

        let (mut write, mut read) = ws_stream.split();

        let setup_json = serde_json::to_string(&setup.to_message())
            .map_err(|e| LiveError::TransportError(format!("Failed to encode setup: {}", e)))?;
        write
            .send(Message::Text(setup_json.into()))
            .await
            .map_err(|e| LiveError::TransportError(format!("Failed to send setup: {}", e)))?;

        info!("Live connection open, setup sent");

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let (inbound_tx, inbound_rx) = mpsc::channel::<TransportEvent>(64);

        // Writer: outbound frames in production order
        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                match frame {
                    OutboundFrame::Media(chunk) => {
                        let json = match serde_json::to_string(&ClientMessage::RealtimeInput(
                            RealtimeInput {
                                media_chunks: vec![chunk],
                            },
                        )) {
                            Ok(j) => j,
                            Err(e) => {
                                error!("Failed to serialize media chunk: {}", e);
                                continue;
                            }
                        };

                        if let Err(e) = write.send(Message::Text(json.into())).await {
                            debug!("Live send failed, writer stopping: {}", e);
                            break;
                        }
                    }
                    OutboundFrame::Close => break,
                }
            }

            if let Err(e) = write.close().await {
                debug!("Live close failed (ignored): {}", e);
            }
            debug!("Live writer stopped");
        });

        // Reader: server messages to transport events
        let reader = tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                let parsed = match msg_result {
                    Ok(Message::Text(text)) => serde_json::from_str::<ServerMessage>(&text),
                    Ok(Message::Binary(bytes)) => serde_json::from_slice::<ServerMessage>(&bytes),
                    Ok(Message::Close(frame)) => {
                        info!("Live connection closed by server: {:?}", frame);
                        let _ = inbound_tx.send(TransportEvent::Closed).await;
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        error!("Live connection error: {}", e);
                        let _ = inbound_tx.send(TransportEvent::Error(e.to_string())).await;
                        return;
                    }
                };

                match parsed {
                    Ok(message) => {
                        for event in message.into_events() {
                            if inbound_tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => warn!("Failed to parse live message: {}", e),
                }
            }

            let _ = inbound_tx.send(TransportEvent::Closed).await;
        });

        // Reader last: `close` aborts it
        Ok(TransportHandle::new(outbound_tx, inbound_rx).with_tasks(vec![writer, reader]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_model_prefix() {
        let setup = LiveSetup {
            model: "gemini-2.5-flash-native-audio-latest".to_string(),
            response_modality: "AUDIO".to_string(),
            system_instruction: "x".to_string(),
        };

        match setup.to_message() {
            ClientMessage::Setup(s) => {
                assert_eq!(s.model, "models/gemini-2.5-flash-native-audio-latest")
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let connector = GeminiLiveConnector::new("wss://example.invalid/ws", "");
        let setup = LiveSetup {
            model: "m".to_string(),
            response_modality: "AUDIO".to_string(),
            system_instruction: "x".to_string(),
        };

        let err = connector.connect(&setup).await.err().unwrap();
        assert!(matches!(err, LiveError::ConfigurationError(_)));
    }

    #[tokio::test]
    async fn test_unanswered_handshake_times_out() {
        // Accepted by the kernel backlog, but nobody answers the upgrade
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let connector = GeminiLiveConnector::new(format!("ws://{}/ws", addr), "key")
            .with_connect_timeout(Duration::from_millis(100));
        let setup = LiveSetup {
            model: "m".to_string(),
            response_modality: "AUDIO".to_string(),
            system_instruction: "x".to_string(),
        };

        let err = connector.connect(&setup).await.err().unwrap();
        match err {
            LiveError::TransportError(msg) => assert!(msg.contains("timed out")),
            other => panic!("expected a transport error, got {:?}", other),
        }
        drop(listener);
    }

    #[tokio::test]
    async fn test_close_sends_close_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_in_tx, in_rx) = mpsc::channel(1);
        let handle = TransportHandle::new(tx, in_rx);

        handle.close();
        assert_eq!(rx.recv().await, Some(OutboundFrame::Close));
    }
}
