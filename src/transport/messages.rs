use serde::{Deserialize, Serialize};

use crate::audio::pcm::encode_float_block;

/// MIME type of outbound JPEG frames
pub const JPEG_MIME: &str = "image/jpeg";

/// MIME type for 16-bit PCM at `rate`
pub fn pcm_mime(rate: u32) -> String {
    format!("audio/pcm;rate={}", rate)
}

// ============================================================================
// Client -> server
// ============================================================================

/// Messages sent to the live endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
}

/// First message on a connection: model, modality and persona
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Fully qualified model name (`models/<id>`)
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

/// One unit of outbound media: base64 payload tagged with its MIME type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

impl MediaChunk {
    /// Audio chunk from a captured float block (converted to 16-bit PCM)
    pub fn audio(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            mime_type: pcm_mime(sample_rate),
            data: encode_float_block(samples),
        }
    }

    /// Image chunk from JPEG bytes
    pub fn jpeg(bytes: &[u8]) -> Self {
        use base64::Engine;
        Self {
            mime_type: JPEG_MIME.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

// ============================================================================
// Server -> client
// ============================================================================

/// Messages received from the live endpoint (fields are mutually optional)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_content: Option<ServerContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_away: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<ServerPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

/// What the session controller sees from the transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    SetupComplete,
    /// Base64 16-bit PCM at the output sample rate
    Audio(String),
    /// Remote barge-in: cancel all playback
    Interrupted,
    TurnComplete,
    /// Graceful close (including server go-away)
    Closed,
    Error(String),
}

impl ServerMessage {
    /// Flatten one server message into events, audio before interruption
    pub fn into_events(self) -> Vec<TransportEvent> {
        let mut events = Vec::new();

        if self.setup_complete.is_some() {
            events.push(TransportEvent::SetupComplete);
        }

        if let Some(content) = self.server_content {
            if let Some(turn) = content.model_turn {
                events.extend(
                    turn.parts
                        .into_iter()
                        .filter_map(|part| part.inline_data)
                        .filter(|data| data.mime_type.is_empty() || data.mime_type.starts_with("audio/"))
                        .map(|data| TransportEvent::Audio(data.data)),
                );
            }
            if content.interrupted {
                events.push(TransportEvent::Interrupted);
            }
            if content.turn_complete {
                events.push(TransportEvent::TurnComplete);
            }
        }

        if self.go_away.is_some() {
            events.push(TransportEvent::Closed);
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_wire_shape() {
        let msg = ClientMessage::Setup(Setup {
            model: "models/test".to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
            },
            system_instruction: Content {
                parts: vec![TextPart {
                    text: "Be brief".to_string(),
                }],
            },
        });

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["setup"]["model"], "models/test");
        assert_eq!(json["setup"]["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(json["setup"]["systemInstruction"]["parts"][0]["text"], "Be brief");
    }

    #[test]
    fn test_audio_chunk_mime() {
        let chunk = MediaChunk::audio(&[0.0, 0.5], 16000);
        assert_eq!(chunk.mime_type, "audio/pcm;rate=16000");
        assert!(chunk.is_audio());
        assert!(!chunk.is_image());
    }

    #[test]
    fn test_go_away_closes() {
        let msg: ServerMessage = serde_json::from_str(r#"{"goAway": {"timeLeft": "5s"}}"#).unwrap();
        assert_eq!(msg.into_events(), vec![TransportEvent::Closed]);
    }
}
