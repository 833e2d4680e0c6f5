use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{LiveError, Result};

/// Default persona for the live assistant
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an agricultural assistant. You can see through the camera and hear the user. Help with farming tasks, soil health, and techniques. Be brief and practical.";

/// Configuration for a live session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSessionConfig {
    /// Live model identifier
    pub model: String,

    /// Credential for the remote endpoint; empty means not configured
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Persona and capability scope sent at connection setup
    pub system_instruction: String,

    /// Microphone capture rate (the endpoint expects 16kHz)
    pub input_sample_rate: u32,

    /// Playback rate of the assistant's audio (24kHz)
    pub output_sample_rate: u32,

    /// Samples per captured block
    pub capture_block_size: usize,

    /// Interval between camera frames
    pub frame_interval: Duration,

    /// JPEG quality for camera frames (1-100)
    pub jpeg_quality: u8,
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-native-audio-latest".to_string(),
            api_key: String::new(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            capture_block_size: 4096,
            frame_interval: Duration::from_secs(1),
            jpeg_quality: 50,
        }
    }
}

impl LiveSessionConfig {
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Reject settings the capture, playback or frame pipelines cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.input_sample_rate == 0 || self.output_sample_rate == 0 {
            return Err(LiveError::ConfigurationError(format!(
                "sample rates must be non-zero (input {}, output {})",
                self.input_sample_rate, self.output_sample_rate
            )));
        }
        if self.capture_block_size == 0 {
            return Err(LiveError::ConfigurationError(
                "capture block size must be non-zero".to_string(),
            ));
        }
        if self.frame_interval.is_zero() {
            return Err(LiveError::ConfigurationError(
                "frame interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
