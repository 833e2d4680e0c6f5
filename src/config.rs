use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::session::{LiveSessionConfig, DEFAULT_SYSTEM_INSTRUCTION};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub genai: GenAiConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub devices: DevicesConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct GenAiConfig {
    /// Falls back to GEMINI_API_KEY / VITE_GEMINI_API_KEY when empty
    #[serde(default)]
    pub api_key: String,
    pub live_model: String,
    pub text_model: String,
    pub suggestion_model: String,
    pub rest_endpoint: String,
    pub live_endpoint: String,
    /// Bound on the live websocket handshake
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub capture_block_size: usize,
    pub frame_interval_ms: u64,
    pub jpeg_quality: u8,
    pub system_instruction: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            capture_block_size: 4096,
            frame_interval_ms: 1000,
            jpeg_quality: 50,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DevicesConfig {
    /// 16-bit WAV replayed as the microphone
    pub microphone_wav: Option<PathBuf>,
    /// Image served as the camera picture
    pub camera_image: Option<PathBuf>,
    /// Where the assistant's speech is written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("recordings")
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            microphone_wav: None,
            camera_image: None,
            output_dir: default_output_dir(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("AGRIFLOW").separator("__"))
            .build()?;

        let mut cfg: Config = settings.try_deserialize()?;

        if cfg.genai.api_key.trim().is_empty() {
            cfg.genai.api_key = std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("VITE_GEMINI_API_KEY"))
                .unwrap_or_default();
        }

        cfg.live_session()
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid [live] settings in {}: {}", path, e))?;

        Ok(cfg)
    }

    pub fn live_session(&self) -> LiveSessionConfig {
        LiveSessionConfig {
            model: self.genai.live_model.clone(),
            api_key: self.genai.api_key.clone(),
            system_instruction: self.live.system_instruction.clone(),
            input_sample_rate: self.live.input_sample_rate,
            output_sample_rate: self.live.output_sample_rate,
            capture_block_size: self.live.capture_block_size,
            frame_interval: Duration::from_millis(self.live.frame_interval_ms),
            jpeg_quality: self.live.jpeg_quality,
        }
    }
}
