use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{AudioBackendConfig, CaptureBackend, SampleBlock};
use super::pcm::PCM16_SCALE;
use crate::error::LiveError;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Unsupported WAV format: {:?} {}-bit (expected 16-bit PCM)",
                spec.sample_format,
                spec.bits_per_sample
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Average interleaved channels down to mono and normalize to `[-1.0, 1.0]`
    pub fn to_mono_floats(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;

        self.samples
            .chunks(channels)
            .map(|frame| {
                let sum: f32 = frame.iter().map(|&s| s as f32 / PCM16_SCALE).sum();
                sum / frame.len() as f32
            })
            .collect()
    }
}

/// Microphone stand-in that replays a WAV file as capture blocks
pub struct FileCaptureBackend {
    config: AudioBackendConfig,
    samples: Vec<f32>,
    /// Emit blocks at real-time pace (false: as fast as the consumer reads)
    paced: bool,
    task: Option<JoinHandle<()>>,
    label: String,
}

impl FileCaptureBackend {
    /// Open a WAV file as a microphone.
    ///
    /// A missing or unreadable file is reported as a refused device.
    pub fn open(
        path: impl AsRef<Path>,
        config: AudioBackendConfig,
    ) -> std::result::Result<Self, LiveError> {
        let path = path.as_ref();
        let audio = AudioFile::open(path)
            .map_err(|e| LiveError::PermissionDenied(format!("microphone unavailable: {:#}", e)))?;

        if audio.sample_rate != config.sample_rate {
            return Err(LiveError::Device(format!(
                "microphone file is {}Hz, capture pipeline expects {}Hz",
                audio.sample_rate, config.sample_rate
            )));
        }

        Ok(Self::from_samples(
            audio.to_mono_floats(),
            config,
            format!("file:{}", path.display()),
        ))
    }

    pub fn from_samples(samples: Vec<f32>, config: AudioBackendConfig, label: String) -> Self {
        Self {
            config,
            samples,
            paced: true,
            task: None,
            label,
        }
    }

    pub fn with_pacing(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FileCaptureBackend {
    async fn start(&mut self) -> crate::error::Result<mpsc::Receiver<SampleBlock>> {
        if self.task.is_some() {
            return Err(LiveError::Device("Already capturing".to_string()));
        }
        if self.config.sample_rate == 0 {
            return Err(LiveError::Device("capture sample rate is zero".to_string()));
        }

        let (tx, rx) = mpsc::channel(16);
        let block_size = self.config.block_size.max(1);
        let sample_rate = self.config.sample_rate;
        let samples = self.samples.clone();
        let paced = self.paced;
        let block_period =
            Duration::from_secs_f64(block_size as f64 / sample_rate as f64);

        info!(
            "Starting file capture {} ({}Hz, {} samples/block)",
            self.label, sample_rate, block_size
        );

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(block_period);

            for (sequence, chunk) in samples.chunks(block_size).enumerate() {
                if paced {
                    ticker.tick().await;
                }

                // Blocks are fixed-size; pad the tail with silence
                let mut block = chunk.to_vec();
                block.resize(block_size, 0.0);

                let frame = SampleBlock {
                    samples: block,
                    sample_rate,
                    sequence: sequence as u64,
                };

                if tx.send(frame).await.is_err() {
                    break;
                }
            }

            debug!("File capture reached end of input");
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> crate::error::Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("File capture stopped: {}", self.label);
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.is_some()
    }

    fn name(&self) -> &str {
        &self.label
    }
}
