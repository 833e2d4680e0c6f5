use tokio::sync::mpsc;

use crate::error::Result;

/// One block of captured microphone audio (mono, normalized f32)
#[derive(Debug, Clone)]
pub struct SampleBlock {
    /// Normalized samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Block index since capture started
    pub sequence: u64,
}

impl SampleBlock {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Configuration for the capture pipeline
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Capture sample rate
    pub sample_rate: u32,
    /// Samples per delivered block
    pub block_size: usize,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // Live endpoint expects 16kHz input
            block_size: 4096,
        }
    }
}

/// Microphone capture backend trait
///
/// Implementations:
/// - File: replay a WAV file at real-time pace (headless operation, tests)
#[async_trait::async_trait]
pub trait CaptureBackend: Send {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive sample blocks
    async fn start(&mut self) -> Result<mpsc::Receiver<SampleBlock>>;

    /// Stop capturing audio and release the device
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_duration() {
        let block = SampleBlock {
            samples: vec![0.0; 4096],
            sample_rate: 16000,
            sequence: 0,
        };
        assert!((block.duration_secs() - 0.256).abs() < 1e-9);
    }
}
