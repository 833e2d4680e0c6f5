use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::{info, warn};

use super::pcm::float_to_pcm16;
use super::playback::{PlaybackBuffer, PlaybackSink, SourceId};
use crate::error::{LiveError, Result};

/// A buffer placed on the output timeline
#[derive(Debug)]
struct PlacedBuffer {
    start_at: f64,
    samples: Vec<f32>,
    /// Output clock time at which the source was stopped early
    stopped_at: Option<f64>,
}

/// Playback output that renders the assistant's audio to a WAV file
///
/// The clock runs from the moment the sink is opened. Buffers are kept in
/// memory until `close`, which lays them out on the timeline (silence in gaps,
/// stopped sources cut at their stop time) and writes a 16-bit mono WAV.
pub struct WavPlaybackSink {
    path: PathBuf,
    sample_rate: u32,
    opened_at: Instant,
    buffers: BTreeMap<SourceId, PlacedBuffer>,
    closed: bool,
}

impl WavPlaybackSink {
    pub fn new(path: PathBuf, sample_rate: u32) -> Self {
        info!(
            "Playback output opened: {} ({}Hz)",
            path.display(),
            sample_rate
        );

        Self {
            path,
            sample_rate,
            opened_at: Instant::now(),
            buffers: BTreeMap::new(),
            closed: false,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Mix every placed buffer into one timeline of samples
    fn render(&self) -> Vec<f32> {
        let rate = self.sample_rate as f64;
        let mut timeline: Vec<f32> = Vec::new();

        for placed in self.buffers.values() {
            let offset = (placed.start_at * rate).round().max(0.0) as usize;
            let audible = match placed.stopped_at {
                Some(stop) => (((stop - placed.start_at) * rate).round().max(0.0) as usize)
                    .min(placed.samples.len()),
                None => placed.samples.len(),
            };

            let end = offset + audible;
            if timeline.len() < end {
                timeline.resize(end, 0.0);
            }

            for (slot, sample) in timeline[offset..end]
                .iter_mut()
                .zip(&placed.samples[..audible])
            {
                *slot = (*slot + sample).clamp(-1.0, 1.0);
            }
        }

        timeline
    }

    fn write(&self, timeline: &[f32]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(&self.path, spec)?;
        for &sample in timeline {
            writer.write_sample(float_to_pcm16(sample))?;
        }
        writer.finalize()?;

        Ok(())
    }
}

impl PlaybackSink for WavPlaybackSink {
    fn current_time(&self) -> f64 {
        self.opened_at.elapsed().as_secs_f64()
    }

    fn play(&mut self, id: SourceId, buffer: PlaybackBuffer, start_at: f64) -> Result<()> {
        if self.closed {
            return Err(LiveError::Device("playback output is closed".to_string()));
        }
        if buffer.sample_rate != self.sample_rate {
            return Err(LiveError::Device(format!(
                "buffer is {}Hz, output runs at {}Hz",
                buffer.sample_rate, self.sample_rate
            )));
        }

        self.buffers.insert(
            id,
            PlacedBuffer {
                start_at,
                samples: buffer.samples,
                stopped_at: None,
            },
        );
        Ok(())
    }

    fn stop_source(&mut self, id: SourceId) -> Result<()> {
        let now = self.current_time();
        match self.buffers.get_mut(&id) {
            Some(placed) if placed.stopped_at.is_none() => {
                placed.stopped_at = Some(now);
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(LiveError::Device(format!("unknown playback source {}", id))),
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let timeline = self.render();
        if timeline.is_empty() {
            info!("Playback output closed (nothing played)");
            return Ok(());
        }

        self.write(&timeline)
            .map_err(|e| LiveError::Device(format!("failed to write {}: {:#}", self.path.display(), e)))?;

        info!(
            "Playback output written: {} ({:.1}s)",
            self.path.display(),
            timeline.len() as f64 / self.sample_rate as f64
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "wav"
    }
}

impl Drop for WavPlaybackSink {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!("Failed to finalize playback output on drop: {}", e);
            }
        }
    }
}
