//! Inbound audio playback sequencing
//!
//! The remote assistant delivers audio in bursts. Each decoded buffer is
//! scheduled on the output pipeline's clock so that playback is gapless and
//! strictly sequential: a buffer never starts before the previous one ends,
//! and never starts in the past.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::Result;

/// Handle identifying one scheduled playback source
pub type SourceId = u64;

/// Decoded mono audio ready for playback
#[derive(Debug, Clone)]
pub struct PlaybackBuffer {
    /// Normalized samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Output sample rate in Hz
    pub sample_rate: u32,
}

impl PlaybackBuffer {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Output pipeline: owns a monotonic clock and plays buffers at given times
pub trait PlaybackSink: Send {
    /// Current output clock time in seconds
    fn current_time(&self) -> f64;

    /// Queue `buffer` to start at `start_at` (output clock seconds)
    fn play(&mut self, id: SourceId, buffer: PlaybackBuffer, start_at: f64) -> Result<()>;

    /// Stop a queued or playing source immediately
    fn stop_source(&mut self, id: SourceId) -> Result<()>;

    /// Release the output device
    fn close(&mut self) -> Result<()>;

    fn name(&self) -> &str;
}

/// A buffer that has been handed to the sink
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSource {
    pub id: SourceId,
    pub start_at: f64,
    pub end_at: f64,
}

/// Tracks the playback timeline and the set of in-flight sources
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    next_start_time: f64,
    pending: BTreeMap<SourceId, ScheduledSource>,
    next_id: SourceId,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `buffer` at `max(next_start_time, now)` and advance the timeline
    pub fn schedule(
        &mut self,
        sink: &mut dyn PlaybackSink,
        buffer: PlaybackBuffer,
    ) -> Result<ScheduledSource> {
        let now = sink.current_time();
        self.reap(now);

        let start_at = self.next_start_time.max(now);
        let end_at = start_at + buffer.duration_secs();
        let id = self.next_id;
        self.next_id += 1;

        sink.play(id, buffer, start_at)?;

        let source = ScheduledSource { id, start_at, end_at };
        self.next_start_time = end_at;
        self.pending.insert(id, source);

        debug!(
            "Scheduled source {} at {:.3}s..{:.3}s ({} pending)",
            id,
            start_at,
            end_at,
            self.pending.len()
        );

        Ok(source)
    }

    /// Drop sources that finished playing by `now`; returns how many were removed
    pub fn reap(&mut self, now: f64) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, source| source.end_at > now);
        before - self.pending.len()
    }

    /// Mark one source as ended (natural completion reported by the sink)
    pub fn complete(&mut self, id: SourceId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Stop and discard every pending source and restart the timeline at "now"
    pub fn interrupt(&mut self, sink: &mut dyn PlaybackSink) -> usize {
        let stopped = self.pending.len();

        for id in self.pending.keys() {
            if let Err(e) = sink.stop_source(*id) {
                warn!("Failed to stop playback source {}: {}", id, e);
            }
        }

        self.pending.clear();
        self.next_start_time = 0.0;
        stopped
    }

    /// Forget the timeline without touching a sink (sink already released)
    pub fn reset(&mut self) {
        self.pending.clear();
        self.next_start_time = 0.0;
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_sources(&self) -> impl Iterator<Item = &ScheduledSource> {
        self.pending.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClockSink {
        now: f64,
        played: Vec<(SourceId, f64)>,
        stopped: Vec<SourceId>,
    }

    impl PlaybackSink for FixedClockSink {
        fn current_time(&self) -> f64 {
            self.now
        }

        fn play(&mut self, id: SourceId, _buffer: PlaybackBuffer, start_at: f64) -> Result<()> {
            self.played.push((id, start_at));
            Ok(())
        }

        fn stop_source(&mut self, id: SourceId) -> Result<()> {
            self.stopped.push(id);
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn buffer(secs: f64) -> PlaybackBuffer {
        PlaybackBuffer {
            samples: vec![0.0; (secs * 24000.0).round() as usize],
            sample_rate: 24000,
        }
    }

    #[test]
    fn test_reap_removes_finished_sources() {
        let mut sink = FixedClockSink {
            now: 1.0,
            played: Vec::new(),
            stopped: Vec::new(),
        };
        let mut scheduler = PlaybackScheduler::new();

        scheduler.schedule(&mut sink, buffer(0.5)).unwrap();
        scheduler.schedule(&mut sink, buffer(0.5)).unwrap();
        assert_eq!(scheduler.pending_count(), 2);

        assert_eq!(scheduler.reap(1.6), 1);
        assert_eq!(scheduler.pending_count(), 1);
        assert_eq!(sink.played.len(), 2);
    }

    #[test]
    fn test_late_buffer_starts_now() {
        let mut sink = FixedClockSink {
            now: 0.0,
            played: Vec::new(),
            stopped: Vec::new(),
        };
        let mut scheduler = PlaybackScheduler::new();

        scheduler.schedule(&mut sink, buffer(0.2)).unwrap();
        sink.now = 5.0;
        let late = scheduler.schedule(&mut sink, buffer(0.2)).unwrap();

        assert_eq!(late.start_at, 5.0);
        // The first source finished long ago
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[test]
    fn test_interrupt_stops_everything() {
        let mut sink = FixedClockSink {
            now: 2.0,
            played: Vec::new(),
            stopped: Vec::new(),
        };
        let mut scheduler = PlaybackScheduler::new();

        scheduler.schedule(&mut sink, buffer(1.0)).unwrap();
        scheduler.schedule(&mut sink, buffer(1.0)).unwrap();

        assert_eq!(scheduler.interrupt(&mut sink), 2);
        assert_eq!(sink.stopped, vec![0, 1]);
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(scheduler.next_start_time(), 0.0);
    }

    #[test]
    fn test_empty_buffer_has_zero_duration() {
        let empty = PlaybackBuffer {
            samples: Vec::new(),
            sample_rate: 0,
        };
        assert_eq!(empty.duration_secs(), 0.0);
    }
}
