use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{SessionId, SessionState};

/// Snapshot of the controller and its current session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub state: SessionState,

    /// Current (or most recent) session
    pub session_id: Option<SessionId>,

    pub camera_enabled: bool,

    /// When the current session started
    pub started_at: Option<DateTime<Utc>>,

    /// Device streams still held (microphone, camera, playback output)
    pub open_device_streams: usize,

    /// Recurring frame-capture timers
    pub active_timers: usize,

    /// Inbound playback sources not yet finished
    pub pending_audio_sources: usize,

    /// Output clock time the next inbound buffer is scheduled at (at the earliest)
    pub next_playback_time: f64,

    /// Outbound chunks produced in this session
    pub audio_chunks_sent: u64,
    pub video_frames_sent: u64,

    /// Inbound buffers scheduled / skipped as malformed
    pub buffers_scheduled: u64,
    pub buffers_skipped: u64,
}
