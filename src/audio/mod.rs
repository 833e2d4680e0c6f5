pub mod backend;
pub mod file;
pub mod pcm;
pub mod playback;
pub mod wav_sink;

pub use backend::{AudioBackendConfig, CaptureBackend, SampleBlock};
pub use file::{AudioFile, FileCaptureBackend};
pub use playback::{PlaybackBuffer, PlaybackScheduler, PlaybackSink, ScheduledSource, SourceId};
pub use wav_sink::WavPlaybackSink;
