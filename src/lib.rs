pub mod audio;
pub mod chat;
pub mod config;
pub mod devices;
pub mod error;
pub mod http;
pub mod session;
pub mod transport;
pub mod video;

pub use audio::{
    AudioBackendConfig, AudioFile, CaptureBackend, FileCaptureBackend, PlaybackBuffer,
    PlaybackScheduler, PlaybackSink, SampleBlock, WavPlaybackSink,
};
pub use chat::{ChatMessage, GenAiClient, SuggestionService, TextChatService, Transcript};
pub use config::Config;
pub use devices::{LocalDevices, MediaDevices, MediaRequest, MediaStream};
pub use error::LiveError;
pub use http::{create_router, AppState};
pub use session::{
    spawn_event_loop, LiveControl, LiveSessionConfig, LiveSessionController, SessionEvent, SessionId,
    SessionState, SessionStats,
};
pub use transport::{GeminiLiveConnector, MediaChunk, TransportConnector, TransportEvent};
pub use video::{CameraBackend, StillImageCamera, VideoFrame};
