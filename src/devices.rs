//! Media device acquisition
//!
//! `MediaDevices` is the seam between the live session and the platform:
//! it hands out a microphone, an optional camera and a playback output, each
//! exclusively owned by the session that requested them.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::audio::{AudioBackendConfig, CaptureBackend, FileCaptureBackend, PlaybackSink, WavPlaybackSink};
use crate::error::{LiveError, Result};
use crate::video::{CameraBackend, StillImageCamera};

/// What a session asks for when it starts
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub audio: AudioBackendConfig,
    pub video: bool,
}

/// Devices granted to a session
pub struct MediaStream {
    pub microphone: Box<dyn CaptureBackend>,
    pub camera: Option<Arc<dyn CameraBackend>>,
}

/// Platform device provider
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire the microphone, plus the camera when `request.video` is set.
    ///
    /// Fails with `PermissionDenied` when access is refused; nothing stays
    /// acquired on failure.
    async fn request(&self, request: &MediaRequest) -> Result<MediaStream>;

    /// Open an output pipeline at `sample_rate`
    fn open_output(&self, sample_rate: u32) -> Result<Box<dyn PlaybackSink>>;
}

/// File-backed devices for headless operation
///
/// Microphone audio is replayed from a WAV file, the camera serves a still
/// image, and the assistant's speech is written to a WAV file per session.
pub struct LocalDevices {
    microphone: Option<PathBuf>,
    camera: Option<PathBuf>,
    output_dir: PathBuf,
}

impl LocalDevices {
    pub fn new(microphone: Option<PathBuf>, camera: Option<PathBuf>, output_dir: PathBuf) -> Self {
        Self {
            microphone,
            camera,
            output_dir,
        }
    }
}

#[async_trait::async_trait]
impl MediaDevices for LocalDevices {
    async fn request(&self, request: &MediaRequest) -> Result<MediaStream> {
        let mic_path = self
            .microphone
            .as_ref()
            .ok_or_else(|| LiveError::PermissionDenied("no microphone configured".to_string()))?;

        let microphone = FileCaptureBackend::open(mic_path, request.audio.clone())?;

        let camera: Option<Arc<dyn CameraBackend>> = if request.video {
            let cam_path = self
                .camera
                .as_ref()
                .ok_or_else(|| LiveError::PermissionDenied("no camera configured".to_string()))?;
            // Microphone is dropped on this error path; nothing was started yet
            Some(Arc::new(StillImageCamera::open(cam_path)?))
        } else {
            None
        };

        info!(
            "Media devices granted (microphone: {}, camera: {})",
            microphone.name(),
            camera.as_ref().map(|c| c.name()).unwrap_or("none")
        );

        Ok(MediaStream {
            microphone: Box::new(microphone),
            camera,
        })
    }

    fn open_output(&self, sample_rate: u32) -> Result<Box<dyn PlaybackSink>> {
        let file = format!(
            "assistant-{}.wav",
            chrono::Utc::now().format("%Y%m%d-%H%M%S%.3f")
        );
        Ok(Box::new(WavPlaybackSink::new(
            self.output_dir.join(file),
            sample_rate,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_microphone_is_permission_denied() {
        let devices = LocalDevices::new(None, None, PathBuf::from("/tmp"));
        let request = MediaRequest {
            audio: AudioBackendConfig::default(),
            video: false,
        };

        let err = devices.request(&request).await.err().unwrap();
        assert!(matches!(err, LiveError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_unreadable_microphone_is_permission_denied() {
        let devices = LocalDevices::new(
            Some(PathBuf::from("/nonexistent/mic.wav")),
            None,
            PathBuf::from("/tmp"),
        );
        let request = MediaRequest {
            audio: AudioBackendConfig::default(),
            video: false,
        };

        let err = devices.request(&request).await.err().unwrap();
        assert!(matches!(err, LiveError::PermissionDenied(_)));
    }
}
