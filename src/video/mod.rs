//! Camera frames for the vision half of a live session
//!
//! A camera is polled, not streamed: the session's frame timer asks for the
//! current frame once per interval and drops the tick if none is available.

use anyhow::Context;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use crate::error::{LiveError, Result};

/// One captured still (packed RGB8)
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl VideoFrame {
    pub fn has_pixels(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Camera device trait
pub trait CameraBackend: Send + Sync {
    /// Current frame, or `None` when capture is momentarily unavailable
    fn grab_frame(&self) -> Option<VideoFrame>;

    /// Release the device; later grabs return `None`
    fn release(&self) -> Result<()>;

    fn is_active(&self) -> bool;

    fn name(&self) -> &str;
}

/// Camera stand-in serving a fixed image
pub struct StillImageCamera {
    frame: VideoFrame,
    active: AtomicBool,
    label: String,
}

impl StillImageCamera {
    /// Load an image file (PNG or JPEG) as the camera picture.
    ///
    /// A missing or unreadable file is reported as a refused device.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .with_context(|| format!("Failed to open camera image {}", path.display()))
            .map_err(|e| LiveError::PermissionDenied(format!("camera unavailable: {:#}", e)))?
            .to_rgb8();

        let (width, height) = image.dimensions();
        info!("Camera image loaded: {} ({}x{})", path.display(), width, height);

        Ok(Self::from_frame(
            VideoFrame {
                width,
                height,
                rgb: image.into_raw(),
            },
            format!("still:{}", path.display()),
        ))
    }

    pub fn from_frame(frame: VideoFrame, label: String) -> Self {
        Self {
            frame,
            active: AtomicBool::new(true),
            label,
        }
    }
}

impl CameraBackend for StillImageCamera {
    fn grab_frame(&self) -> Option<VideoFrame> {
        if !self.active.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.frame.clone())
    }

    fn release(&self) -> Result<()> {
        if self.active.swap(false, Ordering::SeqCst) {
            info!("Camera released: {}", self.label);
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Encode a frame as JPEG at the given quality (1-100)
pub fn encode_jpeg(frame: &VideoFrame, quality: u8) -> Result<Vec<u8>> {
    if !frame.has_pixels() {
        return Err(LiveError::Decode("frame has zero dimensions".to_string()));
    }

    let expected = frame.width as usize * frame.height as usize * 3;
    if frame.rgb.len() != expected {
        return Err(LiveError::Decode(format!(
            "frame buffer is {} bytes, expected {} for {}x{} RGB",
            frame.rgb.len(),
            expected,
            frame.width,
            frame.height
        )));
    }

    let mut jpeg = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100));
        encoder
            .encode(&frame.rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
            .map_err(|e| LiveError::Decode(format!("JPEG encoding failed: {}", e)))?;
    }

    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> VideoFrame {
        let rgb = (0..width * height)
            .flat_map(|i| [(i % 256) as u8, 128, 64])
            .collect();
        VideoFrame { width, height, rgb }
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg_markers() {
        let jpeg = encode_jpeg(&gradient(16, 8), 50).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_rejects_empty_frame() {
        let empty = VideoFrame {
            width: 0,
            height: 0,
            rgb: Vec::new(),
        };
        assert!(encode_jpeg(&empty, 50).is_err());
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let mut frame = gradient(4, 4);
        frame.rgb.truncate(10);
        assert!(encode_jpeg(&frame, 50).is_err());
    }

    #[test]
    fn test_released_camera_yields_nothing() {
        let camera = StillImageCamera::from_frame(gradient(2, 2), "test".to_string());
        assert!(camera.grab_frame().is_some());

        camera.release().unwrap();
        assert!(!camera.is_active());
        assert!(camera.grab_frame().is_none());
    }
}
