//! PCM sample conversions between the capture/playback pipelines and the wire
//!
//! Capture and playback work with normalized `f32` samples in `[-1.0, 1.0]`;
//! the remote assistant speaks 16-bit signed little-endian PCM, base64 encoded.

use base64::Engine;

use crate::error::{LiveError, Result};

/// Scale between normalized float samples and 16-bit PCM
pub const PCM16_SCALE: f32 = 32768.0;

/// Convert one normalized float sample to 16-bit PCM.
///
/// Computes `round(sample * 32768)` and saturates to the i16 range, so `+1.0`
/// maps to `32767` and `-1.0` to `-32768`. NaN maps to silence.
pub fn float_to_pcm16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample * PCM16_SCALE)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Convert a block of normalized float samples to 16-bit PCM
pub fn floats_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| float_to_pcm16(s)).collect()
}

/// Convert 16-bit PCM samples to normalized floats
pub fn pcm16_to_floats(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / PCM16_SCALE).collect()
}

/// Serialize PCM samples as little-endian bytes
pub fn pcm16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Parse little-endian bytes into PCM samples.
///
/// Fails on an odd byte count rather than silently dropping the tail.
pub fn le_bytes_to_pcm16(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(LiveError::Decode(format!(
            "PCM payload has odd length ({} bytes)",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect())
}

/// Encode a captured float block as base64 16-bit PCM, ready for the transport
pub fn encode_float_block(samples: &[f32]) -> String {
    let pcm = floats_to_pcm16(samples);
    base64::engine::general_purpose::STANDARD.encode(pcm16_to_le_bytes(&pcm))
}

/// Decode a base64 16-bit PCM payload into normalized floats
pub fn decode_base64_pcm(data: &str) -> Result<Vec<f32>> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| LiveError::Decode(format!("invalid base64 audio: {}", e)))?;

    let pcm = le_bytes_to_pcm16(&bytes)?;
    Ok(pcm16_to_floats(&pcm))
}
