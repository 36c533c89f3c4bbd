use anyhow::{bail, Context, Result};
use base64::Engine;

/// Sample rate the remote endpoint expects for microphone audio
pub const INPUT_SAMPLE_RATE: u32 = 16000;

/// Sample rate of reply audio streamed back by the endpoint
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

/// All wire audio is mono
pub const CHANNELS: u16 = 1;

/// Samples per captured block (~256ms at 16kHz)
pub const CAPTURE_BLOCK_SAMPLES: usize = 4096;

/// MIME descriptor attached to every outbound audio frame
pub fn input_mime_type() -> String {
    format!("audio/pcm;rate={}", INPUT_SAMPLE_RATE)
}

/// Convert a float sample in [-1, 1] to signed 16-bit PCM.
///
/// `as` saturates, so 1.0 lands on 32767 instead of wrapping.
pub fn sample_to_i16(sample: f32) -> i16 {
    (sample * 32768.0) as i16
}

/// Convert a signed 16-bit PCM sample back to float
pub fn sample_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Encode one block of mono float samples as a base64 PCM16LE frame
pub fn encode_frame(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }
    base64::engine::general_purpose::STANDARD.encode(&bytes)
}

/// Decode a base64 PCM16LE payload into mono float samples
pub fn decode_chunk(data: &str) -> Result<Vec<f32>> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .context("Failed to decode base64 audio payload")?;

    if bytes.len() % 2 != 0 {
        bail!("PCM16 payload has odd byte count: {}", bytes.len());
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| sample_to_f32(i16::from_le_bytes([pair[0], pair[1]])))
        .collect())
}

/// Duration in seconds of a mono sample block at the given rate
pub fn duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    sample_count as f64 / sample_rate as f64
}
