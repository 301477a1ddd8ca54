//! Raw PCM helpers for synthesized speech.
//!
//! Synthesizers hand back 16-bit little-endian mono PCM (16 kHz by default).
//! Playback works on `f32` samples in `[-1.0, 1.0)`.

use std::time::Duration;

/// Default synthesizer output rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Convert 16-bit little-endian PCM bytes to `f32` samples.
///
/// A trailing odd byte is ignored.
pub fn pcm16le_to_f32(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Convert `f32` samples to 16-bit little-endian PCM bytes, clamping to range.
pub fn f32_to_pcm16le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Playback length of `sample_count` mono samples at `sample_rate`.
pub fn clip_duration(sample_count: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(sample_count as f64 / sample_rate as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        let bytes = [0x00, 0x00, 0x00, 0x80, 0xff, 0x7f, 0x00, 0x40];
        let samples = pcm16le_to_f32(&bytes);
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[1], -1.0);
        assert!((samples[2] - 32767.0 / 32768.0).abs() < f32::EPSILON);
        assert_eq!(samples[3], 0.5);
    }

    #[test]
    fn test_odd_trailing_byte_ignored() {
        let samples = pcm16le_to_f32(&[0x00, 0x40, 0x12]);
        assert_eq!(samples, vec![0.5]);
    }

    #[test]
    fn test_empty_input() {
        assert!(pcm16le_to_f32(&[]).is_empty());
        assert!(f32_to_pcm16le(&[]).is_empty());
    }

    #[test]
    fn test_encode_clamps() {
        let bytes = f32_to_pcm16le(&[2.0, -2.0]);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), 32767);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), -32767);
    }

    #[test]
    fn test_clip_duration() {
        assert_eq!(clip_duration(16_000, 16_000), Duration::from_secs(1));
        assert_eq!(clip_duration(8_000, 16_000), Duration::from_millis(500));
        assert_eq!(clip_duration(0, 16_000), Duration::ZERO);
        assert_eq!(clip_duration(100, 0), Duration::ZERO);
    }
}
