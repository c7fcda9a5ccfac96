//! Frame types flowing through the media pipeline.
//!
//! Audio frames are fixed-duration chunks of 16-bit signed little-endian
//! mono PCM. Image and sprite frames are opaque payloads handed to the room
//! transport; the core never decodes them.

use std::time::Instant;

use bytes::Bytes;

/// Fixed frame duration for audio analysis.
pub const FRAME_DURATION_MS: u32 = 30;

/// Which participant an audio frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSource {
    /// The human participant's microphone.
    User,
    /// The model's generated speech.
    Bot,
}

impl std::fmt::Display for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameSource::User => write!(f, "user"),
            FrameSource::Bot => write!(f, "bot"),
        }
    }
}

/// A single fixed-duration chunk of mono PCM audio.
///
/// The buffer holds 16-bit signed little-endian samples. For a 30 ms frame
/// the expected sample count is `sample_rate * 30 / 1000` (480 at 16 kHz,
/// 240 at 8 kHz).
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw PCM bytes, two bytes per sample, little-endian.
    pub pcm: Bytes,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Which participant produced this frame.
    pub source: FrameSource,
    /// Capture timestamp.
    pub timestamp: Instant,
}

impl AudioFrame {
    /// Create a frame from raw PCM bytes.
    pub fn new(pcm: impl Into<Bytes>, sample_rate: u32, source: FrameSource) -> Self {
        Self {
            pcm: pcm.into(),
            sample_rate,
            source,
            timestamp: Instant::now(),
        }
    }

    /// Create a frame from i16 samples.
    pub fn from_samples(samples: &[i16], sample_rate: u32, source: FrameSource) -> Self {
        let mut pcm = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            pcm.extend_from_slice(&s.to_le_bytes());
        }
        Self::new(pcm, sample_rate, source)
    }

    /// Number of complete 16-bit samples in the buffer.
    pub fn num_samples(&self) -> usize {
        self.pcm.len() / 2
    }

    /// Whether the buffer holds a whole number of 16-bit samples.
    pub fn is_aligned(&self) -> bool {
        self.pcm.len() % 2 == 0
    }

    /// Decode the PCM buffer into i16 samples.
    ///
    /// Callers validate alignment through [`AudioFrame::is_aligned`] before
    /// decoding; a trailing odd byte is a contract violation, not something
    /// to truncate silently.
    pub fn samples(&self) -> Vec<i16> {
        self.pcm
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
            .collect()
    }

    /// Expected sample count for a fixed-duration frame at `sample_rate`.
    pub fn expected_samples(sample_rate: u32) -> usize {
        (sample_rate * FRAME_DURATION_MS / 1000) as usize
    }
}

/// A single image payload for the room transport.
///
/// The pixel data is opaque to the pipeline; the transport knows how to
/// publish it.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    /// Encoded image bytes (PNG as loaded from the asset set).
    pub data: Bytes,
    /// Asset name, for diagnostics.
    pub name: String,
}

/// An ordered image sequence the transport cycles continuously until it is
/// replaced by another frame.
#[derive(Debug, Clone)]
pub struct SpriteFrame {
    pub images: Vec<ImageFrame>,
}

impl SpriteFrame {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_samples_for_supported_rates() {
        assert_eq!(AudioFrame::expected_samples(16000), 480);
        assert_eq!(AudioFrame::expected_samples(8000), 240);
    }

    #[test]
    fn samples_round_trip_little_endian() {
        let samples = [0i16, -1, 32767, -32768, 20000];
        let frame = AudioFrame::from_samples(&samples, 16000, FrameSource::User);
        assert!(frame.is_aligned());
        assert_eq!(frame.num_samples(), 5);
        assert_eq!(frame.samples(), samples);
    }

    #[test]
    fn odd_length_buffer_is_not_aligned() {
        let frame = AudioFrame::new(vec![0u8, 1, 2], 16000, FrameSource::User);
        assert!(!frame.is_aligned());
    }
}
