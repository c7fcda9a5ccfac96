//! Stub Silero analyzer compiled when `neural-vad` is disabled.
//!
//! Keeps the Silero API shape available so callers compile either way. The
//! stub always reports silence; engine selection never hands it out (it
//! falls back to the energy analyzer instead), but direct construction
//! remains possible for embedders that gate on the feature themselves.

use super::{check_frame, VadDecision, VadError, VoiceActivityAnalyzer};
use crate::core::frames::AudioFrame;

/// No-op stand-in for the neural analyzer.
pub struct SileroVadAnalyzer {
    sample_rate: u32,
}

impl SileroVadAnalyzer {
    pub fn new(sample_rate: u32) -> Result<Self, VadError> {
        if sample_rate != 8000 && sample_rate != 16000 {
            return Err(VadError::InvalidSampleRate(sample_rate));
        }
        Ok(Self { sample_rate })
    }
}

impl VoiceActivityAnalyzer for SileroVadAnalyzer {
    fn classify(&mut self, frame: &AudioFrame) -> Result<VadDecision, VadError> {
        check_frame(frame, self.required_frame_samples())?;
        Ok(VadDecision::new(0.0, frame))
    }

    /// Mirrors the real model's native frame size (512 @16 kHz, 256 @8 kHz).
    fn required_frame_samples(&self) -> usize {
        if self.sample_rate == 8000 { 256 } else { 512 }
    }
}
