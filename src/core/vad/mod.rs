//! Voice activity detection.
//!
//! A closed set of analyzers classifies fixed-duration audio frames as
//! speech or non-speech with a confidence score. The active analyzer is
//! selected at construction time through [`VadEngineKind`]; there is no
//! runtime plugin discovery.
//!
//! The neural (Silero ONNX) analyzer is feature-gated behind `neural-vad`.
//! When the feature is disabled a no-op stub is compiled in its place and
//! engine selection falls back to the energy analyzer.

pub mod energy;
#[cfg(feature = "neural-vad")]
pub mod silero;
#[cfg(not(feature = "neural-vad"))]
pub mod stub;
pub mod webrtc;

use std::str::FromStr;
use std::time::Instant;

use thiserror::Error;
#[cfg(not(feature = "neural-vad"))]
use tracing::warn;

use super::frames::{AudioFrame, FrameSource};

pub use energy::EnergyThresholdAnalyzer;
#[cfg(feature = "neural-vad")]
pub use silero::SileroVadAnalyzer;
#[cfg(not(feature = "neural-vad"))]
pub use stub::SileroVadAnalyzer;
pub use webrtc::WebRtcVadAnalyzer;

/// Errors raised at the analyzer boundary.
///
/// Contract violations reject the offending frame; the pipeline drops it
/// with a diagnostic and keeps running.
#[derive(Debug, Error)]
pub enum VadError {
    /// The frame does not hold the exact number of samples the analyzer
    /// requires. Never silently truncated.
    #[error("audio frame length mismatch: got {got} samples, expected {expected}")]
    LengthMismatch { got: usize, expected: usize },

    /// The buffer does not hold a whole number of 16-bit samples.
    #[error("audio buffer of {0} bytes is not 16-bit aligned")]
    UnalignedBuffer(usize),

    /// The analyzer does not support this sample rate.
    #[error("unsupported sample rate {0} Hz (supported: 8000, 16000)")]
    InvalidSampleRate(u32),

    /// Internal analyzer failure (model load, inference).
    #[error("analyzer error: {0}")]
    Analyzer(String),
}

/// Result of classifying one audio frame.
///
/// Produced and consumed synchronously per frame; never persisted.
#[derive(Debug, Clone, Copy)]
pub struct VadDecision {
    /// Speech confidence in `[0.0, 1.0]`.
    pub confidence: f32,
    /// Source of the classified frame.
    pub source: FrameSource,
    /// Capture timestamp of the classified frame.
    pub timestamp: Instant,
}

impl VadDecision {
    pub fn new(confidence: f32, frame: &AudioFrame) -> Self {
        Self {
            confidence,
            source: frame.source,
            timestamp: frame.timestamp,
        }
    }
}

/// Capability interface over the analyzer variants.
pub trait VoiceActivityAnalyzer: Send {
    /// Classify one frame, returning a speech confidence.
    ///
    /// Fails with [`VadError::LengthMismatch`] when the frame does not hold
    /// exactly [`VoiceActivityAnalyzer::required_frame_samples`] samples.
    fn classify(&mut self, frame: &AudioFrame) -> Result<VadDecision, VadError>;

    /// Exact number of samples per frame this analyzer expects.
    fn required_frame_samples(&self) -> usize;
}

impl std::fmt::Debug for dyn VoiceActivityAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceActivityAnalyzer")
            .field("required_frame_samples", &self.required_frame_samples())
            .finish_non_exhaustive()
    }
}

/// Validate the frame contract shared by every analyzer.
pub(crate) fn check_frame(frame: &AudioFrame, expected: usize) -> Result<(), VadError> {
    if !frame.is_aligned() {
        return Err(VadError::UnalignedBuffer(frame.pcm.len()));
    }
    let got = frame.num_samples();
    if got != expected {
        return Err(VadError::LengthMismatch { got, expected });
    }
    Ok(())
}

/// Which analyzer variant to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VadEngineKind {
    /// RMS energy threshold. The default.
    #[default]
    Energy,
    /// WebRTC codec-bitstream classifier.
    WebRtc,
    /// Silero neural detector (requires the `neural-vad` feature).
    Silero,
}

impl FromStr for VadEngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "energy" => Ok(Self::Energy),
            "webrtc" => Ok(Self::WebRtc),
            "silero" => Ok(Self::Silero),
            other => Err(format!(
                "unknown VAD engine '{other}' (expected energy, webrtc or silero)"
            )),
        }
    }
}

impl std::fmt::Display for VadEngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Energy => write!(f, "energy"),
            Self::WebRtc => write!(f, "webrtc"),
            Self::Silero => write!(f, "silero"),
        }
    }
}

/// Construct the configured analyzer.
///
/// The Silero variant requires the `neural-vad` feature; without it the
/// selection degrades to the energy analyzer with a warning so the pipeline
/// still runs.
pub fn build_analyzer(
    kind: VadEngineKind,
    sample_rate: u32,
) -> Result<Box<dyn VoiceActivityAnalyzer>, VadError> {
    match kind {
        VadEngineKind::Energy => Ok(Box::new(EnergyThresholdAnalyzer::new(sample_rate))),
        VadEngineKind::WebRtc => Ok(Box::new(WebRtcVadAnalyzer::new(sample_rate)?)),
        #[cfg(feature = "neural-vad")]
        VadEngineKind::Silero => Ok(Box::new(SileroVadAnalyzer::new(sample_rate)?)),
        #[cfg(not(feature = "neural-vad"))]
        VadEngineKind::Silero => {
            warn!(
                "silero VAD requested but this build has no neural-vad feature; \
                 falling back to the energy analyzer"
            );
            Ok(Box::new(EnergyThresholdAnalyzer::new(sample_rate)))
        }
    }
}
