//! WebRTC voice activity analyzer.
//!
//! Wraps the fixed-aggressiveness speech/non-speech classifier from the
//! `webrtc-vad` crate. Restricted to 8 kHz and 16 kHz input; confidence is
//! binary. An internal classifier failure degrades to confidence 0.0 rather
//! than propagating, so a bad frame can never stall the media pipeline.

use tracing::{debug, warn};
use webrtc_vad::{SampleRate, Vad, VadMode};

use super::{check_frame, VadDecision, VadError, VoiceActivityAnalyzer};
use crate::core::frames::AudioFrame;

/// Analyzer backed by the WebRTC bitstream classifier.
pub struct WebRtcVadAnalyzer {
    vad: Vad,
    sample_rate: u32,
}

impl std::fmt::Debug for WebRtcVadAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRtcVadAnalyzer")
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

// The underlying fvad instance is a raw pointer with no thread affinity;
// this analyzer owns it exclusively and is only ever driven by one pipeline
// stage at a time.
unsafe impl Send for WebRtcVadAnalyzer {}

impl WebRtcVadAnalyzer {
    /// Create an analyzer for the given sample rate.
    ///
    /// Fails with [`VadError::InvalidSampleRate`] for rates other than
    /// 8000 or 16000 Hz.
    pub fn new(sample_rate: u32) -> Result<Self, VadError> {
        let rate = match sample_rate {
            8000 => SampleRate::Rate8kHz,
            16000 => SampleRate::Rate16kHz,
            other => return Err(VadError::InvalidSampleRate(other)),
        };

        debug!(sample_rate, "initializing WebRTC VAD");
        // Mode 1 mirrors the fixed aggressiveness the detector has always
        // been deployed with.
        let vad = Vad::new_with_rate_and_mode(rate, VadMode::LowBitrate);

        Ok(Self { vad, sample_rate })
    }
}

impl VoiceActivityAnalyzer for WebRtcVadAnalyzer {
    fn classify(&mut self, frame: &AudioFrame) -> Result<VadDecision, VadError> {
        check_frame(frame, self.required_frame_samples())?;

        let samples = frame.samples();
        let confidence = match self.vad.is_voice_segment(&samples) {
            Ok(true) => 1.0,
            Ok(false) => 0.0,
            Err(_) => {
                warn!(
                    source = %frame.source,
                    "WebRTC VAD rejected frame internally; reporting silence"
                );
                0.0
            }
        };
        debug!(confidence, source = %frame.source, "WebRTC VAD frame");

        Ok(VadDecision::new(confidence, frame))
    }

    fn required_frame_samples(&self) -> usize {
        AudioFrame::expected_samples(self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::FrameSource;

    #[test]
    fn rejects_unsupported_sample_rates() {
        for rate in [11025u32, 22050, 44100, 48000] {
            let err = WebRtcVadAnalyzer::new(rate).unwrap_err();
            assert!(matches!(err, VadError::InvalidSampleRate(r) if r == rate));
        }
    }

    #[test]
    fn accepts_supported_sample_rates() {
        assert!(WebRtcVadAnalyzer::new(8000).is_ok());
        assert!(WebRtcVadAnalyzer::new(16000).is_ok());
    }

    #[test]
    fn required_frame_samples_track_rate() {
        assert_eq!(
            WebRtcVadAnalyzer::new(8000).unwrap().required_frame_samples(),
            240
        );
        assert_eq!(
            WebRtcVadAnalyzer::new(16000)
                .unwrap()
                .required_frame_samples(),
            480
        );
    }

    #[test]
    fn silence_frame_classifies_as_non_speech() {
        let mut analyzer = WebRtcVadAnalyzer::new(16000).unwrap();
        let frame = AudioFrame::from_samples(&[0i16; 480], 16000, FrameSource::User);
        let decision = analyzer.classify(&frame).unwrap();
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn confidence_is_binary() {
        let mut analyzer = WebRtcVadAnalyzer::new(16000).unwrap();
        let samples: Vec<i16> = (0..480)
            .map(|i| ((i as f32 * 0.3).sin() * 18000.0) as i16)
            .collect();
        let frame = AudioFrame::from_samples(&samples, 16000, FrameSource::User);
        let decision = analyzer.classify(&frame).unwrap();
        assert!(decision.confidence == 0.0 || decision.confidence == 1.0);
    }

    #[test]
    fn wrong_length_is_rejected_before_classification() {
        let mut analyzer = WebRtcVadAnalyzer::new(16000).unwrap();
        let frame = AudioFrame::from_samples(&[0i16; 512], 16000, FrameSource::User);
        let err = analyzer.classify(&frame).unwrap_err();
        assert!(matches!(
            err,
            VadError::LengthMismatch {
                got: 512,
                expected: 480
            }
        ));
    }
}
