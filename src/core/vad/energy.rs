//! Energy-threshold voice activity analyzer.
//!
//! Computes the root-mean-square energy of each frame and reports binary
//! confidence against a fixed threshold. Unitless: it imposes no sample-rate
//! restriction of its own, only the shared frame-length contract.

use tracing::debug;

use super::{check_frame, VadDecision, VadError, VoiceActivityAnalyzer};
use crate::core::frames::AudioFrame;

/// RMS threshold above which a frame counts as speech.
///
/// Tuned for 16-bit PCM microphone input; quiet rooms sit well below this.
pub const DEFAULT_RMS_THRESHOLD: f32 = 500.0;

/// Threshold-only analyzer over frame RMS energy.
pub struct EnergyThresholdAnalyzer {
    sample_rate: u32,
    threshold: f32,
}

impl EnergyThresholdAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_threshold(sample_rate, DEFAULT_RMS_THRESHOLD)
    }

    pub fn with_threshold(sample_rate: u32, threshold: f32) -> Self {
        debug!(sample_rate, threshold, "initializing energy VAD");
        Self {
            sample_rate,
            threshold,
        }
    }

    /// Root-mean-square energy of the decoded samples.
    fn rms(samples: &[i16]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples
            .iter()
            .map(|&s| {
                let s = s as f64;
                s * s
            })
            .sum();
        (sum_sq / samples.len() as f64).sqrt() as f32
    }
}

impl VoiceActivityAnalyzer for EnergyThresholdAnalyzer {
    fn classify(&mut self, frame: &AudioFrame) -> Result<VadDecision, VadError> {
        check_frame(frame, self.required_frame_samples())?;

        let samples = frame.samples();
        let rms = Self::rms(&samples);
        let confidence = if rms > self.threshold { 1.0 } else { 0.0 };
        debug!(rms, confidence, source = %frame.source, "energy VAD frame");

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

    fn frame_16k(samples: &[i16]) -> AudioFrame {
        AudioFrame::from_samples(samples, 16000, FrameSource::User)
    }

    #[test]
    fn all_zero_frame_is_silent() {
        let mut analyzer = EnergyThresholdAnalyzer::new(16000);
        let frame = frame_16k(&[0i16; 480]);
        let decision = analyzer.classify(&frame).unwrap();
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn loud_alternating_frame_is_speech() {
        let mut analyzer = EnergyThresholdAnalyzer::new(16000);
        let samples: Vec<i16> = (0..480)
            .map(|i| if i % 2 == 0 { 20000 } else { -20000 })
            .collect();
        let decision = analyzer.classify(&frame_16k(&samples)).unwrap();
        // RMS of a +/-20000 square wave is 20000, far above the threshold.
        assert_eq!(decision.confidence, 1.0);
    }

    #[test]
    fn quiet_hum_stays_below_threshold() {
        let mut analyzer = EnergyThresholdAnalyzer::new(16000);
        let samples = vec![300i16; 480];
        let decision = analyzer.classify(&frame_16k(&samples)).unwrap();
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let mut analyzer = EnergyThresholdAnalyzer::new(16000);
        let frame = frame_16k(&[0i16; 479]);
        let err = analyzer.classify(&frame).unwrap_err();
        assert!(matches!(
            err,
            VadError::LengthMismatch {
                got: 479,
                expected: 480
            }
        ));
    }

    #[test]
    fn odd_byte_count_is_rejected() {
        let mut analyzer = EnergyThresholdAnalyzer::new(16000);
        let frame = AudioFrame::new(vec![0u8; 961], 16000, FrameSource::User);
        let err = analyzer.classify(&frame).unwrap_err();
        assert!(matches!(err, VadError::UnalignedBuffer(961)));
    }

    #[test]
    fn required_samples_follow_sample_rate() {
        assert_eq!(
            EnergyThresholdAnalyzer::new(8000).required_frame_samples(),
            240
        );
        assert_eq!(
            EnergyThresholdAnalyzer::new(16000).required_frame_samples(),
            480
        );
    }

    #[test]
    fn rms_of_constant_signal() {
        assert_eq!(EnergyThresholdAnalyzer::rms(&[1000i16; 16]), 1000.0);
        assert_eq!(EnergyThresholdAnalyzer::rms(&[]), 0.0);
    }
}
