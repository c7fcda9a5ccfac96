//! Silero neural voice activity analyzer (feature `neural-vad`).
//!
//! Runs the Silero VAD ONNX model through `ort`. The model is recurrent:
//! LSTM state and a short context window carry over between frames, so one
//! analyzer instance must only ever see one audio stream.
//!
//! Unlike the threshold analyzers, the model dictates its own frame size:
//! 512 samples at 16 kHz, 256 at 8 kHz. `required_frame_samples` reports
//! that native size instead of the 30 ms framing.

use std::env;
use std::path::{Path, PathBuf};

use ndarray::Array3;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info};

use super::{check_frame, VadDecision, VadError, VoiceActivityAnalyzer};
use crate::core::frames::AudioFrame;

/// Environment variable naming the local ONNX model file.
pub const MODEL_PATH_ENV: &str = "SILERO_VAD_MODEL_PATH";

/// LSTM state tensor shape: [2, 1, 128].
const STATE_DIMS: (usize, usize, usize) = (2, 1, 128);

/// Neural analyzer over the Silero VAD ONNX model.
pub struct SileroVadAnalyzer {
    session: Session,
    sample_rate: u32,
    state: Array3<f32>,
    context: Vec<f32>,
}

impl SileroVadAnalyzer {
    /// Create an analyzer, locating the model through [`MODEL_PATH_ENV`].
    pub fn new(sample_rate: u32) -> Result<Self, VadError> {
        let path = env::var(MODEL_PATH_ENV).map(PathBuf::from).map_err(|_| {
            VadError::Analyzer(format!(
                "{MODEL_PATH_ENV} must point at a local Silero VAD ONNX model"
            ))
        })?;
        Self::with_model_path(sample_rate, &path)
    }

    /// Create an analyzer from an explicit model path.
    pub fn with_model_path(sample_rate: u32, model_path: &Path) -> Result<Self, VadError> {
        if sample_rate != 8000 && sample_rate != 16000 {
            return Err(VadError::InvalidSampleRate(sample_rate));
        }

        info!(?model_path, sample_rate, "loading Silero VAD model");
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| VadError::Analyzer(format!("failed to load Silero model: {e}")))?;

        Ok(Self {
            session,
            sample_rate,
            state: Array3::zeros(STATE_DIMS),
            context: vec![0.0; Self::context_size(sample_rate)],
        })
    }

    fn frame_size(sample_rate: u32) -> usize {
        if sample_rate == 8000 { 256 } else { 512 }
    }

    fn context_size(sample_rate: u32) -> usize {
        if sample_rate == 8000 { 32 } else { 64 }
    }

    /// Clear the recurrent state, e.g. when a new audio stream starts.
    pub fn reset(&mut self) {
        self.state = Array3::zeros(STATE_DIMS);
        self.context = vec![0.0; Self::context_size(self.sample_rate)];
        debug!("Silero VAD state reset");
    }

    fn infer(&mut self, input: Vec<f32>) -> Result<f32, VadError> {
        let input_len = input.len();
        let input_value = Value::from_array(([1, input_len], input))
            .map_err(|e| VadError::Analyzer(format!("input tensor: {e}")))?
            .into();

        let state_data: Vec<f32> = self.state.iter().copied().collect();
        let state_value =
            Value::from_array(([STATE_DIMS.0, STATE_DIMS.1, STATE_DIMS.2], state_data))
                .map_err(|e| VadError::Analyzer(format!("state tensor: {e}")))?
                .into();

        let sr_value = Value::from_array(([1usize], vec![self.sample_rate as i64]))
            .map_err(|e| VadError::Analyzer(format!("sample-rate tensor: {e}")))?
            .into();

        let inputs: Vec<(&str, Value)> = vec![
            ("input", input_value),
            ("state", state_value),
            ("sr", sr_value),
        ];

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| VadError::Analyzer(format!("inference failed: {e}")))?;

        let (_, probs) = outputs
            .get("output")
            .ok_or_else(|| VadError::Analyzer("model produced no 'output' tensor".into()))?
            .try_extract_tensor::<f32>()
            .map_err(|e| VadError::Analyzer(format!("output tensor: {e}")))?;
        let speech_prob = probs.first().copied().unwrap_or(0.0);

        if let Some(state) = outputs.get("stateN") {
            let (_, state_data) = state
                .try_extract_tensor::<f32>()
                .map_err(|e| VadError::Analyzer(format!("stateN tensor: {e}")))?;
            if state_data.len() == STATE_DIMS.0 * STATE_DIMS.1 * STATE_DIMS.2 {
                self.state = Array3::from_shape_vec(STATE_DIMS, state_data.to_vec())
                    .map_err(|e| VadError::Analyzer(format!("stateN shape: {e}")))?;
            }
        }

        Ok(speech_prob)
    }
}

impl VoiceActivityAnalyzer for SileroVadAnalyzer {
    fn classify(&mut self, frame: &AudioFrame) -> Result<VadDecision, VadError> {
        let frame_size = self.required_frame_samples();
        check_frame(frame, frame_size)?;

        // Normalize to [-1.0, 1.0] and prepend the context window from the
        // previous frame for temporal continuity.
        let normalized: Vec<f32> = frame
            .samples()
            .iter()
            .map(|&s| s as f32 / 32768.0)
            .collect();

        let context_size = self.context.len();
        let mut input = Vec::with_capacity(context_size + frame_size);
        input.extend_from_slice(&self.context);
        input.extend_from_slice(&normalized);
        self.context
            .copy_from_slice(&normalized[normalized.len() - context_size..]);

        let speech_prob = self.infer(input)?;
        debug!(speech_prob, source = %frame.source, "Silero VAD frame");

        Ok(VadDecision::new(speech_prob.clamp(0.0, 1.0), frame))
    }

    fn required_frame_samples(&self) -> usize {
        Self::frame_size(self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_and_context_sizes_follow_rate() {
        assert_eq!(SileroVadAnalyzer::frame_size(8000), 256);
        assert_eq!(SileroVadAnalyzer::frame_size(16000), 512);
        assert_eq!(SileroVadAnalyzer::context_size(8000), 32);
        assert_eq!(SileroVadAnalyzer::context_size(16000), 64);
    }

    #[test]
    fn unsupported_rate_is_rejected() {
        let err =
            SileroVadAnalyzer::with_model_path(44100, Path::new("/nonexistent")).unwrap_err();
        assert!(matches!(err, VadError::InvalidSampleRate(44100)));
    }
}
