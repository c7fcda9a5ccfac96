//! Turn-state tracking over per-frame VAD confidence.
//!
//! One tracker runs per audio source (user and bot are tracked
//! independently). The state machine has two states:
//!
//! ```text
//! [Silent] ── confidence >= threshold ──────────────► [Speaking]
//!                                                          │
//! [Speaking] ── confidence < threshold for >= stop_secs ──┘
//!              (contiguous; any speech frame resets the clock)
//! ```
//!
//! The silence hysteresis prevents chattering on brief pauses within an
//! utterance: a sub-threshold dip shorter than `stop_secs` emits nothing.
//! Exactly one [`TurnEvent`] is emitted per transition edge, so started and
//! stopped events always alternate.

use std::time::Instant;

use tracing::{debug, info};

use super::frames::{FrameSource, FRAME_DURATION_MS};
use super::vad::VadDecision;

/// Discrete speaking transition for one audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    SpeakingStarted { at: Instant },
    SpeakingStopped { at: Instant },
}

impl TurnEvent {
    pub fn is_started(&self) -> bool {
        matches!(self, TurnEvent::SpeakingStarted { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, TurnEvent::SpeakingStopped { .. })
    }
}

/// Tuning for the turn tracker.
#[derive(Debug, Clone, Copy)]
pub struct TurnTrackerConfig {
    /// Confidence at or above which a frame counts as speech.
    ///
    /// The analyzers produce binary or near-binary confidence, so 0.5
    /// splits the scale cleanly.
    pub activation_threshold: f32,

    /// Contiguous sub-threshold duration required before declaring that the
    /// speaker stopped.
    pub stop_secs: f32,

    /// Duration one frame represents, in milliseconds.
    pub frame_duration_ms: u64,
}

impl Default for TurnTrackerConfig {
    fn default() -> Self {
        Self {
            activation_threshold: 0.5,
            stop_secs: 0.5,
            frame_duration_ms: FRAME_DURATION_MS as u64,
        }
    }
}

impl TurnTrackerConfig {
    pub fn with_stop_secs(mut self, stop_secs: f32) -> Self {
        self.stop_secs = stop_secs;
        self
    }

    fn stop_ms(&self) -> u64 {
        (self.stop_secs * 1000.0).round() as u64
    }
}

/// Per-source speaking/silent state machine with silence hysteresis.
///
/// Owned exclusively by its pipeline stage; frames are delivered one at a
/// time, so plain mutable state suffices.
pub struct TurnStateTracker {
    config: TurnTrackerConfig,
    source: FrameSource,
    speaking: bool,
    silence_ms: u64,
}

impl TurnStateTracker {
    pub fn new(source: FrameSource, config: TurnTrackerConfig) -> Self {
        Self {
            config,
            source,
            speaking: false,
            silence_ms: 0,
        }
    }

    /// Feed one VAD decision; returns an event only on a transition edge.
    pub fn process(&mut self, decision: &VadDecision) -> Option<TurnEvent> {
        let is_speech = decision.confidence >= self.config.activation_threshold;

        if is_speech {
            self.silence_ms = 0;
            if !self.speaking {
                self.speaking = true;
                info!(source = %self.source, "speaking started");
                return Some(TurnEvent::SpeakingStarted {
                    at: decision.timestamp,
                });
            }
            return None;
        }

        if !self.speaking {
            return None;
        }

        self.silence_ms += self.config.frame_duration_ms;
        if self.silence_ms >= self.config.stop_ms() {
            self.speaking = false;
            self.silence_ms = 0;
            info!(source = %self.source, "speaking stopped");
            return Some(TurnEvent::SpeakingStopped {
                at: decision.timestamp,
            });
        }

        debug!(
            source = %self.source,
            silence_ms = self.silence_ms,
            "sub-threshold dip within hysteresis window"
        );
        None
    }

    /// Whether the source is currently considered to be speaking.
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Accumulated contiguous silence while speaking, in milliseconds.
    pub fn current_silence_ms(&self) -> u64 {
        self.silence_ms
    }

    /// Return to the initial Silent state.
    pub fn reset(&mut self) {
        self.speaking = false;
        self.silence_ms = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(confidence: f32) -> VadDecision {
        VadDecision {
            confidence,
            source: FrameSource::User,
            timestamp: Instant::now(),
        }
    }

    /// Tracker with 30 ms frames and a 90 ms (3 frame) stop window.
    fn short_tracker() -> TurnStateTracker {
        TurnStateTracker::new(
            FrameSource::User,
            TurnTrackerConfig::default().with_stop_secs(0.09),
        )
    }

    #[test]
    fn initial_state_is_silent() {
        let tracker = short_tracker();
        assert!(!tracker.is_speaking());
        assert_eq!(tracker.current_silence_ms(), 0);
    }

    #[test]
    fn silence_without_speech_emits_nothing() {
        let mut tracker = short_tracker();
        for _ in 0..20 {
            assert_eq!(tracker.process(&decision(0.0)), None);
        }
        assert!(!tracker.is_speaking());
    }

    #[test]
    fn first_speech_frame_starts_turn() {
        let mut tracker = short_tracker();
        let event = tracker.process(&decision(1.0)).unwrap();
        assert!(event.is_started());
        assert!(tracker.is_speaking());
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut tracker = short_tracker();
        assert!(tracker.process(&decision(0.5)).unwrap().is_started());
        let mut below = short_tracker();
        assert_eq!(below.process(&decision(0.49)), None);
    }

    #[test]
    fn continued_speech_emits_nothing() {
        let mut tracker = short_tracker();
        tracker.process(&decision(1.0));
        for _ in 0..10 {
            assert_eq!(tracker.process(&decision(1.0)), None);
        }
    }

    #[test]
    fn stop_requires_full_hysteresis_window() {
        let mut tracker = short_tracker();
        tracker.process(&decision(1.0));

        // Two silent frames (60 ms) are below the 90 ms window.
        assert_eq!(tracker.process(&decision(0.0)), None);
        assert_eq!(tracker.process(&decision(0.0)), None);
        assert!(tracker.is_speaking());

        // Third frame reaches 90 ms and closes the turn.
        let event = tracker.process(&decision(0.0)).unwrap();
        assert!(event.is_stopped());
        assert!(!tracker.is_speaking());
    }

    #[test]
    fn brief_dip_is_suppressed_by_hysteresis() {
        // Speech for 0.2 s, a 0.3 s dip, then speech again with the default
        // 0.5 s stop window: no stopped event may be emitted.
        let mut tracker = TurnStateTracker::new(FrameSource::User, TurnTrackerConfig::default());

        let mut events = Vec::new();
        for _ in 0..7 {
            // ~0.21 s of speech
            if let Some(e) = tracker.process(&decision(0.9)) {
                events.push(e);
            }
        }
        for _ in 0..10 {
            // ~0.3 s below threshold
            if let Some(e) = tracker.process(&decision(0.1)) {
                events.push(e);
            }
        }
        for _ in 0..7 {
            // speech resumes
            if let Some(e) = tracker.process(&decision(0.9)) {
                events.push(e);
            }
        }

        assert_eq!(events.len(), 1);
        assert!(events[0].is_started());
        assert!(tracker.is_speaking());
    }

    #[test]
    fn speech_frame_resets_silence_clock() {
        let mut tracker = short_tracker();
        tracker.process(&decision(1.0));
        tracker.process(&decision(0.0));
        tracker.process(&decision(0.0));
        assert_eq!(tracker.current_silence_ms(), 60);

        tracker.process(&decision(1.0));
        assert_eq!(tracker.current_silence_ms(), 0);

        // The window starts over from scratch.
        assert_eq!(tracker.process(&decision(0.0)), None);
        assert_eq!(tracker.process(&decision(0.0)), None);
        assert!(tracker.process(&decision(0.0)).unwrap().is_stopped());
    }

    #[test]
    fn events_always_alternate() {
        let mut tracker = short_tracker();
        let pattern: Vec<f32> = vec![
            1.0, 1.0, 0.0, 0.0, 0.0, // start, stop
            0.0, 0.0, // idle
            1.0, 0.0, 1.0, 1.0, // start with a one-frame dip
            0.0, 0.0, 0.0, // stop
            1.0, // start again
        ];

        let mut last_started: Option<bool> = None;
        for confidence in pattern {
            if let Some(event) = tracker.process(&decision(confidence)) {
                let started = event.is_started();
                assert_ne!(
                    Some(started),
                    last_started,
                    "two consecutive events of the same kind"
                );
                last_started = Some(started);
            }
        }
    }

    #[test]
    fn no_duplicate_stop_after_turn_closes() {
        let mut tracker = short_tracker();
        tracker.process(&decision(1.0));
        tracker.process(&decision(0.0));
        tracker.process(&decision(0.0));
        assert!(tracker.process(&decision(0.0)).unwrap().is_stopped());

        // Further silence emits nothing.
        for _ in 0..10 {
            assert_eq!(tracker.process(&decision(0.0)), None);
        }
    }

    #[test]
    fn reset_returns_to_silent() {
        let mut tracker = short_tracker();
        tracker.process(&decision(1.0));
        tracker.reset();
        assert!(!tracker.is_speaking());
        // Next speech frame is a fresh start edge.
        assert!(tracker.process(&decision(1.0)).unwrap().is_started());
    }

    #[test]
    fn default_config_matches_deployment_tuning() {
        let config = TurnTrackerConfig::default();
        assert_eq!(config.activation_threshold, 0.5);
        assert_eq!(config.stop_secs, 0.5);
        assert_eq!(config.frame_duration_ms, 30);
        assert_eq!(config.stop_ms(), 500);
    }
}
