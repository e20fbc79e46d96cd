//! Voice analysis: periodicity-based pitch tracking plus volume gating.
//!
//! ```text
//! AudioFrame ─► RMS volume ─► silence gate ─► NSDF lag scan ─► peak pick
//!                                                   │
//!                           frequency_to_pitch ◄────┘
//!                                   │
//!                      exponential smoothing ─► EstimationResult
//! ```

pub mod estimator;
pub mod mapping;
pub mod notes;
pub mod nsdf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoxgateError};

/// Tuning for [`estimator::PitchEstimator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct VoiceConfig {
    /// Lowest tracked fundamental (Hz). Default: 80 (low male voice).
    pub min_frequency: f32,
    /// Highest tracked fundamental (Hz). Default: 800 (high female voice).
    pub max_frequency: f32,
    /// Gained RMS level below which a frame counts as silent. Default: 0.005.
    pub volume_threshold: f32,
    /// Multiplier applied to raw RMS before clamping to [0, 1]. Default: 5.
    pub volume_gain: f32,
    /// Exponential smoothing factor α for the pitch. Default: 0.3.
    pub pitch_smoothing: f32,
    /// Consecutive silent frames tolerated before the pitch starts to fall.
    /// Default: 10.
    pub silence_frames_before_drop: u32,
    /// Per-frame multiplicative decay once silence persists. Default: 0.9.
    pub silence_decay: f32,
    /// A decaying pitch below this snaps to exactly 0. Default: 0.01.
    pub silence_snap_epsilon: f32,
    /// NSDF score a local maximum must exceed to be picked. Default: 0.2.
    pub peak_threshold: f32,
    /// Minimum score of the chosen lag for a pitch update. Default: 0.1.
    pub confidence_floor: f32,
    /// Analysis window length in samples. Default: 2048.
    pub frame_size: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            min_frequency: 80.0,
            max_frequency: 800.0,
            volume_threshold: 0.005,
            volume_gain: 5.0,
            pitch_smoothing: 0.3,
            silence_frames_before_drop: 10,
            silence_decay: 0.9,
            silence_snap_epsilon: 0.01,
            peak_threshold: 0.2,
            confidence_floor: 0.1,
            frame_size: 2048,
        }
    }
}

impl VoiceConfig {
    /// Check bounds that do not depend on the capture sample rate.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.min_frequency,
            self.max_frequency,
            self.volume_threshold,
            self.volume_gain,
            self.pitch_smoothing,
            self.silence_decay,
            self.silence_snap_epsilon,
            self.peak_threshold,
            self.confidence_floor,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(VoxgateError::config("voice config contains a non-finite value"));
        }
        if self.min_frequency <= 0.0 {
            return Err(VoxgateError::config(format!(
                "min_frequency must be positive, got {}",
                self.min_frequency
            )));
        }
        if self.max_frequency <= self.min_frequency {
            return Err(VoxgateError::config(format!(
                "max_frequency ({}) must exceed min_frequency ({})",
                self.max_frequency, self.min_frequency
            )));
        }
        if self.volume_threshold < 0.0 || self.volume_gain <= 0.0 {
            return Err(VoxgateError::config(
                "volume_threshold must be >= 0 and volume_gain > 0",
            ));
        }
        if !(self.pitch_smoothing > 0.0 && self.pitch_smoothing <= 1.0) {
            return Err(VoxgateError::config(format!(
                "pitch_smoothing must lie in (0, 1], got {}",
                self.pitch_smoothing
            )));
        }
        if !(0.0..1.0).contains(&self.silence_decay) {
            return Err(VoxgateError::config(format!(
                "silence_decay must lie in [0, 1), got {}",
                self.silence_decay
            )));
        }
        if self.frame_size < 2 {
            return Err(VoxgateError::config("frame_size must be at least 2 samples"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        VoiceConfig::default().validate().expect("default voice config");
    }

    #[test]
    fn inverted_frequency_bounds_rejected() {
        let cfg = VoiceConfig {
            min_frequency: 500.0,
            max_frequency: 400.0,
            ..VoiceConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(VoxgateError::Configuration(_))));
    }

    #[test]
    fn zero_min_frequency_rejected() {
        let cfg = VoiceConfig {
            min_frequency: 0.0,
            ..VoiceConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn deserializes_partial_json_over_defaults() {
        let cfg: VoiceConfig =
            serde_json::from_str(r#"{"minFrequency": 100.0, "frameSize": 1024}"#)
                .expect("deserialize voice config");
        assert_eq!(cfg.min_frequency, 100.0);
        assert_eq!(cfg.frame_size, 1024);
        assert_eq!(cfg.max_frequency, 800.0);
    }
}
