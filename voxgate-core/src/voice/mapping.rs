//! Frequency ↔ normalised pitch mapping on a log2 scale.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoxgateError};
use crate::voice::VoiceConfig;

/// Map `freq_hz` onto [0, 1] logarithmically between `min_freq` and `max_freq`.
///
/// Frequencies outside the range are clamped first, so the result is always
/// in [0, 1]. Callers must guarantee `0 < min_freq < max_freq`;
/// [`VoiceConfig::validate`] enforces this for configured bounds.
pub fn frequency_to_pitch(freq_hz: f32, min_freq: f32, max_freq: f32) -> f32 {
    debug_assert!(min_freq > 0.0 && max_freq > min_freq);
    let clamped = freq_hz.clamp(min_freq, max_freq);
    let min_log = min_freq.log2();
    let max_log = max_freq.log2();
    (clamped.log2() - min_log) / (max_log - min_log)
}

/// Clamp `pitch` to `[sub_min, sub_max]` and rescale that span to [0, 1].
///
/// A degenerate span (`sub_max <= sub_min`) maps everything to 0.
pub fn remap_to_subrange(pitch: f32, sub_min: f32, sub_max: f32) -> f32 {
    if sub_max <= sub_min {
        return 0.0;
    }
    let clamped = pitch.clamp(sub_min, sub_max);
    (clamped - sub_min) / (sub_max - sub_min)
}

/// The slice of the vocal pitch range spanned by a course's notes.
///
/// Remapping through it stretches the lowest note to 0 and the highest to 1,
/// so the whole course uses the avatar's full vertical travel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRange {
    pub min_pitch: f32,
    pub max_pitch: f32,
}

impl NoteRange {
    pub fn new(min_pitch: f32, max_pitch: f32) -> Result<Self> {
        if !(min_pitch.is_finite() && max_pitch.is_finite()) || max_pitch <= min_pitch {
            return Err(VoxgateError::config(format!(
                "note range must be increasing, got [{min_pitch}, {max_pitch}]"
            )));
        }
        Ok(Self {
            min_pitch,
            max_pitch,
        })
    }

    /// Derive the range from the lowest and highest note frequency.
    pub fn from_frequencies(low_hz: f32, high_hz: f32, voice: &VoiceConfig) -> Result<Self> {
        Self::new(
            frequency_to_pitch(low_hz, voice.min_frequency, voice.max_frequency),
            frequency_to_pitch(high_hz, voice.min_frequency, voice.max_frequency),
        )
    }

    pub fn remap(&self, pitch: f32) -> f32 {
        remap_to_subrange(pitch, self.min_pitch, self.max_pitch)
    }
}
