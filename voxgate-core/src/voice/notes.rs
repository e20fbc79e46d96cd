//! Target notes and their conversion into course heights.

use serde::{Deserialize, Serialize};

use crate::course::CourseTarget;
use crate::error::{Result, VoxgateError};
use crate::voice::mapping::{frequency_to_pitch, NoteRange};
use crate::voice::VoiceConfig;

/// A labelled target pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub label: String,
    pub frequency_hz: f32,
}

impl Note {
    pub fn new(label: impl Into<String>, frequency_hz: f32) -> Self {
        Self {
            label: label.into(),
            frequency_hz,
        }
    }
}

/// Do–Re–Mi–Fa–So–La–Ti–Do, C4 to C5.
pub const SOLFEGE_SCALE: [(&str, f32); 8] = [
    ("Do", 261.63),
    ("Re", 293.66),
    ("Mi", 329.63),
    ("Fa", 349.23),
    ("So", 392.0),
    ("La", 440.0),
    ("Ti", 493.88),
    ("Do\u{2082}", 523.25),
];

pub fn solfege_scale() -> Vec<Note> {
    SOLFEGE_SCALE
        .iter()
        .map(|(label, hz)| Note::new(*label, *hz))
        .collect()
}

/// The pitch span between the lowest and highest of `notes`.
pub fn note_range(notes: &[Note], voice: &VoiceConfig) -> Result<NoteRange> {
    if notes.is_empty() {
        return Err(VoxgateError::config("course needs at least one note"));
    }
    if let Some(bad) = notes
        .iter()
        .find(|n| !n.frequency_hz.is_finite() || n.frequency_hz <= 0.0)
    {
        return Err(VoxgateError::config(format!(
            "note '{}' has invalid frequency {}",
            bad.label, bad.frequency_hz
        )));
    }
    let low = notes
        .iter()
        .map(|n| n.frequency_hz)
        .fold(f32::INFINITY, f32::min);
    let high = notes
        .iter()
        .map(|n| n.frequency_hz)
        .fold(f32::NEG_INFINITY, f32::max);
    NoteRange::from_frequencies(low, high, voice)
}

/// Turn `notes` into course targets whose heights live in the note range.
pub fn scale_targets(notes: &[Note], voice: &VoiceConfig) -> Result<(NoteRange, Vec<CourseTarget>)> {
    let range = note_range(notes, voice)?;
    let targets = notes
        .iter()
        .map(|note| {
            let pitch = frequency_to_pitch(note.frequency_hz, voice.min_frequency, voice.max_frequency);
            CourseTarget::new(note.label.clone(), f64::from(range.remap(pitch)))
        })
        .collect();
    Ok((range, targets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_spans_full_height() {
        let voice = VoiceConfig::default();
        let (_, targets) = scale_targets(&solfege_scale(), &voice).expect("targets");
        assert_eq!(targets.len(), 8);
        assert_eq!(targets[0].label, "Do");
        assert_eq!(targets[0].height, 0.0);
        assert_eq!(targets[7].height, 1.0);
        for pair in targets.windows(2) {
            assert!(pair[1].height > pair[0].height, "scale must rise");
        }
    }

    #[test]
    fn single_note_has_no_range() {
        let voice = VoiceConfig::default();
        let err = scale_targets(&[Note::new("A", 440.0)], &voice);
        assert!(err.is_err());
    }

    #[test]
    fn empty_and_invalid_notes_rejected() {
        let voice = VoiceConfig::default();
        assert!(note_range(&[], &voice).is_err());
        assert!(note_range(&[Note::new("x", -3.0), Note::new("y", 300.0)], &voice).is_err());
    }
}
