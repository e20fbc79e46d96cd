//! Events emitted by the engine each tick.
//!
//! | Event | Broadcast | Cadence |
//! |-------|-----------|---------|
//! | `VoiceEvent` | `subscribe_voice` | every analysed tick |
//! | `AvatarEvent` | `subscribe_avatar` | every tick |
//! | `SessionStatusEvent` | `subscribe_status` | on state change |

use serde::{Deserialize, Serialize};

use crate::motion::{Phase, SimulatorState};
use crate::voice::estimator::EstimationResult;

// ---------------------------------------------------------------------------
// Voice events
// ---------------------------------------------------------------------------

/// What the estimator reported this tick, plus the remapped course height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceEvent {
    /// Monotonically increasing tick sequence number.
    pub seq: u64,
    /// Gained RMS level in [0.0, 1.0].
    pub volume: f32,
    pub is_active: bool,
    /// Normalised pitch across the full vocal range.
    pub pitch: f32,
    /// Detected fundamental, 0 when none.
    pub frequency_hz: f32,
    /// Pitch remapped into the course's note range; the avatar's target.
    pub height: f32,
}

impl VoiceEvent {
    pub fn new(seq: u64, estimation: &EstimationResult, height: f32) -> Self {
        Self {
            seq,
            volume: estimation.volume,
            is_active: estimation.is_active,
            pitch: estimation.pitch,
            frequency_hz: estimation.frequency_hz,
            height,
        }
    }
}

// ---------------------------------------------------------------------------
// Avatar events
// ---------------------------------------------------------------------------

/// Avatar placement after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarEvent {
    pub seq: u64,
    pub position: f64,
    pub height: f64,
    pub phase: Phase,
}

impl AvatarEvent {
    pub fn new(seq: u64, state: &SimulatorState) -> Self {
        Self {
            seq,
            position: state.position,
            height: state.height,
            phase: state.phase,
        }
    }
}

// ---------------------------------------------------------------------------
// Session status events
// ---------------------------------------------------------------------------

/// Emitted when the session state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusEvent {
    pub status: SessionStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Engine created but `start()` not yet called.
    Idle,
    /// Frames are flowing and the avatar is on the course.
    Running,
    /// The avatar crossed the finish line; ticks continue until stopped.
    Finished,
    /// Capture stopped or the source ran dry; the engine may be restarted.
    Stopped,
    /// Unrecoverable error; restart required.
    Error,
}
