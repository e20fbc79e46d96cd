//! # voxgate-core
//!
//! Voice-driven motion core: turns live vocal audio into a normalised pitch
//! and an activity flag, then uses both to steer a point avatar through a
//! course of gated obstacles.
//!
//! ## Architecture
//!
//! ```text
//! Microphone / WAV → SPSC RingBuffer → Pipeline(spawn_blocking)
//!                                          │
//!                                   FrameAssembler → AudioFrame
//!                                          │
//!                               PitchEstimator::process_frame
//!                                          │
//!                                  NoteRange::remap (height)
//!                                          │
//!                                   Simulator::advance
//!                                          │
//!                      broadcast::Sender<VoiceEvent / AvatarEvent>
//! ```
//!
//! `voice`, `course` and `motion` contain no loops, threads or clocks. The
//! `engine` module is one possible host for them; tests and embedders can
//! drive an [`engine::session::Session`] directly, one tick at a time.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod course;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod motion;
pub mod voice;

// Convenience re-exports for downstream crates
pub use buffering::frame::AudioFrame;
pub use course::{generate_course, Course, CourseConfig, CourseTarget, Obstacle};
pub use engine::{session::Session, FrameSourceKind, GameConfig, GameEngine};
pub use error::VoxgateError;
pub use ipc::events::{AvatarEvent, SessionStatus, SessionStatusEvent, VoiceEvent};
pub use motion::{MotionConfig, Phase, Simulator, SimulatorState};
pub use voice::{
    estimator::{EstimationResult, EstimatorState, PitchEstimator},
    mapping::{frequency_to_pitch, remap_to_subrange, NoteRange},
    VoiceConfig,
};
