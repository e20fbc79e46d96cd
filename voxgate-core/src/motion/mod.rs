//! Collision-gated avatar motion.
//!
//! ## Per tick
//!
//! 1. Ease the height towards the target (always, even after finishing).
//! 2. Finished avatars stop moving along the track.
//! 3. Moving: step forward (towards lower positions) unless the new position
//!    would put the avatar inside a wall outside its aperture. Blocked steps
//!    leave the position untouched.
//! 4. Idle: drift backwards, but never past the start or back through the
//!    most recently cleared wall.
//! 5. Reaching the finish flips the phase to `Finished` exactly once.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::course::{Course, Obstacle};
use crate::error::{Result, VoxgateError};

/// Avatar physics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct MotionConfig {
    /// Avatar radius. Default: 0.3.
    pub radius: f64,
    /// Height for target 0. Default: 0.5.
    pub min_height: f64,
    /// Height for target 1. Default: 5.
    pub max_height: f64,
    /// Track distance per moving tick. Default: 0.05.
    pub forward_speed: f64,
    /// Track distance per idle tick. Default: 0.03.
    pub backward_speed: f64,
    /// Fraction of the remaining height gap closed per tick. Default: 0.1.
    pub height_lerp_speed: f64,
    /// Initial track position; also the furthest the avatar may retreat.
    /// Default: 5.
    pub start_position: f64,
    /// Gap kept behind a cleared wall when retreating. Default: 0.1.
    pub retreat_margin: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            radius: 0.3,
            min_height: 0.5,
            max_height: 5.0,
            forward_speed: 0.05,
            backward_speed: 0.03,
            height_lerp_speed: 0.1,
            start_position: 5.0,
            retreat_margin: 0.1,
        }
    }
}

impl MotionConfig {
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.radius,
            self.min_height,
            self.max_height,
            self.forward_speed,
            self.backward_speed,
            self.height_lerp_speed,
            self.start_position,
            self.retreat_margin,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(VoxgateError::config("motion config contains a non-finite value"));
        }
        if self.radius < 0.0 || self.retreat_margin < 0.0 {
            return Err(VoxgateError::config("radius and retreat margin must be >= 0"));
        }
        if self.max_height <= self.min_height {
            return Err(VoxgateError::config(format!(
                "max_height ({}) must exceed min_height ({})",
                self.max_height, self.min_height
            )));
        }
        if self.forward_speed <= 0.0 || self.backward_speed < 0.0 {
            return Err(VoxgateError::config(
                "forward_speed must be positive and backward_speed non-negative",
            ));
        }
        if !(self.height_lerp_speed > 0.0 && self.height_lerp_speed <= 1.0) {
            return Err(VoxgateError::config(format!(
                "height_lerp_speed must lie in (0, 1], got {}",
                self.height_lerp_speed
            )));
        }
        Ok(())
    }

    /// World height for a normalised target in [0, 1].
    pub fn target_height(&self, normalized: f64) -> f64 {
        self.min_height + normalized * (self.max_height - self.min_height)
    }
}

/// Session phase. `Finished` is terminal; there is no losing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Approaching,
    Finished,
}

/// Avatar state owned by one [`Simulator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorState {
    pub position: f64,
    pub height: f64,
    pub phase: Phase,
}

impl SimulatorState {
    pub fn has_finished(&self) -> bool {
        self.phase == Phase::Finished
    }
}

/// Whether an avatar at `position` and `height` is clear of every wall.
///
/// Every wall the avatar overlaps must have `height` inside its aperture,
/// shrunk by `radius` on both sides.
pub fn can_pass_through(position: f64, height: f64, obstacles: &[Obstacle], radius: f64) -> bool {
    obstacles
        .iter()
        .filter(|o| o.overlaps(position, radius))
        .all(|o| {
            let (low, high) = o.passable_heights(radius);
            height >= low && height <= high
        })
}

/// Furthest-back position reachable without re-entering a cleared wall.
///
/// Among the walls whose back face the avatar is already beyond, the one
/// nearest the avatar was cleared last; the floor sits `margin` past its
/// back face. `None` when no wall has been cleared yet.
pub fn retreat_floor(position: f64, obstacles: &[Obstacle], radius: f64, margin: f64) -> Option<f64> {
    obstacles
        .iter()
        .filter(|o| position < o.back_face(radius))
        .min_by(|a, b| a.position.total_cmp(&b.position))
        .map(|o| o.back_face(radius) - margin)
}

/// Steps one avatar along a course.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: MotionConfig,
    state: SimulatorState,
}

impl Simulator {
    /// A fresh avatar at the start position and minimum height.
    pub fn new(config: MotionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::at_start(config))
    }

    /// A new simulator with this one's configuration, back at the start.
    pub fn restarted(&self) -> Self {
        Self::at_start(self.config.clone())
    }

    fn at_start(config: MotionConfig) -> Self {
        let state = SimulatorState {
            position: config.start_position,
            height: config.min_height,
            phase: Phase::Approaching,
        };
        Self { config, state }
    }

    pub fn state(&self) -> SimulatorState {
        self.state
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Advance one tick. Returns `true` on the tick the finish is crossed.
    ///
    /// `target` is the normalised height in [0, 1]; `is_moving` is the
    /// singer's activity flag.
    pub fn advance(&mut self, target: f64, is_moving: bool, course: &Course) -> bool {
        let cfg = &self.config;
        let state = &mut self.state;

        let target_height = cfg.target_height(target);
        state.height += (target_height - state.height) * cfg.height_lerp_speed;

        if state.phase == Phase::Finished {
            return false;
        }

        if is_moving {
            let candidate = state.position - cfg.forward_speed;
            if can_pass_through(candidate, state.height, &course.obstacles, cfg.radius) {
                state.position = candidate;
            }
        } else {
            let floor = retreat_floor(
                state.position,
                &course.obstacles,
                cfg.radius,
                cfg.retreat_margin,
            );
            let ceiling = floor.map_or(cfg.start_position, |f| f.min(cfg.start_position));
            state.position = ceiling.min(state.position + cfg.backward_speed);
        }

        if state.position <= course.finish_position {
            state.phase = Phase::Finished;
            info!(
                position = state.position,
                finish = course.finish_position,
                "finish line crossed"
            );
            return true;
        }
        false
    }
}
