//! One playthrough: estimator state, avatar and course, stepped per tick.
//!
//! A `Session` has no threads or clocks of its own. The pipeline calls
//! [`Session::tick`] once per analysed frame (or with `None` when the source
//! stalls); tests can do the same directly.

use std::sync::Arc;

use tracing::debug;

use crate::buffering::frame::AudioFrame;
use crate::course::Course;
use crate::engine::{CoursePlan, GameConfig};
use crate::error::Result;
use crate::motion::{Simulator, SimulatorState};
use crate::voice::estimator::{EstimationResult, EstimatorState, PitchEstimator};
use crate::voice::mapping::NoteRange;

/// Everything one tick produced, for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub estimation: EstimationResult,
    /// Pitch remapped into the course's note range; the avatar's target in [0, 1].
    pub target: f32,
    pub avatar: SimulatorState,
    /// `true` only on the tick the finish line was crossed.
    pub crossed_finish: bool,
}

#[derive(Debug)]
pub struct Session {
    estimator: PitchEstimator,
    estimator_state: EstimatorState,
    simulator: Simulator,
    course: Arc<Course>,
    note_range: NoteRange,
    last: EstimationResult,
    ticks: u64,
}

impl Session {
    /// Build a session, generating the course from `config.notes`.
    pub fn new(config: &GameConfig, sample_rate: u32) -> Result<Self> {
        let plan = config.plan()?;
        Self::from_plan(config, &plan, sample_rate)
    }

    /// Build a session on an already generated course.
    ///
    /// # Errors
    /// `Configuration` when the voice settings cannot be tracked at
    /// `sample_rate` or the motion settings are invalid.
    pub fn from_plan(config: &GameConfig, plan: &CoursePlan, sample_rate: u32) -> Result<Self> {
        Ok(Self {
            estimator: PitchEstimator::new(config.voice.clone(), sample_rate)?,
            estimator_state: EstimatorState::new(),
            simulator: Simulator::new(config.motion.clone())?,
            course: Arc::clone(&plan.course),
            note_range: plan.note_range,
            last: EstimationResult::default(),
            ticks: 0,
        })
    }

    /// Step the session once.
    ///
    /// `None` means no frame arrived this tick: the estimator is left alone
    /// and the previous estimation drives the avatar again.
    pub fn tick(&mut self, frame: Option<&AudioFrame>) -> TickReport {
        if let Some(frame) = frame {
            self.last = self
                .estimator
                .process_frame(frame, &mut self.estimator_state);
        }
        let target = self.note_range.remap(self.last.pitch);
        let crossed_finish =
            self.simulator
                .advance(f64::from(target), self.last.is_active, &self.course);
        self.ticks += 1;

        TickReport {
            estimation: self.last,
            target,
            avatar: self.simulator.state(),
            crossed_finish,
        }
    }

    /// Discard all per-session state and put the avatar back at the start.
    pub fn reset(&mut self) {
        debug!(ticks = self.ticks, "session reset");
        self.estimator_state = EstimatorState::new();
        self.simulator = self.simulator.restarted();
        self.last = EstimationResult::default();
        self.ticks = 0;
    }

    pub fn avatar(&self) -> SimulatorState {
        self.simulator.state()
    }

    pub fn last_estimation(&self) -> EstimationResult {
        self.last
    }

    pub fn course(&self) -> &Arc<Course> {
        &self.course
    }

    pub fn note_range(&self) -> NoteRange {
        self.note_range
    }

    pub fn sample_rate(&self) -> u32 {
        self.estimator.sample_rate()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
