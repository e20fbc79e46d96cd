//! Per-stream pitch and volume estimator.
//!
//! ## Algorithm (per frame)
//!
//! 1. RMS volume × gain, clamped to [0, 1].
//! 2. Below `volume_threshold`: count a silent frame. Past
//!    `silence_frames_before_drop` the held pitch decays ×`silence_decay`
//!    and snaps to 0 under `silence_snap_epsilon`; inside that grace window
//!    the previous result is held so short dropouts do not stall the avatar.
//!    No lag scan runs on silent frames.
//! 3. Otherwise scan NSDF lags and pick a period (see [`nsdf::pick_peak`]).
//! 4. A confident period updates the smoothed pitch; an unconfident one
//!    keeps it, still reporting activity from volume alone.

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::buffering::frame::AudioFrame;
use crate::error::Result;
use crate::voice::mapping::frequency_to_pitch;
use crate::voice::nsdf::{self, PeriodWindow};
use crate::voice::VoiceConfig;

/// What one frame tells the rest of the system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationResult {
    /// Gained RMS level in [0, 1].
    pub volume: f32,
    /// Whether the singer is currently considered to be singing.
    pub is_active: bool,
    /// Smoothed normalised pitch in [0, 1].
    pub pitch: f32,
    /// Detected fundamental this frame, or 0 when none was tracked.
    pub frequency_hz: f32,
}

/// Mutable per-stream state threaded through [`PitchEstimator::process_frame`].
///
/// One instance per session; create a fresh one (or call [`reset`]) when
/// the session restarts.
///
/// [`reset`]: EstimatorState::reset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstimatorState {
    smoothed_pitch: f32,
    silence_frame_count: u32,
    last: EstimationResult,
    /// Last frame rate that could not be tracked; warned about once.
    unsupported_rate: Option<u32>,
}

impl EstimatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn smoothed_pitch(&self) -> f32 {
        self.smoothed_pitch
    }

    pub fn silence_frame_count(&self) -> u32 {
        self.silence_frame_count
    }

    /// The most recent result produced from this state.
    pub fn last_result(&self) -> EstimationResult {
        self.last
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Stateless analyser bound to one configuration and capture sample rate.
#[derive(Debug, Clone)]
pub struct PitchEstimator {
    config: VoiceConfig,
    sample_rate: u32,
    window: PeriodWindow,
}

impl PitchEstimator {
    /// Validate `config` against `sample_rate` and build an estimator.
    ///
    /// # Errors
    /// `Configuration` when the bounds are invalid or the lag window would
    /// be empty at this sample rate.
    pub fn new(config: VoiceConfig, sample_rate: u32) -> Result<Self> {
        config.validate()?;
        let window =
            PeriodWindow::for_rate(sample_rate, config.min_frequency, config.max_frequency)?;
        Ok(Self {
            config,
            sample_rate,
            window,
        })
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn period_window(&self) -> PeriodWindow {
        self.window
    }

    /// Analyse one frame, updating `state` in place.
    ///
    /// Never fails: every frame yields a well-defined result.
    pub fn process_frame(&self, frame: &AudioFrame, state: &mut EstimatorState) -> EstimationResult {
        let cfg = &self.config;
        let volume = (rms(&frame.samples) * cfg.volume_gain).min(1.0);

        if volume < cfg.volume_threshold {
            state.silence_frame_count = state.silence_frame_count.saturating_add(1);
            if state.silence_frame_count > cfg.silence_frames_before_drop {
                state.smoothed_pitch *= cfg.silence_decay;
                if state.smoothed_pitch < cfg.silence_snap_epsilon {
                    state.smoothed_pitch = 0.0;
                }
                state.last = EstimationResult {
                    volume,
                    is_active: false,
                    pitch: state.smoothed_pitch,
                    frequency_hz: 0.0,
                };
            } else {
                state.last.volume = volume;
            }
            return state.last;
        }

        state.silence_frame_count = 0;

        let window = if frame.sample_rate == self.sample_rate {
            self.window
        } else {
            match PeriodWindow::for_rate(frame.sample_rate, cfg.min_frequency, cfg.max_frequency) {
                Ok(w) => w,
                Err(e) => {
                    if state.unsupported_rate != Some(frame.sample_rate) {
                        state.unsupported_rate = Some(frame.sample_rate);
                        warn!(
                            frame_rate = frame.sample_rate,
                            expected_rate = self.sample_rate,
                            "cannot track pitch at this sample rate: {e}"
                        );
                    }
                    return untracked(volume, cfg, state);
                }
            }
        };

        let curve = nsdf::compute(&frame.samples, window);
        match nsdf::pick_peak(&curve, cfg.peak_threshold) {
            Some((tau, score)) if score > cfg.confidence_floor => {
                let frequency = frame.sample_rate as f32 / tau as f32;
                let raw_pitch = frequency_to_pitch(frequency, cfg.min_frequency, cfg.max_frequency);
                let alpha = cfg.pitch_smoothing;
                state.smoothed_pitch =
                    (state.smoothed_pitch * (1.0 - alpha) + raw_pitch * alpha).clamp(0.0, 1.0);
                trace!(tau, score, frequency, raw_pitch, "pitch tracked");
                state.last = EstimationResult {
                    volume,
                    is_active: true,
                    pitch: state.smoothed_pitch,
                    frequency_hz: frequency,
                };
                state.last
            }
            _ => untracked(volume, cfg, state),
        }
    }
}

/// Voiced but aperiodic: keep the pitch, report activity from volume.
fn untracked(volume: f32, cfg: &VoiceConfig, state: &mut EstimatorState) -> EstimationResult {
    state.silence_frame_count = state.silence_frame_count.saturating_add(1);
    state.last = EstimationResult {
        volume,
        is_active: volume > cfg.volume_threshold,
        pitch: state.last.pitch,
        frequency_hz: 0.0,
    };
    state.last
}

/// Root-mean-square of a sample slice; 0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}
