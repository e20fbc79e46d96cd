//! Normalised square difference function over a bounded lag window, plus
//! the peak picker that chooses a fundamental period from it.
//!
//! For each lag τ over the overlapping window `0..len-τ`:
//!
//! ```text
//! nsdf(τ) = 2·Σ x[i]·x[i+τ] / (Σ x[i]² + Σ x[i+τ]²)
//! ```
//!
//! The score lies in [-1, 1] and peaks near 1 at multiples of the period.

use crate::error::{Result, VoxgateError};

/// Inclusive range of candidate periods (in samples) for one sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub min_period: usize,
    pub max_period: usize,
}

impl PeriodWindow {
    /// `min_period = ⌊rate / max_freq⌋`, `max_period = ⌊rate / min_freq⌋`.
    ///
    /// # Errors
    /// `Configuration` when the window would be empty or start at lag 0.
    pub fn for_rate(sample_rate: u32, min_freq: f32, max_freq: f32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(VoxgateError::config("sample rate must be positive"));
        }
        if !(min_freq > 0.0 && max_freq > min_freq) {
            return Err(VoxgateError::config(format!(
                "invalid frequency bounds [{min_freq}, {max_freq}] Hz"
            )));
        }
        let rate = sample_rate as f64;
        let min_period = (rate / f64::from(max_freq)).floor() as usize;
        let max_period = (rate / f64::from(min_freq)).floor() as usize;
        if min_period < 1 || max_period < min_period {
            return Err(VoxgateError::config(format!(
                "period window [{min_period}, {max_period}] is empty at {sample_rate} Hz \
                 for [{min_freq}, {max_freq}] Hz"
            )));
        }
        Ok(Self {
            min_period,
            max_period,
        })
    }
}

/// NSDF scores for every lag in a [`PeriodWindow`].
#[derive(Debug, Clone)]
pub struct NsdfCurve {
    window: PeriodWindow,
    scores: Vec<f32>,
}

impl NsdfCurve {
    /// Score at lag `tau`; 0 outside the window.
    pub fn at(&self, tau: usize) -> f32 {
        if tau < self.window.min_period || tau > self.window.max_period {
            return 0.0;
        }
        self.scores[tau - self.window.min_period]
    }

    pub fn window(&self) -> PeriodWindow {
        self.window
    }

    /// `(tau, score)` pairs in ascending lag order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.scores
            .iter()
            .enumerate()
            .map(move |(i, s)| (self.window.min_period + i, *s))
    }
}

/// Compute the NSDF of `samples` for every lag in `window`.
///
/// Lags at or beyond the frame length have no overlap and score 0, as do
/// lags whose overlap carries no energy.
pub fn compute(samples: &[f32], window: PeriodWindow) -> NsdfCurve {
    let len = samples.len();
    let scores = (window.min_period..=window.max_period)
        .map(|tau| {
            let overlap = len.saturating_sub(tau);
            let mut acf = 0.0f32;
            let mut m1 = 0.0f32;
            let mut m2 = 0.0f32;
            for i in 0..overlap {
                let a = samples[i];
                let b = samples[i + tau];
                acf += a * b;
                m1 += a * a;
                m2 += b * b;
            }
            let energy = m1 + m2;
            if energy > 0.0 {
                2.0 * acf / energy
            } else {
                0.0
            }
        })
        .collect();
    NsdfCurve { window, scores }
}

/// Choose a fundamental period from `curve`.
///
/// Scans ascending lags and returns the first strict local maximum scoring
/// above `threshold`, which biases towards the shortest strong period and
/// away from octave-down errors. When no such peak exists the single best
/// lag is returned, provided it scores above `threshold / 2`.
pub fn pick_peak(curve: &NsdfCurve, threshold: f32) -> Option<(usize, f32)> {
    let PeriodWindow {
        min_period,
        max_period,
    } = curve.window;

    for tau in (min_period + 1)..max_period {
        let score = curve.at(tau);
        if score > threshold && score > curve.at(tau - 1) && score > curve.at(tau + 1) {
            return Some((tau, score));
        }
    }

    let mut best: Option<(usize, f32)> = None;
    let mut best_score = 0.0f32;
    for (tau, score) in curve.iter() {
        if score > best_score && score > threshold * 0.5 {
            best_score = score;
            best = Some((tau, score));
        }
    }
    best
}
