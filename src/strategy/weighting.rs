//! Context-weighted oracle score
//!
//! Blends the oracle's win / place / surprise probabilities with weights that
//! depend on the race context. Long turf races lean on the surprise signal,
//! short dirt sprints on the win signal.

use serde::{Deserialize, Serialize};

use crate::domain::{Runner, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub win: f64,
    pub place: f64,
    pub surprise: f64,
}

const LONG_TURF_MIN_M: u32 = 1700;
const SHORT_DIRT_MAX_M: u32 = 1400;

const LONG_TURF: Weights = Weights { win: 0.55, place: 0.20, surprise: 0.25 };
const SHORT_DIRT: Weights = Weights { win: 0.75, place: 0.15, surprise: 0.10 };
const DEFAULT: Weights = Weights { win: 0.65, place: 0.20, surprise: 0.15 };

/// Weights for a race context
pub fn weights_for(surface: Surface, distance_m: u32) -> Weights {
    match surface {
        Surface::Turf if distance_m >= LONG_TURF_MIN_M => LONG_TURF,
        Surface::Dirt if distance_m < SHORT_DIRT_MAX_M => SHORT_DIRT,
        _ => DEFAULT,
    }
}

/// Weighted oracle score, or `None` when the runner has no win probability
pub fn oracle_score(runner: &Runner) -> Option<f64> {
    let signals = &runner.signals;
    let win = signals.win_prob?;
    let w = weights_for(runner.surface, runner.distance_m);
    Some(
        w.win * win
            + w.place * signals.place_prob.unwrap_or(0.0)
            + w.surprise * signals.surprise_prob.unwrap_or(0.0),
    )
}
