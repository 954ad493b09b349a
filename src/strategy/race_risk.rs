//! Race risk classification
//!
//! Classifies how open a race is from a vector of per-runner win
//! probabilities. The vector does not need to sum to 1 (independent binary
//! classifiers rarely do); it is normalized before the entropy is taken.

use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::domain::{RaceRisk, RunnerLabel};

use super::calibrator::CalibratedRace;

/// Race-level uncertainty verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaceRiskVerdict {
    /// Shannon entropy (nats) of the normalized vector; `None` when the race
    /// had no probability vector and was labelled from calibration instead
    pub entropy: Option<f64>,
    /// Raw top1 - top2 probability gap
    pub gap: f64,
    pub label: RaceRisk,
}

/// Shannon entropy of a probability vector after normalization.
///
/// Zero-sum vectors yield 0; zero entries are skipped.
pub fn shannon_entropy(probs: &[f64]) -> f64 {
    let total: f64 = probs.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    -probs
        .iter()
        .map(|p| p / total)
        .filter(|&p| p > 0.0)
        .map(|p| p * p.ln())
        .sum::<f64>()
}

#[derive(Debug, Clone, Default)]
pub struct RaceRiskClassifier {
    config: RiskConfig,
}

impl RaceRiskClassifier {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Classify one race from its win-probability vector
    pub fn classify(&self, win_probs: &[f64]) -> RaceRiskVerdict {
        let cfg = &self.config;
        let entropy = shannon_entropy(win_probs);

        let mut sorted = win_probs.to_vec();
        sorted.sort_by(|a, b| b.total_cmp(a));
        let gap = match sorted.as_slice() {
            [] => 0.0,
            [_] => 1.0,
            [first, second, ..] => first - second,
        };

        let label = if entropy < cfg.entropy_low && gap > cfg.gap_high {
            RaceRisk::Banko
        } else if entropy > cfg.entropy_high && gap < cfg.gap_low {
            RaceRisk::Risky
        } else if entropy > cfg.entropy_high {
            RaceRisk::SurpriseOpen
        } else {
            RaceRisk::Normal
        };

        RaceRiskVerdict {
            entropy: Some(entropy),
            gap,
            label,
        }
    }

    /// Verdict for a calibrated race.
    ///
    /// Uses the oracle win probabilities when every runner has one; otherwise
    /// falls back to the calibration outcome (BANKO label present, crowded
    /// field heuristic, else NORMAL) with no entropy.
    pub fn assess(&self, race: &CalibratedRace) -> RaceRiskVerdict {
        let probs: Option<Vec<f64>> = race
            .runners
            .iter()
            .map(|r| r.scored.runner.signals.win_prob)
            .collect();

        match probs {
            Some(p) if !p.is_empty() => self.classify(&p),
            _ => {
                let label = if race.with_label(RunnerLabel::Banko).next().is_some() {
                    RaceRisk::Banko
                } else if race.risk_heuristic {
                    RaceRisk::Risky
                } else {
                    RaceRisk::Normal
                };
                RaceRiskVerdict {
                    entropy: None,
                    gap: race.gap,
                    label,
                }
            }
        }
    }
}
