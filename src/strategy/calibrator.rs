//! Score calibrator
//!
//! Normalizes raw scores inside each race into percentiles, measures the gaps
//! at the top of the field, tags coupon eligibility and assigns a categorical
//! label per runner.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::CalibrationConfig;
use crate::domain::{CouponTag, RaceKey, RunnerLabel};

use super::decision::{round_to, ScoredRunner};

/// One runner after race-relative calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedRunner {
    pub scored: ScoredRunner,
    /// (score - min) / range, rounded to 3 decimals
    pub percentile: f64,
    /// 1-based, by percentile descending
    pub rank_in_race: usize,
    /// Percentile distance to the next-ranked runner (0 for the last)
    pub gap_to_next: f64,
    /// Race-level top1 - top2 percentile gap
    pub race_gap: f64,
    /// Race-level top1 - top3 percentile gap
    pub race_gap_top3: f64,
    pub label: RunnerLabel,
    pub tags: Vec<CouponTag>,
}

impl CalibratedRunner {
    pub fn name(&self) -> &str {
        &self.scored.runner.name
    }

    pub fn has_tag(&self, tag: CouponTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// All runners of one race after calibration, ordered by `rank_in_race`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedRace {
    pub race: RaceKey,
    pub runners: Vec<CalibratedRunner>,
    pub gap: f64,
    pub gap_top1_top3: f64,
    pub gap_threshold: f64,
    /// Crowded field with no clear leader
    pub risk_heuristic: bool,
}

impl CalibratedRace {
    pub fn field_size(&self) -> usize {
        self.runners.len()
    }

    pub fn top(&self) -> Option<&CalibratedRunner> {
        self.runners.first()
    }

    pub fn runner(&self, name: &str) -> Option<&CalibratedRunner> {
        self.runners.iter().find(|r| r.name() == name)
    }

    pub fn with_label(&self, label: RunnerLabel) -> impl Iterator<Item = &CalibratedRunner> {
        self.runners.iter().filter(move |r| r.label == label)
    }
}

/// Inputs visible to a label rule
struct LabelInputs {
    percentile: f64,
    gap: f64,
    gap_top1_top3: f64,
    gap_threshold: f64,
    surprise_score: f64,
}

type LabelRule = fn(&LabelInputs, &CalibrationConfig) -> Option<RunnerLabel>;

/// Evaluated in order; every matching rule overwrites the label, so later rules
/// take precedence over earlier ones.
const LABEL_RULES: &[LabelRule] = &[
    |x, c| (x.percentile >= c.strong_favorite_percentile).then_some(RunnerLabel::StrongFavorite),
    |x, c| {
        (x.percentile >= c.banko_percentile
            && x.gap >= x.gap_threshold
            && x.gap_top1_top3 >= c.banko_top3_gap)
            .then_some(RunnerLabel::Banko)
    },
    |x, c| {
        (x.percentile >= c.surprise_band_low
            && x.percentile <= c.surprise_band_high
            && x.surprise_score > c.surprise_index_min)
            .then_some(RunnerLabel::SurpriseCandidate)
    },
];

#[derive(Debug, Clone, Default)]
pub struct ScoreCalibrator {
    config: CalibrationConfig,
}

impl ScoreCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Group raw scores by race and calibrate each group independently.
    pub fn calibrate(&self, scored: &[ScoredRunner]) -> Vec<CalibratedRace> {
        let mut grouped: BTreeMap<RaceKey, Vec<ScoredRunner>> = BTreeMap::new();
        for s in scored {
            grouped.entry(s.runner.race.clone()).or_default().push(s.clone());
        }
        grouped
            .into_iter()
            .map(|(race, runners)| self.calibrate_race(race, runners))
            .collect()
    }

    /// Calibrate one race. Pure and order-stable: ties keep input order.
    pub fn calibrate_race(&self, race: RaceKey, runners: Vec<ScoredRunner>) -> CalibratedRace {
        let cfg = &self.config;
        let n = runners.len();

        let min = runners.iter().map(|r| r.base_score).fold(f64::INFINITY, f64::min);
        let max = runners.iter().map(|r| r.base_score).fold(f64::NEG_INFINITY, f64::max);
        // Degenerate field: every percentile collapses to 0
        let range = if max > min { max - min } else { 1.0 };

        let mut ranked: Vec<(f64, ScoredRunner)> = runners
            .into_iter()
            .map(|r| (round_to((r.base_score - min) / range, 3), r))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

        let pct_at = |i: usize| ranked.get(i).map(|(p, _)| *p);
        let gap = match (pct_at(0), pct_at(1)) {
            (Some(p1), Some(p2)) => round_to(p1 - p2, 3),
            _ => 0.0,
        };
        let gap_top1_top3 = match (pct_at(0), pct_at(2)) {
            (Some(p1), Some(p3)) => round_to(p1 - p3, 3),
            _ => 0.0,
        };
        let gap_threshold = if n > 0 {
            cfg.gap_threshold_base + cfg.gap_threshold_scale / n as f64
        } else {
            0.0
        };
        let risk_heuristic = n >= cfg.crowded_field && gap < cfg.crowded_gap;

        let (economy_cut, wide_cut) = if risk_heuristic {
            (cfg.economy_cut_risky, cfg.wide_cut_risky)
        } else {
            (cfg.economy_cut, cfg.wide_cut)
        };

        let next_pcts: Vec<Option<f64>> = (0..n).map(|i| pct_at(i + 1)).collect();
        let calibrated = ranked
            .into_iter()
            .zip(next_pcts)
            .enumerate()
            .map(|(i, ((percentile, scored), next))| {
                let rank_in_race = i + 1;

                let mut tags = Vec::new();
                if rank_in_race <= economy_cut {
                    tags.push(CouponTag::Economy);
                }
                if rank_in_race <= wide_cut {
                    tags.push(CouponTag::Wide);
                }

                let inputs = LabelInputs {
                    percentile,
                    gap,
                    gap_top1_top3,
                    gap_threshold,
                    surprise_score: scored.surprise_score,
                };
                let label = LABEL_RULES
                    .iter()
                    .fold(RunnerLabel::Place, |label, rule| rule(&inputs, cfg).unwrap_or(label));

                CalibratedRunner {
                    percentile,
                    rank_in_race,
                    gap_to_next: next.map(|p| round_to(percentile - p, 3)).unwrap_or(0.0),
                    race_gap: gap,
                    race_gap_top3: gap_top1_top3,
                    label,
                    tags,
                    scored,
                }
            })
            .collect();

        CalibratedRace {
            race,
            runners: calibrated,
            gap,
            gap_top1_top3,
            gap_threshold,
            risk_heuristic,
        }
    }
}
