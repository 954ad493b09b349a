//! Decision engine
//!
//! Turns today's program plus the current profile store into raw heuristic
//! scores. Pure: reads profiles, never mutates them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ScoringConfig;
use crate::domain::{RaceKey, RiskTag, Runner};
use crate::profile::{Profile, ProfileEvidence, ProfileStore};

/// Raw score for one runner in today's program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRunner {
    pub runner: Runner,
    pub base_score: f64,
    /// Profile surprise index, reported but not part of `base_score`
    pub surprise_score: f64,
    pub risk: RiskTag,
    /// "wins/starts"
    pub stats: String,
    pub evidence: ProfileEvidence,
}

impl ScoredRunner {
    pub fn name(&self) -> &str {
        &self.runner.name
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    config: ScoringConfig,
}

impl DecisionEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score every runner of a program.
    ///
    /// Output is grouped by race (race key order) and sorted by `base_score`
    /// descending within each race; the calibrator recomputes rank itself.
    pub fn score(&self, program: &[Runner], store: &ProfileStore) -> Vec<ScoredRunner> {
        let mut by_race: BTreeMap<&RaceKey, Vec<ScoredRunner>> = BTreeMap::new();
        for entry in program {
            by_race
                .entry(&entry.race)
                .or_default()
                .push(self.score_runner(entry, store.get(&entry.name)));
        }

        by_race
            .into_values()
            .flat_map(|mut runners| {
                runners.sort_by(|a, b| b.base_score.total_cmp(&a.base_score));
                runners
            })
            .collect()
    }

    /// Score one runner against its (possibly absent) profile
    pub fn score_runner(&self, entry: &Runner, profile: Option<&Profile>) -> ScoredRunner {
        let cfg = &self.config;

        let profile = match profile {
            Some(p) if p.starts > 0 => p,
            other => {
                return ScoredRunner {
                    runner: entry.clone(),
                    base_score: cfg.cold_start_score,
                    surprise_score: 0.0,
                    risk: RiskTag::Unknown,
                    stats: other.map(Profile::stat_line).unwrap_or_else(|| "0/0".to_string()),
                    evidence: ProfileEvidence::default(),
                };
            }
        };

        let mut score = profile.win_rate() * cfg.win_rate_weight
            + profile.place_rate() * cfg.place_rate_weight
            + profile.surface(entry.surface).win_rate() * cfg.surface_weight
            + profile.distance(entry.distance_bucket()).win_rate() * cfg.distance_weight;

        for (i, &rank) in profile.recent_ranks.iter().enumerate() {
            let weight = 1.0 - i as f64 * cfg.form_decay;
            score += match rank {
                1 => cfg.form_win_points * weight,
                2 => cfg.form_second_points * weight,
                r if r <= 4 => cfg.form_place_points * weight,
                _ => 0.0,
            };
        }

        let risk = if profile.win_rate() > cfg.low_risk_win_rate
            && profile.recent_ranks.len() >= cfg.low_risk_min_form
        {
            RiskTag::Low
        } else if profile.place_rate() > cfg.med_risk_place_rate {
            RiskTag::Med
        } else {
            RiskTag::High
        };

        ScoredRunner {
            runner: entry.clone(),
            base_score: round_to(score, 1),
            surprise_score: round_to(profile.surprise_index, 1),
            risk,
            stats: profile.stat_line(),
            evidence: profile.evidence_for(entry),
        }
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Surface;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, d).unwrap()
    }

    fn entry(name: &str, race_no: u32, d: u32) -> Runner {
        Runner::new(name, RaceKey::new("Ankara", day(d), race_no), Surface::Dirt, 1400)
    }

    #[test]
    fn test_cold_start_gets_flat_credit() {
        let engine = DecisionEngine::default();
        let scored = engine.score_runner(&entry("Yeni", 1, 10).with_agf(50.0), None);
        assert_eq!(scored.base_score, 15.0);
        assert_eq!(scored.risk, RiskTag::Unknown);
        assert_eq!(scored.stats, "0/0");
        assert_eq!(scored.surprise_score, 0.0);
    }

    #[test]
    fn test_zero_start_profile_is_cold_start() {
        let engine = DecisionEngine::default();
        let profile = Profile::new("Yeni");
        let scored = engine.score_runner(&entry("Yeni", 1, 10), Some(&profile));
        assert_eq!(scored.base_score, 15.0);
        assert_eq!(scored.risk, RiskTag::Unknown);
    }

    #[test]
    fn test_score_formula_single_win() {
        let mut store = ProfileStore::new();
        store.ingest(&entry("Poyraz", 1, 1).with_rank(1));

        let engine = DecisionEngine::default();
        let scored = engine.score_runner(&entry("Poyraz", 2, 10), store.get("Poyraz"));
        // 100*1.5 + 100*0.5 + 100*0.5 + 100*0.3 + 15*1.0
        assert_eq!(scored.base_score, 295.0);
        assert_eq!(scored.risk, RiskTag::Med, "only one form entry, so not LOW");
        assert_eq!(scored.stats, "1/1");
    }

    #[test]
    fn test_form_bonus_weights_decay() {
        let mut store = ProfileStore::new();
        // oldest first: 7th, 3rd, 2nd
        store.ingest(&entry("Lodos", 1, 1).with_rank(7));
        store.ingest(&entry("Lodos", 1, 2).with_rank(3));
        store.ingest(&entry("Lodos", 1, 3).with_rank(2));

        let engine = DecisionEngine::default();
        let scored = engine.score_runner(&entry("Lodos", 1, 10), store.get("Lodos"));
        // rates: win 0, place 2/3 -> 33.33; form: 10*1.0 + 5*0.9 + 0
        let expected = round_to(200.0 / 3.0 * 0.5 + 10.0 + 4.5, 1);
        assert_eq!(scored.base_score, expected);
        assert_eq!(scored.risk, RiskTag::Med);
    }

    #[test]
    fn test_low_risk_requires_form_depth() {
        let mut store = ProfileStore::new();
        for d in 1..=3 {
            store.ingest(&entry("Poyraz", 1, d).with_rank(1));
        }
        let engine = DecisionEngine::default();
        let scored = engine.score_runner(&entry("Poyraz", 1, 10), store.get("Poyraz"));
        assert_eq!(scored.risk, RiskTag::Low);
    }

    #[test]
    fn test_score_groups_and_sorts_by_race() {
        let mut store = ProfileStore::new();
        store.ingest(&entry("Poyraz", 1, 1).with_rank(1));

        let program = vec![
            entry("Yeni", 2, 10),
            entry("Karayel", 1, 10),
            entry("Poyraz", 1, 10),
        ];
        let scored = DecisionEngine::default().score(&program, &store);
        let names: Vec<&str> = scored.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Poyraz", "Karayel", "Yeni"]);
    }
}
