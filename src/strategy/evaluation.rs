//! Outcome evaluation
//!
//! Scores a day's predictions and coupon once the results are known.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::domain::{CouponTag, RaceKey, RaceRisk, Runner, RunnerLabel};

use super::calibrator::CalibratedRace;
use super::composer::Coupon;
use super::race_risk::RaceRiskVerdict;

/// Winner ranked at or below this position counts as a missed surprise
const SURPRISE_MISS_RANK: usize = 7;

/// Winner name per race from a result set
pub fn winners(results: &[Runner]) -> HashMap<RaceKey, String> {
    results
        .iter()
        .filter(|r| r.finish_rank == Some(1))
        .map(|r| (r.race.clone(), r.name.clone()))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskBreakdown {
    pub count: usize,
    pub hit1: f64,
    pub hit3: f64,
}

/// Prediction quality for one date
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub races: usize,
    pub hit_rate_top1: f64,
    pub hit_rate_top3: f64,
    pub hit_rate_top5: f64,
    pub surprise_winners_missed: usize,
    pub banko_picks: usize,
    pub banko_wins: usize,
    pub banko_top3: usize,
    pub economy_coverage: f64,
    pub wide_coverage: f64,
    pub risk_breakdown: BTreeMap<RaceRisk, RiskBreakdown>,
}

impl DailyMetrics {
    /// Evaluate calibrated races against results.
    ///
    /// Races without a known winner are ignored; `None` when no race could be
    /// evaluated.
    pub fn evaluate(
        races: &[CalibratedRace],
        verdicts: &BTreeMap<RaceKey, RaceRiskVerdict>,
        results: &[Runner],
    ) -> Option<Self> {
        let winners = winners(results);
        let mut m = DailyMetrics::default();
        let (mut top1, mut top3, mut top5, mut economy, mut wide) = (0usize, 0usize, 0usize, 0usize, 0usize);
        let mut per_risk: BTreeMap<RaceRisk, (usize, usize, usize)> = BTreeMap::new();

        for race in races {
            let Some(winner) = winners.get(&race.race) else {
                continue;
            };
            let Some(winner_row) = race.runner(winner) else {
                continue;
            };
            m.races += 1;

            let rank = winner_row.rank_in_race;
            top1 += usize::from(rank == 1);
            top3 += usize::from(rank <= 3);
            top5 += usize::from(rank <= 5);
            if rank >= SURPRISE_MISS_RANK {
                m.surprise_winners_missed += 1;
            }
            economy += usize::from(winner_row.has_tag(CouponTag::Economy));
            wide += usize::from(winner_row.has_tag(CouponTag::Wide));

            if let Some(banko) = race.with_label(RunnerLabel::Banko).next() {
                m.banko_picks += 1;
                if banko.name() == winner {
                    m.banko_wins += 1;
                }
                let finish = results
                    .iter()
                    .find(|r| r.race == race.race && r.name == banko.name())
                    .and_then(|r| r.finish_rank);
                if finish.is_some_and(|f| f <= 3) {
                    m.banko_top3 += 1;
                }
            }

            let risk = verdicts
                .get(&race.race)
                .map(|v| v.label)
                .unwrap_or(RaceRisk::Unclassified);
            let entry = per_risk.entry(risk).or_default();
            entry.0 += 1;
            entry.1 += usize::from(rank == 1);
            entry.2 += usize::from(rank <= 3);
        }

        if m.races == 0 {
            return None;
        }
        let n = m.races as f64;
        m.hit_rate_top1 = top1 as f64 / n;
        m.hit_rate_top3 = top3 as f64 / n;
        m.hit_rate_top5 = top5 as f64 / n;
        m.economy_coverage = economy as f64 / n;
        m.wide_coverage = wide as f64 / n;
        m.risk_breakdown = per_risk
            .into_iter()
            .map(|(risk, (count, h1, h3))| {
                (
                    risk,
                    RiskBreakdown {
                        count,
                        hit1: h1 as f64 / count as f64,
                        hit3: h3 as f64 / count as f64,
                    },
                )
            })
            .collect();
        Some(m)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegStatus {
    Pass,
    Fail,
    NoData,
}

impl fmt::Display for LegStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegStatus::Pass => write!(f, "PASS"),
            LegStatus::Fail => write!(f, "FAIL"),
            LegStatus::NoData => write!(f, "NO_DATA"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegCheck {
    pub race: RaceKey,
    pub risk: RaceRisk,
    pub picks: Vec<String>,
    pub winner: Option<String>,
    pub status: LegStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponValidation {
    pub date: NaiveDate,
    pub chaos_index: f64,
    pub total_races: usize,
    pub passed: usize,
    pub failed: usize,
    /// passed / total races
    pub success_rate: f64,
    pub legs: Vec<LegCheck>,
}

/// Check every ticket of a coupon against the results
pub fn validate_coupon(coupon: &Coupon, results: &[Runner]) -> CouponValidation {
    let winners = winners(results);
    let legs: Vec<LegCheck> = coupon
        .selections
        .iter()
        .map(|sel| {
            let winner = winners.get(&sel.race).cloned();
            let status = match &winner {
                None => LegStatus::NoData,
                Some(w) if sel.contains(w) => LegStatus::Pass,
                Some(_) => LegStatus::Fail,
            };
            LegCheck {
                race: sel.race.clone(),
                risk: sel.risk,
                picks: sel.pick_names().map(str::to_string).collect(),
                winner,
                status,
            }
        })
        .collect();

    let passed = legs.iter().filter(|l| l.status == LegStatus::Pass).count();
    let failed = legs.iter().filter(|l| l.status == LegStatus::Fail).count();
    let total_races = legs.len();
    CouponValidation {
        date: coupon.date,
        chaos_index: coupon.chaos_index,
        total_races,
        passed,
        failed,
        success_rate: if total_races == 0 { 0.0 } else { passed as f64 / total_races as f64 },
        legs,
    }
}
