//! Six-leg sequence coupons
//!
//! Builds economy and wide variants of a six-race pick for one venue-date from
//! calibrated races, after every leg has passed the reconciliation lock.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::domain::{CouponTag, RaceKey, RunnerLabel};
use crate::error::{GanyanError, Result};

use super::calibrator::CalibratedRace;
use super::reconciliation::{RaceProgram, ReconciliationLock};

pub const LEGS: usize = 6;

/// Picks for one leg of a sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceLeg {
    /// 1-based position in the sequence
    pub leg: usize,
    pub race_no: u32,
    pub economy: Vec<String>,
    pub wide: Vec<String>,
    pub banko: bool,
    pub risky: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceCoupon {
    pub name: String,
    pub venue: String,
    pub date: NaiveDate,
    pub race_numbers: Vec<u32>,
    pub legs: Vec<SequenceLeg>,
    /// Leg number (1-based) collapsed to a single banko runner
    pub banko_leg: Option<usize>,
    pub risky_legs: Vec<usize>,
}

impl SequenceCoupon {
    pub fn economy_combinations(&self) -> u64 {
        self.legs.iter().map(|l| l.economy.len() as u64).product()
    }

    pub fn wide_combinations(&self) -> u64 {
        self.legs.iter().map(|l| l.wide.len() as u64).product()
    }
}

/// Candidate race-number windows for a venue-date, in preference order.
///
/// Races 1-6 and 4-9 when complete; otherwise the last six consecutive
/// numbers ending at the highest race, if all are present.
pub fn detect_sequences(race_numbers: &[u32]) -> Vec<(String, Vec<u32>)> {
    let has_all = |window: &[u32]| window.iter().all(|n| race_numbers.contains(n));
    let mut found = Vec::new();

    let first: Vec<u32> = (1..=6).collect();
    if has_all(&first) {
        found.push(("1st six-leg".to_string(), first));
    }
    let second: Vec<u32> = (4..=9).collect();
    if has_all(&second) {
        found.push(("2nd six-leg".to_string(), second));
    }

    if found.is_empty() && race_numbers.len() >= LEGS {
        if let Some(&last) = race_numbers.iter().max() {
            if last >= LEGS as u32 {
                let tail: Vec<u32> = (last + 1 - LEGS as u32..=last).collect();
                if has_all(&tail) {
                    found.push(("six-leg".to_string(), tail));
                }
            }
        }
    }
    found
}

#[derive(Debug, Clone, Default)]
pub struct SequenceBuilder {
    lock: ReconciliationLock,
}

impl SequenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every available sequence for `venue` on `date`.
    ///
    /// All races of every detected sequence are reconciled before any leg is
    /// built; one failing race aborts the request.
    pub fn build(
        &self,
        venue: &str,
        date: NaiveDate,
        races: &[CalibratedRace],
        program: &RaceProgram,
    ) -> Result<Vec<SequenceCoupon>> {
        let venue_races: BTreeMap<u32, &CalibratedRace> = races
            .iter()
            .filter(|r| r.race.date == date && r.race.venue.eq_ignore_ascii_case(venue))
            .map(|r| (r.race.race_no, r))
            .collect();
        let available: Vec<u32> = venue_races.keys().copied().collect();

        let windows = detect_sequences(&available);
        if windows.is_empty() {
            return Err(GanyanError::NoSequence {
                venue: venue.to_string(),
                date,
                available,
            });
        }

        let scope: Vec<RaceKey> = windows
            .iter()
            .flat_map(|(_, numbers)| numbers.iter())
            .filter_map(|n| venue_races.get(n).map(|r| r.race.clone()))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        let locked = self.lock.reconcile(&scope, races, program)?;
        let locked: BTreeMap<u32, &CalibratedRace> =
            locked.races.iter().map(|r| (r.race.race_no, r)).collect();

        let mut coupons = Vec::with_capacity(windows.len());
        for (name, numbers) in windows {
            let legs_races: Vec<&CalibratedRace> = numbers.iter().filter_map(|n| locked.get(n).copied()).collect();
            if legs_races.len() != LEGS {
                warn!("{} at {} on {}: only {} legs locked", name, venue, date, legs_races.len());
                continue;
            }
            let coupon = build_coupon(name, venue, date, numbers, &legs_races);
            info!(
                "{} at {} on {}: economy {} combinations, wide {}",
                coupon.name,
                venue,
                date,
                coupon.economy_combinations(),
                coupon.wide_combinations()
            );
            coupons.push(coupon);
        }
        Ok(coupons)
    }
}

fn build_coupon(
    name: String,
    venue: &str,
    date: NaiveDate,
    race_numbers: Vec<u32>,
    races: &[&CalibratedRace],
) -> SequenceCoupon {
    // Banko leg: the BANKO-labelled favorite with the widest race gap
    let banko = races
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            r.top()
                .filter(|top| top.label == RunnerLabel::Banko)
                .map(|top| (i, r.gap, top.name().to_string()))
        })
        .fold(None::<(usize, f64, String)>, |best, cand| {
            if best.as_ref().is_some_and(|b| b.1 >= cand.1) {
                best
            } else {
                Some(cand)
            }
        });

    let mut risky_legs = Vec::new();
    let legs = races
        .iter()
        .enumerate()
        .map(|(i, race)| {
            let leg = i + 1;
            if race.risk_heuristic {
                risky_legs.push(leg);
            }

            if let Some((banko_idx, _, banko_name)) = &banko {
                if *banko_idx == i {
                    return SequenceLeg {
                        leg,
                        race_no: race.race.race_no,
                        economy: vec![banko_name.clone()],
                        wide: vec![banko_name.clone()],
                        banko: true,
                        risky: race.risk_heuristic,
                    };
                }
            }

            let economy: Vec<String> = race
                .runners
                .iter()
                .filter(|r| r.has_tag(CouponTag::Economy))
                .map(|r| r.name().to_string())
                .collect();

            let mut wide: Vec<String> = race
                .runners
                .iter()
                .filter(|r| r.has_tag(CouponTag::Wide))
                .map(|r| r.name().to_string())
                .collect();
            let cap = wide.len() + 2;
            for surprise in race.with_label(RunnerLabel::SurpriseCandidate) {
                if wide.len() >= cap {
                    break;
                }
                if !wide.iter().any(|w| w == surprise.name()) {
                    wide.push(surprise.name().to_string());
                }
            }

            SequenceLeg {
                leg,
                race_no: race.race.race_no,
                economy,
                wide,
                banko: false,
                risky: race.risk_heuristic,
            }
        })
        .collect();

    SequenceCoupon {
        name,
        venue: venue.to_string(),
        date,
        race_numbers,
        legs,
        banko_leg: banko.map(|(i, _, _)| i + 1),
        risky_legs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_standard_windows() {
        let all: Vec<u32> = (1..=9).collect();
        let found = detect_sequences(&all);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].1, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(found[1].1, vec![4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_detect_tail_window() {
        let found = detect_sequences(&[3, 4, 5, 6, 7, 8]);
        assert_eq!(found, vec![("six-leg".to_string(), vec![3, 4, 5, 6, 7, 8])]);
    }

    #[test]
    fn test_detect_nothing_for_short_cards() {
        assert!(detect_sequences(&[1, 2, 3, 4, 5]).is_empty());
        assert!(detect_sequences(&[1, 2, 3, 5, 6, 7]).is_empty());
        assert!(detect_sequences(&[]).is_empty());
    }
}
