//! Program reconciliation lock
//!
//! Compares scored races against the authoritative program before any coupon
//! is built. The program wins: a runner that is in the program but has no
//! score stops the whole composition; a scored runner that is not in the
//! program (scratched, stale data) is dropped and logged.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

use crate::domain::{RaceKey, Runner};
use crate::error::{GanyanError, Result};

use super::calibrator::CalibratedRace;

/// Authoritative entrant list per race
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceProgram {
    entries: BTreeMap<RaceKey, Vec<String>>,
}

impl RaceProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a program from entries; order inside a race follows input order
    pub fn from_runners(runners: &[Runner]) -> Self {
        let mut program = Self::new();
        for r in runners {
            program.push(r.race.clone(), r.name.clone());
        }
        program
    }

    pub fn push(&mut self, race: RaceKey, name: impl Into<String>) {
        let name = name.into();
        let names = self.entries.entry(race).or_default();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    pub fn insert(&mut self, race: RaceKey, names: Vec<String>) {
        self.entries.insert(race, names);
    }

    pub fn entrants(&self, race: &RaceKey) -> Option<&[String]> {
        self.entries.get(race).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Race keys on `date`, optionally restricted to one venue (case-insensitive)
    pub fn races_on(&self, date: chrono::NaiveDate, venue: Option<&str>) -> Vec<RaceKey> {
        self.entries
            .keys()
            .filter(|k| k.date == date)
            .filter(|k| venue.map_or(true, |v| k.venue.eq_ignore_ascii_case(v)))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscrepancyKind {
    /// In the program, absent from the scores
    Unscored,
    /// Scored, absent from the program
    NotInProgram,
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscrepancyKind::Unscored => write!(f, "UNSCORED"),
            DiscrepancyKind::NotInProgram => write!(f, "NOT_IN_PROGRAM"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub race: RaceKey,
    pub runner: String,
    pub kind: DiscrepancyKind,
}

/// Races restricted to program entrants, in scope order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub races: Vec<CalibratedRace>,
    /// Scored runners that were dropped because the program does not list them
    pub dropped: Vec<Discrepancy>,
}

/// Gate between scoring and coupon composition
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationLock;

impl ReconciliationLock {
    pub fn new() -> Self {
        Self
    }

    /// Reconcile every race in `scope` against the program.
    ///
    /// Fails on the first race that the program lacks or that has program
    /// entrants without a score. On success every returned race holds exactly
    /// the program entrants that were scored, in calibrated order.
    pub fn reconcile(
        &self,
        scope: &[RaceKey],
        scored: &[CalibratedRace],
        program: &RaceProgram,
    ) -> Result<ReconciliationResult> {
        let by_key: BTreeMap<&RaceKey, &CalibratedRace> = scored.iter().map(|r| (&r.race, r)).collect();

        let mut races = Vec::with_capacity(scope.len());
        let mut dropped = Vec::new();

        for key in scope {
            // An empty entrant list is as good as no program for the race
            let entrants = program
                .entrants(key)
                .filter(|names| !names.is_empty())
                .ok_or_else(|| GanyanError::RaceMissingFromProgram { race: key.clone() })?;

            let scored_names: HashSet<&str> = by_key
                .get(key)
                .map(|r| r.runners.iter().map(|c| c.name()).collect())
                .unwrap_or_default();

            let missing: Vec<String> = entrants
                .iter()
                .filter(|name| !scored_names.contains(name.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(GanyanError::DataIncomplete {
                    race: key.clone(),
                    missing,
                });
            }

            let Some(race) = by_key.get(key) else {
                return Err(GanyanError::DataIncomplete {
                    race: key.clone(),
                    missing: entrants.to_vec(),
                });
            };

            let allowed: HashSet<&str> = entrants.iter().map(String::as_str).collect();
            let mut locked = (*race).clone();
            locked.runners.retain(|r| {
                let keep = allowed.contains(r.name());
                if !keep {
                    warn!("Dropping {} from {}: not in the program", r.name(), key);
                    dropped.push(Discrepancy {
                        race: key.clone(),
                        runner: r.name().to_string(),
                        kind: DiscrepancyKind::NotInProgram,
                    });
                }
                keep
            });
            debug!("{}: {} runners locked", key, locked.runners.len());
            races.push(locked);
        }

        Ok(ReconciliationResult { races, dropped })
    }
}
