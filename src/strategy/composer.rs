//! Ticket composer
//!
//! Picks concrete runners per race under a strategy chosen by the race risk
//! label, attaches rationale, and aggregates races into a daily coupon.
//! Stateless across races: every selection depends only on its own race.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::config::ComposerConfig;
use crate::domain::{RaceKey, RaceRisk, RunnerLabel};
use crate::error::{GanyanError, Result};

use super::calibrator::{CalibratedRace, CalibratedRunner};
use super::race_risk::RaceRiskVerdict;
use super::rationale::generate_rationale;
use super::reconciliation::{RaceProgram, ReconciliationLock};
use super::weighting::oracle_score;

/// One chosen runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub name: String,
    pub jockey: Option<String>,
    pub score: f64,
    pub label: RunnerLabel,
    pub rationale: Vec<String>,
}

/// Picks for one race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketSelection {
    pub race: RaceKey,
    pub risk: RaceRisk,
    pub entropy: Option<f64>,
    pub strategy: String,
    pub picks: Vec<Pick>,
}

impl TicketSelection {
    pub fn pick_names(&self) -> impl Iterator<Item = &str> {
        self.picks.iter().map(|p| p.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.picks.iter().any(|p| p.name == name)
    }
}

/// All ticket selections for one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub date: NaiveDate,
    pub selections: Vec<TicketSelection>,
    /// Share of races labelled RISKY or SURPRISE_OPEN
    pub chaos_index: f64,
}

impl Coupon {
    pub fn new(date: NaiveDate, selections: Vec<TicketSelection>) -> Self {
        let chaotic = selections.iter().filter(|s| s.risk.is_chaotic()).count();
        let chaos_index = if selections.is_empty() {
            0.0
        } else {
            chaotic as f64 / selections.len() as f64
        };
        Self {
            date,
            selections,
            chaos_index,
        }
    }

    pub fn chaotic_races(&self) -> usize {
        self.selections.iter().filter(|s| s.risk.is_chaotic()).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Chaos level: {:.1}% ({}/{} races risky)",
            self.chaos_index * 100.0,
            self.chaotic_races(),
            self.selections.len()
        )
    }
}

/// Runner paired with the score the composer ranks by
#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    runner: &'a CalibratedRunner,
    score: f64,
}

impl<'a> Candidate<'a> {
    fn new(runner: &'a CalibratedRunner) -> Self {
        let score = oracle_score(&runner.scored.runner).unwrap_or(runner.percentile);
        Self { runner, score }
    }

    fn name(&self) -> &'a str {
        self.runner.name()
    }

    fn track_specialization(&self) -> Option<f64> {
        self.runner
            .scored
            .runner
            .signals
            .track_specialization
            .or(self.runner.scored.evidence.track_specialization)
    }

    fn distance_specialization(&self) -> Option<f64> {
        self.runner
            .scored
            .runner
            .signals
            .distance_specialization
            .or(self.runner.scored.evidence.distance_specialization)
    }
}

type SurpriseRule = fn(&Candidate<'_>, &ComposerConfig) -> bool;

/// One point per satisfied rule
const PSEUDO_SURPRISE_RULES: &[SurpriseRule] = &[
    |c, cfg| c.runner.scored.runner.agf.map_or(true, |agf| agf <= cfg.pseudo_agf_max),
    |c, cfg| {
        let min = cfg.pseudo_specialization_min;
        c.track_specialization().is_some_and(|r| r > min)
            || c.distance_specialization().is_some_and(|r| r > min)
    },
    |c, cfg| c.score > cfg.pseudo_score_min,
];

#[derive(Debug, Clone, Default)]
pub struct TicketComposer {
    config: ComposerConfig,
    lock: ReconciliationLock,
}

impl TicketComposer {
    pub fn new(config: ComposerConfig) -> Self {
        Self {
            config,
            lock: ReconciliationLock::new(),
        }
    }

    /// Compose the selection for one race under `risk`
    pub fn compose(&self, race: &CalibratedRace, risk: RaceRisk, entropy: Option<f64>) -> TicketSelection {
        let ranked = ranked_candidates(race);
        let (strategy, chosen) = match ranked.first() {
            None => ("NO RUNNERS".to_string(), Vec::new()),
            Some(&favorite) => match risk {
                RaceRisk::Banko => ("BANKO (single confident pick)".to_string(), vec![favorite]),
                RaceRisk::Normal => (
                    "NORMAL (top two by score)".to_string(),
                    ranked.iter().take(2).copied().collect(),
                ),
                RaceRisk::SurpriseOpen => self.surprise_open(&ranked, favorite),
                RaceRisk::Risky => self.risky(&ranked),
                RaceRisk::Unclassified => ("DEFAULT (top pick)".to_string(), vec![favorite]),
            },
        };

        let mut picks: Vec<Pick> = Vec::with_capacity(chosen.len());
        for c in chosen {
            if picks.iter().any(|p| p.name == c.name()) {
                continue;
            }
            let entry = &c.runner.scored.runner;
            picks.push(Pick {
                name: entry.name.clone(),
                jockey: entry.jockey.clone(),
                score: c.score,
                label: c.runner.label,
                rationale: generate_rationale(c.runner, c.score, self.config.max_rationale),
            });
        }

        debug!("{} [{}] {}: {} picks", race.race, risk, strategy, picks.len());
        TicketSelection {
            race: race.race.clone(),
            risk,
            entropy,
            strategy,
            picks,
        }
    }

    fn surprise_open<'a>(
        &self,
        ranked: &[Candidate<'a>],
        favorite: Candidate<'a>,
    ) -> (String, Vec<Candidate<'a>>) {
        let others: Vec<Candidate<'a>> = ranked
            .iter()
            .filter(|c| c.name() != favorite.name())
            .copied()
            .collect();

        // Top surprise runner over the whole field; when that is the favorite
        // itself the pseudo-surprise heuristic supplies the second pick
        let model_pick = ranked
            .iter()
            .filter_map(|c| c.runner.scored.runner.signals.surprise_prob.map(|p| (p, *c)))
            .fold(None::<(f64, Candidate<'a>)>, |best, (p, c)| {
                if best.is_some_and(|(bp, _)| bp >= p) {
                    best
                } else {
                    Some((p, c))
                }
            })
            .map(|(_, c)| c)
            .filter(|c| c.name() != favorite.name());
        let (source, surprise) = match model_pick {
            Some(pick) => ("surprise model", Some(pick)),
            None => ("pseudo-surprise", self.pseudo_surprise(&others)),
        };

        match surprise.or_else(|| others.first().copied()) {
            Some(s) if surprise.is_some() => (
                format!("SURPRISE_OPEN (favorite + {source} pick)"),
                vec![favorite, s],
            ),
            Some(backup) => (
                "SURPRISE_OPEN (favorite + next best)".to_string(),
                vec![favorite, backup],
            ),
            None => ("SURPRISE_OPEN (single runner)".to_string(), vec![favorite]),
        }
    }

    fn risky<'a>(&self, ranked: &[Candidate<'a>]) -> (String, Vec<Candidate<'a>>) {
        let place_probs: Option<Vec<f64>> = ranked
            .iter()
            .map(|c| c.runner.scored.runner.signals.place_prob)
            .collect();

        let mut defensive: Vec<Candidate<'a>> = ranked.to_vec();
        let basis = match place_probs {
            Some(probs) => {
                let mut paired: Vec<(f64, Candidate<'a>)> = probs.into_iter().zip(defensive).collect();
                paired.sort_by(|a, b| b.0.total_cmp(&a.0));
                defensive = paired.into_iter().map(|(_, c)| c).collect();
                "place probability"
            }
            None => "score",
        };

        let mut chosen: Vec<Candidate<'a>> = defensive.into_iter().take(2).collect();
        let remaining = |chosen: &[Candidate<'a>]| -> Vec<Candidate<'a>> {
            ranked
                .iter()
                .filter(|c| !chosen.iter().any(|p| p.name() == c.name()))
                .copied()
                .collect()
        };

        if let Some(&third) = remaining(&chosen).first() {
            chosen.push(third);
        }
        let rest = remaining(&chosen);
        if let Some(fourth) = self.pseudo_surprise(&rest).or_else(|| rest.first().copied()) {
            chosen.push(fourth);
        }

        (format!("RISKY (defensive top two by {basis} + depth)"), chosen)
    }

    /// Best qualifying pseudo-surprise among `candidates` (already ranked by
    /// score), falling back to the best candidate overall.
    fn pseudo_surprise<'a>(&self, candidates: &[Candidate<'a>]) -> Option<Candidate<'a>> {
        candidates
            .iter()
            .find(|c| pseudo_surprise_points(c, &self.config) >= self.config.pseudo_min_points)
            .or_else(|| candidates.first())
            .copied()
    }

    /// Compose a full-day coupon.
    ///
    /// Every race on `date` (scored or in the program) passes the
    /// reconciliation lock first; any failure aborts the whole coupon with no
    /// partial output. Races without a verdict are composed as unclassified.
    pub fn compose_coupon(
        &self,
        date: NaiveDate,
        venue: Option<&str>,
        races: &[CalibratedRace],
        verdicts: &BTreeMap<RaceKey, RaceRiskVerdict>,
        program: &RaceProgram,
    ) -> Result<Coupon> {
        let program_races = program.races_on(date, venue);
        if program_races.is_empty() {
            return Err(GanyanError::NoProgram {
                date,
                venue: venue.map(str::to_string),
            });
        }

        // A scored race the program lacks must fail the lock, not vanish
        let scope: Vec<RaceKey> = races
            .iter()
            .map(|r| &r.race)
            .filter(|k| k.date == date && venue.map_or(true, |v| k.venue.eq_ignore_ascii_case(v)))
            .cloned()
            .chain(program_races)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let locked = self.lock.reconcile(&scope, races, program)?;
        let selections: Vec<TicketSelection> = locked
            .races
            .iter()
            .map(|race| match verdicts.get(&race.race) {
                Some(v) => self.compose(race, v.label, v.entropy),
                None => self.compose(race, RaceRisk::Unclassified, None),
            })
            .collect();

        let coupon = Coupon::new(date, selections);
        info!("Coupon for {}: {} races, {}", date, coupon.selections.len(), coupon.summary());
        Ok(coupon)
    }
}

/// Points awarded by the pseudo-surprise heuristic
fn pseudo_surprise_points(candidate: &Candidate<'_>, config: &ComposerConfig) -> u32 {
    PSEUDO_SURPRISE_RULES
        .iter()
        .filter(|rule| rule(candidate, config))
        .count() as u32
}

/// Candidates sorted by composer score descending; ties keep calibrated order
fn ranked_candidates(race: &CalibratedRace) -> Vec<Candidate<'_>> {
    let mut ranked: Vec<Candidate<'_>> = race.runners.iter().map(Candidate::new).collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OracleSignals, RiskTag, Runner, Surface};
    use crate::profile::ProfileEvidence;
    use crate::strategy::calibrator::ScoreCalibrator;
    use crate::strategy::decision::ScoredRunner;

    fn key() -> RaceKey {
        RaceKey::new("Kocaeli", NaiveDate::from_ymd_opt(2025, 10, 12).unwrap(), 3)
    }

    fn scored(name: &str, base: f64, agf: Option<f64>, signals: OracleSignals) -> ScoredRunner {
        let mut runner = Runner::new(name, key(), Surface::Dirt, 1500).with_signals(signals);
        runner.agf = agf;
        ScoredRunner {
            runner,
            base_score: base,
            surprise_score: 0.0,
            risk: RiskTag::High,
            stats: "0/0".to_string(),
            evidence: ProfileEvidence::default(),
        }
    }

    fn race(runners: Vec<ScoredRunner>) -> CalibratedRace {
        ScoreCalibrator::default().calibrate_race(key(), runners)
    }

    fn field(n: usize) -> CalibratedRace {
        race(
            (0..n)
                .map(|i| scored(&format!("R{i}"), 100.0 - i as f64 * 10.0, Some(30.0), OracleSignals::default()))
                .collect(),
        )
    }

    fn names(sel: &TicketSelection) -> Vec<&str> {
        sel.pick_names().collect()
    }

    #[test]
    fn test_banko_and_normal_and_default() {
        let composer = TicketComposer::default();
        let r = field(6);
        assert_eq!(names(&composer.compose(&r, RaceRisk::Banko, None)), vec!["R0"]);
        assert_eq!(names(&composer.compose(&r, RaceRisk::Normal, None)), vec!["R0", "R1"]);
        let default = composer.compose(&r, RaceRisk::Unclassified, None);
        assert_eq!(names(&default), vec!["R0"]);
        assert!(default.strategy.starts_with("DEFAULT"));
    }

    #[test]
    fn test_surprise_open_uses_surprise_model() {
        let mut runners: Vec<ScoredRunner> = (0..5)
            .map(|i| scored(&format!("R{i}"), 100.0 - i as f64 * 10.0, Some(30.0), OracleSignals::default()))
            .collect();
        runners[3].runner.signals.surprise_prob = Some(0.6);
        runners[1].runner.signals.surprise_prob = Some(0.2);
        let sel = TicketComposer::default().compose(&race(runners), RaceRisk::SurpriseOpen, Some(2.4));
        assert_eq!(names(&sel), vec!["R0", "R3"]);
        assert_eq!(sel.entropy, Some(2.4));
    }

    #[test]
    fn test_surprise_open_favorite_as_top_surprise_uses_heuristic() {
        let mut runners = vec![
            scored("R0", 100.0, Some(40.0), OracleSignals::default()),
            scored("R1", 90.0, Some(30.0), OracleSignals::default()),
            scored("R2", 80.0, Some(5.0), OracleSignals::default()),
            scored("R3", 0.0, Some(40.0), OracleSignals::default()),
        ];
        runners[0].runner.signals.surprise_prob = Some(0.9);
        runners[1].runner.signals.surprise_prob = Some(0.5);
        let sel = TicketComposer::default().compose(&race(runners), RaceRisk::SurpriseOpen, None);
        // R1 is the best non-favorite by surprise probability, but R2 scores two heuristic points
        assert_eq!(names(&sel), vec!["R0", "R2"]);
        assert!(sel.strategy.contains("pseudo-surprise"));
    }

    #[test]
    fn test_surprise_open_pseudo_surprise_qualifier() {
        // R2 has low AGF and a decent score: 2 points
        let runners = vec![
            scored("R0", 100.0, Some(40.0), OracleSignals::default()),
            scored("R1", 90.0, Some(30.0), OracleSignals::default()),
            scored("R2", 80.0, Some(5.0), OracleSignals::default()),
            scored("R3", 0.0, Some(2.0), OracleSignals::default()),
        ];
        let sel = TicketComposer::default().compose(&race(runners), RaceRisk::SurpriseOpen, None);
        assert_eq!(names(&sel), vec!["R0", "R2"]);
    }

    #[test]
    fn test_surprise_open_falls_back_to_next_best() {
        let sel = TicketComposer::default().compose(&field(4), RaceRisk::SurpriseOpen, None);
        assert_eq!(names(&sel), vec!["R0", "R1"]);
    }

    #[test]
    fn test_surprise_open_always_two_distinct() {
        let composer = TicketComposer::default();
        for n in 2..10 {
            let sel = composer.compose(&field(n), RaceRisk::SurpriseOpen, None);
            let mut distinct = names(&sel);
            distinct.dedup();
            assert!(distinct.len() >= 2, "field of {} gave {:?}", n, names(&sel));
        }
        let single = composer.compose(&field(1), RaceRisk::SurpriseOpen, None);
        assert_eq!(names(&single), vec!["R0"]);
    }

    #[test]
    fn test_risky_targets_four_distinct() {
        let sel = TicketComposer::default().compose(&field(8), RaceRisk::Risky, None);
        let picked = names(&sel);
        assert_eq!(picked.len(), 4);
        assert_eq!(&picked[..3], &["R0", "R1", "R2"]);
    }

    #[test]
    fn test_risky_defensive_by_place_probability() {
        let with_place = |name: &str, base: f64, win: f64, place: f64| {
            scored(
                name,
                base,
                Some(30.0),
                OracleSignals {
                    win_prob: Some(win),
                    place_prob: Some(place),
                    ..Default::default()
                },
            )
        };
        let runners = vec![
            with_place("A", 100.0, 0.30, 0.40),
            with_place("B", 90.0, 0.25, 0.70),
            with_place("C", 80.0, 0.20, 0.65),
            with_place("D", 70.0, 0.15, 0.30),
            with_place("E", 60.0, 0.10, 0.20),
        ];
        let sel = TicketComposer::default().compose(&race(runners), RaceRisk::Risky, None);
        let picked = names(&sel);
        assert_eq!(&picked[..2], &["B", "C"]);
        assert_eq!(picked[2], "A");
        assert_eq!(picked.len(), 4);
    }

    #[test]
    fn test_small_risky_field_dedups() {
        let sel = TicketComposer::default().compose(&field(2), RaceRisk::Risky, None);
        assert_eq!(names(&sel), vec!["R0", "R1"]);
    }

    #[test]
    fn test_pick_carries_rationale() {
        let sel = TicketComposer::default().compose(&field(3), RaceRisk::Banko, None);
        assert!(!sel.picks[0].rationale.is_empty());
        assert!(sel.picks[0].rationale.len() <= 5);
    }

    #[test]
    fn test_chaos_index() {
        let composer = TicketComposer::default();
        let r = field(4);
        let coupon = Coupon::new(
            key().date,
            vec![
                composer.compose(&r, RaceRisk::Risky, None),
                composer.compose(&r, RaceRisk::Normal, None),
                composer.compose(&r, RaceRisk::SurpriseOpen, None),
                composer.compose(&r, RaceRisk::Banko, None),
            ],
        );
        assert_eq!(coupon.chaos_index, 0.5);
        assert_eq!(Coupon::new(key().date, vec![]).chaos_index, 0.0);
    }

    #[test]
    fn test_compose_coupon_requires_full_program() {
        let r = field(3);
        let mut program = RaceProgram::new();
        program.insert(key(), vec!["R0".into(), "R1".into(), "R2".into(), "Late".into()]);

        let composer = TicketComposer::default();
        let err = composer
            .compose_coupon(key().date, None, &[r.clone()], &BTreeMap::new(), &program)
            .unwrap_err();
        assert!(matches!(err, GanyanError::DataIncomplete { .. }));

        program.insert(key(), vec!["R0".into(), "R1".into(), "R2".into()]);
        let coupon = composer
            .compose_coupon(key().date, None, &[r], &BTreeMap::new(), &program)
            .unwrap();
        assert_eq!(coupon.selections.len(), 1);
        assert_eq!(coupon.selections[0].risk, RaceRisk::Unclassified);
    }

    #[test]
    fn test_compose_coupon_rejects_empty_program_race() {
        let mut program = RaceProgram::new();
        program.insert(key(), Vec::new());
        let err = TicketComposer::default()
            .compose_coupon(key().date, None, &[field(2)], &BTreeMap::new(), &program)
            .unwrap_err();
        assert!(matches!(err, GanyanError::RaceMissingFromProgram { .. }));
    }

    #[test]
    fn test_compose_coupon_rejects_scored_race_outside_program() {
        let first = field(2);
        let second_key = RaceKey::new("Kocaeli", key().date, 4);
        let second = race(vec![
            scored("S0", 50.0, None, OracleSignals::default()),
            scored("S1", 40.0, None, OracleSignals::default()),
        ]);
        let second = CalibratedRace {
            race: second_key.clone(),
            ..second
        };
        let mut program = RaceProgram::new();
        program.insert(key(), vec!["R0".into(), "R1".into()]);

        let err = TicketComposer::default()
            .compose_coupon(key().date, None, &[first, second], &BTreeMap::new(), &program)
            .unwrap_err();
        match err {
            GanyanError::RaceMissingFromProgram { race } => assert_eq!(race, second_key),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_compose_coupon_without_program_for_date() {
        let err = TicketComposer::default()
            .compose_coupon(key().date, Some("Kocaeli"), &[field(2)], &BTreeMap::new(), &RaceProgram::new())
            .unwrap_err();
        assert!(matches!(err, GanyanError::NoProgram { .. }));
    }
}
