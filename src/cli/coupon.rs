//! `ganyan coupon` - one date's coupon from history strictly before it.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tabled::Tabled;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::domain::RaceKey;
use crate::error::GanyanError;
use crate::profile::ProfileStore;
use crate::sim::{InMemoryRaceSource, RaceDataSource};
use crate::strategy::{
    CalibratedRace, Coupon, DecisionEngine, RaceRiskClassifier, RaceRiskVerdict, ScoreCalibrator,
    SequenceBuilder, SequenceCoupon, TicketComposer,
};

use super::output::{self, OutputMode};

#[derive(Debug, Serialize, Tabled)]
pub struct RiskRow {
    pub runners: usize,
    pub entropy: String,
    pub gap: String,
    pub label: String,
}

impl RiskRow {
    pub fn from_verdict(runners: usize, verdict: &RaceRiskVerdict) -> Self {
        Self {
            runners,
            entropy: output::decimal3(verdict.entropy),
            gap: output::decimal3(Some(verdict.gap)),
            label: verdict.label.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct RunnerRow {
    pub race: u32,
    pub rank: usize,
    pub runner: String,
    pub score: String,
    pub percentile: String,
    pub label: String,
    pub tags: String,
    pub stats: String,
}

#[derive(Debug, Serialize, Tabled)]
pub struct PickRow {
    pub race: String,
    pub risk: String,
    pub strategy: String,
    pub pick: String,
    pub rationale: String,
}

#[derive(Debug, Serialize, Tabled)]
pub struct LegRow {
    pub sequence: String,
    pub leg: usize,
    pub race: u32,
    pub economy: String,
    pub wide: String,
    pub flags: String,
}

#[derive(Debug, Serialize)]
struct CouponOutput<'a> {
    races: &'a [CalibratedRace],
    coupon: &'a Coupon,
    sequences: &'a [SequenceCoupon],
}

pub fn run(
    data: &Path,
    program_path: Option<&Path>,
    date: NaiveDate,
    venue: Option<&str>,
    mode: OutputMode,
    config: &AppConfig,
) -> Result<()> {
    let source = InMemoryRaceSource::from_csv(data, program_path)
        .with_context(|| format!("loading {}", data.display()))?;

    let mut store = ProfileStore::with_config(config.profile.clone());
    store.warm_up(&source.history_before(date), date);

    let program: Vec<_> = source
        .program(date)
        .into_iter()
        .filter(|r| venue.map_or(true, |v| r.race.venue.eq_ignore_ascii_case(v)))
        .collect();
    if program.is_empty() {
        return Err(GanyanError::NoProgram {
            date,
            venue: venue.map(str::to_string),
        }
        .into());
    }

    let scored = DecisionEngine::new(config.scoring.clone()).score(&program, &store);
    let races = ScoreCalibrator::new(config.calibration.clone()).calibrate(&scored);
    let classifier = RaceRiskClassifier::new(config.risk.clone());
    let verdicts: BTreeMap<RaceKey, RaceRiskVerdict> =
        races.iter().map(|r| (r.race.clone(), classifier.assess(r))).collect();

    let entries = source.program_entries(date);
    let coupon = TicketComposer::new(config.composer.clone())
        .compose_coupon(date, venue, &races, &verdicts, &entries)
        .context("coupon blocked by program reconciliation")?;

    let builder = SequenceBuilder::new();
    let venues: BTreeSet<&str> = races.iter().map(|r| r.race.venue.as_str()).collect();
    let mut sequences = Vec::new();
    for v in venues {
        match builder.build(v, date, &races, &entries) {
            Ok(mut built) => sequences.append(&mut built),
            Err(e) if e.is_unit_scoped() => debug!("{}", e),
            Err(e) => return Err(e.into()),
        }
    }
    info!("Coupon for {}: {} races, {} sequences", date, coupon.selections.len(), sequences.len());

    match mode {
        OutputMode::Json => output::print_json(&CouponOutput {
            races: &races,
            coupon: &coupon,
            sequences: &sequences,
        }),
        OutputMode::Table => print_tables(&races, &coupon, &sequences),
    }
}

fn print_tables(races: &[CalibratedRace], coupon: &Coupon, sequences: &[SequenceCoupon]) -> Result<()> {
    let runners: Vec<RunnerRow> = races
        .iter()
        .flat_map(|race| {
            race.runners.iter().map(move |r| RunnerRow {
                race: race.race.race_no,
                rank: r.rank_in_race,
                runner: r.name().to_string(),
                score: format!("{:.1}", r.scored.base_score),
                percentile: output::decimal3(Some(r.percentile)),
                label: r.label.to_string(),
                tags: r.tags.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(","),
                stats: r.scored.stats.clone(),
            })
        })
        .collect();
    output::print_heading("Calibrated runners");
    output::print_items(&runners, OutputMode::Table)?;

    let picks: Vec<PickRow> = coupon
        .selections
        .iter()
        .flat_map(|sel| {
            sel.picks.iter().map(move |p| PickRow {
                race: format!("{} #{}", sel.race.venue, sel.race.race_no),
                risk: sel.risk.to_string(),
                strategy: sel.strategy.clone(),
                pick: p.name.clone(),
                rationale: p.rationale.join("\n"),
            })
        })
        .collect();
    output::print_heading(&format!("Tickets ({})", coupon.summary()));
    output::print_items(&picks, OutputMode::Table)?;

    if !sequences.is_empty() {
        let legs: Vec<LegRow> = sequences
            .iter()
            .flat_map(|seq| {
                seq.legs.iter().map(move |leg| LegRow {
                    sequence: format!("{} ({}x / {}x)", seq.name, seq.economy_combinations(), seq.wide_combinations()),
                    leg: leg.leg,
                    race: leg.race_no,
                    economy: leg.economy.join(", "),
                    wide: leg.wide.join(", "),
                    flags: output::leg_flags(leg.banko, leg.risky),
                })
            })
            .collect();
        output::print_heading("Six-leg sequences");
        output::print_items(&legs, OutputMode::Table)?;
    }
    Ok(())
}
