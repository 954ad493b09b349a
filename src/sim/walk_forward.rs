//! Walk-forward harness
//!
//! Replays history one date at a time. For each date the program is scored
//! against profiles built only from earlier results, calibrated, assessed and
//! (optionally) composed into coupons; the date's results are ingested only
//! afterwards. Progress is checkpointed per completed date.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::{RaceKey, Runner};
use crate::error::{GanyanError, Result};
use crate::persistence::{CheckpointStore, MemoryCheckpoint, MemoryReportSink, ReportSink};
use crate::profile::ProfileStore;
use crate::strategy::{
    validate_coupon, CalibratedRace, Coupon, CouponValidation, DailyMetrics, DecisionEngine,
    RaceRiskClassifier, RaceRiskVerdict, ScoreCalibrator, SequenceBuilder, SequenceCoupon,
    TicketComposer,
};

use super::source::RaceDataSource;

/// One calibrated race with its risk verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceReport {
    pub race: CalibratedRace,
    pub verdict: RaceRiskVerdict,
}

/// Everything produced for one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub run_id: String,
    pub date: NaiveDate,
    pub races: Vec<RaceReport>,
    pub coupon: Option<Coupon>,
    /// Why the coupon was not produced (reconciliation failure etc.)
    pub coupon_error: Option<String>,
    pub sequences: Vec<SequenceCoupon>,
    pub metrics: Option<DailyMetrics>,
    pub validation: Option<CouponValidation>,
    /// Profiles known when the date was scored
    pub profiles_before: usize,
    /// Results ingested after scoring
    pub results_ingested: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedDate {
    pub date: NaiveDate,
    pub error: String,
}

/// Outcome of a harness run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub dates_processed: usize,
    pub dates_skipped: usize,
    pub dates_without_program: usize,
    pub failed: Vec<FailedDate>,
    pub cancelled: bool,
    pub races_evaluated: usize,
    pub hit_rate_top1: f64,
    pub hit_rate_top3: f64,
    pub coupons_composed: usize,
    pub coupons_blocked: usize,
    pub coupon_success_rate: f64,
    pub stability: StabilitySummary,
    pub elapsed_ms: u64,
}

/// Days averaged by the rolling hit rates
const ROLLING_WINDOW: usize = 7;
/// Worst days kept in the summary
const WORST_DAYS: usize = 10;
/// Score penalty per missed surprise winner
const MISSED_SURPRISE_PENALTY: f64 = 5.0;

/// One evaluated date as seen by the stability summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayStability {
    pub date: NaiveDate,
    pub races: usize,
    pub hit_rate_top1: f64,
    pub hit_rate_top3: f64,
    pub surprise_winners_missed: usize,
    /// hit@3 as a percentage minus a penalty per missed surprise
    pub score: f64,
}

impl DayStability {
    fn new(date: NaiveDate, m: &DailyMetrics) -> Self {
        Self {
            date,
            races: m.races,
            hit_rate_top1: m.hit_rate_top1,
            hit_rate_top3: m.hit_rate_top3,
            surprise_winners_missed: m.surprise_winners_missed,
            score: m.hit_rate_top3 * 100.0 - m.surprise_winners_missed as f64 * MISSED_SURPRISE_PENALTY,
        }
    }
}

/// Mean of the daily hit rates over the trailing window ending at `date`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingHitRate {
    pub date: NaiveDate,
    pub hit_rate_top1: f64,
    pub hit_rate_top3: f64,
}

/// How steady the daily hit rates were across the run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilitySummary {
    /// One point per evaluated date once a full window is available
    pub rolling: Vec<RollingHitRate>,
    /// Lowest scoring days, worst first
    pub worst_days: Vec<DayStability>,
    pub worst_day_hit3: Option<f64>,
    pub best_day_hit3: Option<f64>,
}

impl StabilitySummary {
    /// Build from evaluated days in date order
    pub fn from_days(days: &[DayStability]) -> Self {
        let rolling = days
            .windows(ROLLING_WINDOW)
            .filter_map(|window| {
                let last = window.last()?;
                let n = window.len() as f64;
                Some(RollingHitRate {
                    date: last.date,
                    hit_rate_top1: window.iter().map(|d| d.hit_rate_top1).sum::<f64>() / n,
                    hit_rate_top3: window.iter().map(|d| d.hit_rate_top3).sum::<f64>() / n,
                })
            })
            .collect();

        let mut worst_days = days.to_vec();
        worst_days.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.date.cmp(&b.date)));
        worst_days.truncate(WORST_DAYS);

        let hit3 = days.iter().map(|d| d.hit_rate_top3);
        Self {
            rolling,
            worst_days,
            worst_day_hit3: hit3.clone().reduce(f64::min),
            best_day_hit3: hit3.reduce(f64::max),
        }
    }

    pub fn latest_rolling(&self) -> Option<&RollingHitRate> {
        self.rolling.last()
    }
}

impl RunSummary {
    fn absorb(
        &mut self,
        report: &DailyReport,
        hits: &mut (usize, usize),
        coupon_hits: &mut (usize, usize),
        days: &mut Vec<DayStability>,
    ) {
        self.dates_processed += 1;
        if let Some(m) = &report.metrics {
            days.push(DayStability::new(report.date, m));
            self.races_evaluated += m.races;
            hits.0 += (m.hit_rate_top1 * m.races as f64).round() as usize;
            hits.1 += (m.hit_rate_top3 * m.races as f64).round() as usize;
        }
        if report.coupon.is_some() {
            self.coupons_composed += 1;
        }
        if report.coupon_error.is_some() {
            self.coupons_blocked += 1;
        }
        if let Some(v) = &report.validation {
            coupon_hits.0 += v.passed;
            coupon_hits.1 += v.total_races;
        }
    }
}

/// Walk-forward replay over a date range
pub struct WalkForwardHarness {
    source: Arc<dyn RaceDataSource>,
    config: AppConfig,
    checkpoint: Arc<dyn CheckpointStore>,
    sink: Arc<dyn ReportSink>,
    stop: Arc<AtomicBool>,
    run_id: String,
    engine: DecisionEngine,
    calibrator: ScoreCalibrator,
    classifier: RaceRiskClassifier,
    composer: TicketComposer,
    sequences: SequenceBuilder,
}

impl WalkForwardHarness {
    pub fn new(source: Arc<dyn RaceDataSource>, config: AppConfig) -> Self {
        Self {
            source,
            engine: DecisionEngine::new(config.scoring.clone()),
            calibrator: ScoreCalibrator::new(config.calibration.clone()),
            classifier: RaceRiskClassifier::new(config.risk.clone()),
            composer: TicketComposer::new(config.composer.clone()),
            sequences: SequenceBuilder::new(),
            config,
            checkpoint: Arc::new(MemoryCheckpoint::new()),
            sink: Arc::new(MemoryReportSink::new()),
            stop: Arc::new(AtomicBool::new(false)),
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Share a stop flag; the run ends before the next date once it is set
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Replay every calendar date in `start..=end`.
    ///
    /// Dates at or before the checkpoint are skipped; profiles are rebuilt
    /// from all results strictly before the first unprocessed date. A failing
    /// date is logged and skipped without advancing the checkpoint.
    pub fn run(&self, start: NaiveDate, end: NaiveDate) -> Result<RunSummary> {
        if start > end {
            return Err(GanyanError::InvalidDateRange { start, end });
        }
        let started = Instant::now();

        let last_done = self.checkpoint.load()?;
        let first_pending = match last_done {
            Some(done) if done >= start => done.checked_add_days(Days::new(1)).unwrap_or(done),
            _ => start,
        };

        info!(
            "Walk-forward run {} from {} to {} (resume from {})",
            self.run_id, start, end, first_pending
        );

        let mut store = ProfileStore::with_config(self.config.profile.clone());
        store.warm_up(&self.source.history_before(first_pending), first_pending);

        let mut summary = RunSummary {
            run_id: self.run_id.clone(),
            start: Some(start),
            end: Some(end),
            ..Default::default()
        };
        let mut hits = (0usize, 0usize);
        let mut coupon_hits = (0usize, 0usize);
        let mut days = Vec::new();

        for date in start.iter_days().take_while(|d| *d <= end) {
            if self.stop.load(Ordering::SeqCst) {
                warn!("Stop requested; ending run before {}", date);
                summary.cancelled = true;
                break;
            }
            if date < first_pending {
                debug!("Skipping {}: already checkpointed", date);
                summary.dates_skipped += 1;
                continue;
            }

            let outcome = self
                .process_date(date, &mut store)
                .and_then(|report| self.sink.write_daily(&report).map(|_| report));

            match outcome {
                Ok(report) => {
                    summary.absorb(&report, &mut hits, &mut coupon_hits, &mut days);
                    if let Err(e) = self.checkpoint.save(date) {
                        error!("Failed to checkpoint {}: {}", date, e);
                    }
                }
                Err(GanyanError::NoProgram { .. }) => {
                    debug!("No program on {}", date);
                    summary.dates_without_program += 1;
                }
                Err(e) => {
                    error!("Date {} failed: {}", date, e);
                    summary.failed.push(FailedDate {
                        date,
                        error: e.to_string(),
                    });
                }
            }
        }

        if summary.races_evaluated > 0 {
            summary.hit_rate_top1 = hits.0 as f64 / summary.races_evaluated as f64;
            summary.hit_rate_top3 = hits.1 as f64 / summary.races_evaluated as f64;
        }
        if coupon_hits.1 > 0 {
            summary.coupon_success_rate = coupon_hits.0 as f64 / coupon_hits.1 as f64;
        }
        summary.stability = StabilitySummary::from_days(&days);
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        if let Err(e) = self.sink.write_summary(&summary) {
            error!("Failed to write run summary: {}", e);
        }
        info!(
            "Run {} finished: {} processed, {} skipped, {} failed, {} without program, hit@1 {:.1}%",
            self.run_id,
            summary.dates_processed,
            summary.dates_skipped,
            summary.failed.len(),
            summary.dates_without_program,
            summary.hit_rate_top1 * 100.0
        );
        Ok(summary)
    }

    /// Predict, compose and then learn one date.
    ///
    /// Results are ingested even when the date has no program so the profile
    /// store never misses a finished race.
    pub fn process_date(&self, date: NaiveDate, store: &mut ProfileStore) -> Result<DailyReport> {
        let program = self.source.program(date);
        let results = self.source.results(date);

        if program.is_empty() {
            if !results.is_empty() {
                store.ingest_day(&ordered(results));
            }
            return Err(GanyanError::NoProgram { date, venue: None });
        }

        let profiles_before = store.len();
        let scored = self.engine.score(&program, store);
        let races = self.calibrator.calibrate(&scored);
        let verdicts: BTreeMap<RaceKey, RaceRiskVerdict> = races
            .iter()
            .map(|r| (r.race.clone(), self.classifier.assess(r)))
            .collect();

        let (coupon, coupon_error, sequences) = if self.config.harness.compose_coupons {
            self.compose(date, &races, &verdicts)
        } else {
            (None, None, Vec::new())
        };

        let metrics = DailyMetrics::evaluate(&races, &verdicts, &results);
        let validation = coupon.as_ref().map(|c| validate_coupon(c, &results));

        // Results become known only after the predictions above
        let results_ingested = store.ingest_day(&ordered(results));

        info!(
            "{}: {} races scored, {} results ingested{}",
            date,
            races.len(),
            results_ingested,
            metrics
                .as_ref()
                .map(|m| format!(", hit@1 {:.0}%", m.hit_rate_top1 * 100.0))
                .unwrap_or_default()
        );

        let races = races
            .into_iter()
            .map(|race| {
                let verdict = verdicts
                    .get(&race.race)
                    .copied()
                    .unwrap_or_else(|| self.classifier.assess(&race));
                RaceReport { race, verdict }
            })
            .collect();

        Ok(DailyReport {
            run_id: self.run_id.clone(),
            date,
            races,
            coupon,
            coupon_error,
            sequences,
            metrics,
            validation,
            profiles_before,
            results_ingested,
        })
    }

    fn compose(
        &self,
        date: NaiveDate,
        races: &[CalibratedRace],
        verdicts: &BTreeMap<RaceKey, RaceRiskVerdict>,
    ) -> (Option<Coupon>, Option<String>, Vec<SequenceCoupon>) {
        let program = self.source.program_entries(date);

        let (coupon, coupon_error) = match self.composer.compose_coupon(date, None, races, verdicts, &program) {
            Ok(c) => (Some(c), None),
            Err(e) => {
                warn!("Coupon for {} blocked: {}", date, e);
                (None, Some(e.to_string()))
            }
        };

        let venues: BTreeSet<&str> = races.iter().map(|r| r.race.venue.as_str()).collect();
        let mut sequences = Vec::new();
        for venue in venues {
            match self.sequences.build(venue, date, races, &program) {
                Ok(mut built) => sequences.append(&mut built),
                Err(e) if e.is_unit_scoped() => debug!("No sequence at {} on {}: {}", venue, date, e),
                Err(e) => warn!("Sequence build at {} on {} failed: {}", venue, date, e),
            }
        }

        (coupon, coupon_error, sequences)
    }
}

/// Chronological ingestion order within a day
fn ordered(mut results: Vec<Runner>) -> Vec<Runner> {
    results.sort_by(|a, b| a.race.cmp(&b.race));
    results
}
