//! `ganyan backtest` - walk-forward replay.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tabled::Tabled;
use tokio::signal;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::persistence::{CheckpointStore, DirReportSink, JsonFileCheckpoint};
use crate::sim::{InMemoryRaceSource, RunSummary, WalkForwardHarness};

use super::output::{self, OutputMode};

#[derive(Debug, Clone)]
pub struct BacktestArgs {
    pub data: PathBuf,
    pub program: Option<PathBuf>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub resume: bool,
    pub out: Option<PathBuf>,
    pub no_coupon: bool,
}

#[derive(Debug, Serialize, Tabled)]
pub struct SummaryRow {
    pub metric: String,
    pub value: String,
}

fn summary_rows(s: &RunSummary) -> Vec<SummaryRow> {
    let row = |metric: &str, value: String| SummaryRow {
        metric: metric.to_string(),
        value,
    };
    vec![
        row("run id", s.run_id.clone()),
        row("dates processed", s.dates_processed.to_string()),
        row("dates skipped (checkpoint)", s.dates_skipped.to_string()),
        row("dates without program", s.dates_without_program.to_string()),
        row("dates failed", s.failed.len().to_string()),
        row("races evaluated", s.races_evaluated.to_string()),
        row("hit@1", output::pct(s.hit_rate_top1)),
        row("hit@3", output::pct(s.hit_rate_top3)),
        row("coupons composed", s.coupons_composed.to_string()),
        row("coupons blocked", s.coupons_blocked.to_string()),
        row("coupon success", output::pct(s.coupon_success_rate)),
        row(
            "rolling 7d hit@3",
            s.stability
                .latest_rolling()
                .map(|r| output::pct(r.hit_rate_top3))
                .unwrap_or_else(|| "-".to_string()),
        ),
        row(
            "worst / best day hit@3",
            format!(
                "{} / {}",
                s.stability.worst_day_hit3.map(output::pct).unwrap_or_else(|| "-".to_string()),
                s.stability.best_day_hit3.map(output::pct).unwrap_or_else(|| "-".to_string())
            ),
        ),
        row(
            "worst day",
            s.stability
                .worst_days
                .first()
                .map(|d| format!("{} ({} races, {} missed surprises)", d.date, d.races, d.surprise_winners_missed))
                .unwrap_or_else(|| "-".to_string()),
        ),
        row("cancelled", s.cancelled.to_string()),
        row("elapsed", format!("{} ms", s.elapsed_ms)),
    ]
}

pub async fn run(args: BacktestArgs, mut config: AppConfig) -> Result<()> {
    if args.no_coupon {
        config.harness.compose_coupons = false;
    }
    let out_dir = args.out.clone().unwrap_or_else(|| config.harness.output_dir.clone());

    let source = InMemoryRaceSource::from_csv(&args.data, args.program.as_deref())
        .with_context(|| format!("loading {}", args.data.display()))?;

    let checkpoint = Arc::new(JsonFileCheckpoint::new(&config.harness.checkpoint_path));
    if !args.resume {
        checkpoint.clear().context("clearing previous checkpoint")?;
    }

    let stop = Arc::new(AtomicBool::new(false));
    let harness = WalkForwardHarness::new(Arc::new(source), config)
        .with_checkpoint(checkpoint)
        .with_sink(Arc::new(DirReportSink::new(&out_dir)))
        .with_stop_flag(stop.clone());
    info!("Backtest run {} writing to {}", harness.run_id(), out_dir.display());

    // Ctrl+C only raises the flag; the harness finishes the current date first
    let watcher = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, stopping after the current date");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let (start, end) = (args.start, args.end);
    let summary = tokio::task::spawn_blocking(move || harness.run(start, end))
        .await
        .context("backtest task panicked")??;
    watcher.abort();

    output::print_items(&summary_rows(&summary), OutputMode::Table)?;
    for failed in &summary.failed {
        output::print_warn(&format!("{}: {}", failed.date, failed.error));
    }
    if summary.cancelled {
        output::print_warn("Run cancelled; resume with --resume");
    } else {
        output::print_success(&format!("Reports written to {}", out_dir.display()));
    }
    Ok(())
}
