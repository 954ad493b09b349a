//! Report sinks
//!
//! Daily artifacts of a walk-forward run: a JSON report per date, a Markdown
//! coupon when one was composed, and a run summary.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

use crate::error::{GanyanError, Result};
use crate::sim::{DailyReport, RunSummary};
use crate::strategy::{Coupon, SequenceCoupon};

/// Destination for harness output
pub trait ReportSink: Send + Sync {
    fn write_daily(&self, report: &DailyReport) -> Result<()>;

    fn write_summary(&self, summary: &RunSummary) -> Result<()>;
}

/// Writes `<date>_report.json` and `<date>_coupon.md` under a directory
#[derive(Debug, Clone)]
pub struct DirReportSink {
    dir: PathBuf,
}

impl DirReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportSink for DirReportSink {
    fn write_daily(&self, report: &DailyReport) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let json_path = self.dir.join(format!("{}_report.json", report.date));
        fs::write(&json_path, serde_json::to_string_pretty(report)?)?;

        if let Some(coupon) = &report.coupon {
            let md_path = self.dir.join(format!("{}_coupon.md", report.date));
            fs::write(&md_path, render_coupon_markdown(coupon, &report.sequences))?;
        }
        debug!("Report for {} written to {}", report.date, self.dir.display());
        Ok(())
    }

    fn write_summary(&self, summary: &RunSummary) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("run_{}_summary.json", summary.run_id));
        fs::write(path, serde_json::to_string_pretty(summary)?)?;
        Ok(())
    }
}

/// Keeps reports in memory
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    daily: Mutex<Vec<DailyReport>>,
    summaries: Mutex<Vec<RunSummary>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<DailyReport> {
        self.daily.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn summaries(&self) -> Vec<RunSummary> {
        self.summaries.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl ReportSink for MemoryReportSink {
    fn write_daily(&self, report: &DailyReport) -> Result<()> {
        self.daily
            .lock()
            .map_err(|e| GanyanError::Other(anyhow::anyhow!("report sink poisoned: {e}")))?
            .push(report.clone());
        Ok(())
    }

    fn write_summary(&self, summary: &RunSummary) -> Result<()> {
        self.summaries
            .lock()
            .map_err(|e| GanyanError::Other(anyhow::anyhow!("report sink poisoned: {e}")))?
            .push(summary.clone());
        Ok(())
    }
}

/// Markdown rendering of a day's coupon and sequence coupons
pub fn render_coupon_markdown(coupon: &Coupon, sequences: &[SequenceCoupon]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Coupon {}", coupon.date);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", coupon.summary());

    for sel in &coupon.selections {
        let _ = writeln!(out);
        let entropy = sel
            .entropy
            .map(|e| format!(" | entropy {e:.2}"))
            .unwrap_or_default();
        let _ = writeln!(out, "## {} | {}{}", sel.race, sel.risk, entropy);
        let _ = writeln!(out, "Strategy: {}", sel.strategy);
        for (i, pick) in sel.picks.iter().enumerate() {
            let jockey = pick
                .jockey
                .as_deref()
                .map(|j| format!(" ({j})"))
                .unwrap_or_default();
            let _ = writeln!(out, "{}. **{}**{} score {:.3} [{}]", i + 1, pick.name, jockey, pick.score, pick.label);
            for bullet in &pick.rationale {
                let _ = writeln!(out, "   - {bullet}");
            }
        }
    }

    for seq in sequences {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "## {} at {} (races {:?})",
            seq.name, seq.venue, seq.race_numbers
        );
        let _ = writeln!(
            out,
            "Economy: {} combinations | Wide: {} combinations",
            seq.economy_combinations(),
            seq.wide_combinations()
        );
        for leg in &seq.legs {
            let mut marks = String::new();
            if leg.banko {
                marks.push_str(" BANKO");
            }
            if leg.risky {
                marks.push_str(" RISKY");
            }
            let _ = writeln!(
                out,
                "- Leg {} (race {}){}: economy [{}] wide [{}]",
                leg.leg,
                leg.race_no,
                marks,
                leg.economy.join(", "),
                leg.wide.join(", ")
            );
        }
    }
    out
}
