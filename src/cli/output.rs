//! Terminal rendering for `ganyan` commands.
//!
//! Results print either as `tabled` tables (default) or pretty JSON (`--json`);
//! the small formatters below keep numbers consistent across commands.

use serde::Serialize;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Rows as a table, or the same rows as a JSON array
pub fn print_items<T: Tabled + Serialize>(rows: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => print_json(&rows),
        OutputMode::Table if rows.is_empty() => {
            println!("(nothing to show)");
            Ok(())
        }
        OutputMode::Table => {
            println!("{}", Table::new(rows));
            Ok(())
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_heading(title: &str) {
    println!("\n\x1b[1m{title}\x1b[0m");
}

pub fn print_success(msg: &str) {
    println!("\x1b[32m{msg}\x1b[0m");
}

pub fn print_warn(msg: &str) {
    println!("\x1b[33m{msg}\x1b[0m");
}

/// Ratio in [0, 1] as a one-decimal percentage
pub fn pct(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Three-decimal value, `-` when absent
pub fn decimal3(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".to_string())
}

/// BANKO / RISKY markers for a sequence leg
pub fn leg_flags(banko: bool, risky: bool) -> String {
    [(banko, "BANKO"), (risky, "RISKY")]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, flag)| *flag)
        .collect::<Vec<_>>()
        .join(" ")
}
