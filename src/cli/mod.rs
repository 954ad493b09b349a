//! Ganyan CLI - race profiling and coupon tooling
//!
//! Commands:
//! - `ganyan backtest` - Walk-forward replay over a date range
//! - `ganyan coupon` - Coupon for one date from history before it
//! - `ganyan risk` - Classify a single win-probability vector

pub mod backtest;
pub mod coupon;
pub mod output;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::strategy::RaceRiskClassifier;

use output::OutputMode;

/// Ganyan race decision pipeline CLI
#[derive(Parser, Debug)]
#[command(name = "ganyan")]
#[command(author, version, about = "Walk-forward race profiling, calibration and coupon composition")]
pub struct Cli {
    /// Configuration directory (default.toml, then $GANYAN_ENV)
    #[arg(long, global = true, default_value = "config", env = "GANYAN_CONFIG_DIR")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay history date by date, scoring before learning
    Backtest {
        /// Runner rows CSV (programs and results)
        #[arg(long)]
        data: PathBuf,
        /// Separate authoritative program CSV
        #[arg(long)]
        program: Option<PathBuf>,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        /// Continue after the last checkpointed date
        #[arg(long)]
        resume: bool,
        /// Report directory (overrides harness.output_dir)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Calibration output only, no coupons
        #[arg(long)]
        no_coupon: bool,
    },

    /// Build the coupon for one date
    Coupon {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        program: Option<PathBuf>,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        venue: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Classify one race from its win probabilities
    Risk {
        #[arg(required = true, num_args = 1..)]
        probs: Vec<f64>,
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Long-running commands get full logging; the rest only warnings
    pub fn is_long_running(&self) -> bool {
        matches!(self, Commands::Backtest { .. })
    }
}

impl Cli {
    pub async fn run(self, config: AppConfig) -> Result<()> {
        match self.command {
            Commands::Backtest {
                data,
                program,
                start,
                end,
                resume,
                out,
                no_coupon,
            } => {
                let args = backtest::BacktestArgs {
                    data,
                    program,
                    start,
                    end,
                    resume,
                    out,
                    no_coupon,
                };
                backtest::run(args, config).await
            }
            Commands::Coupon {
                data,
                program,
                date,
                venue,
                json,
            } => coupon::run(
                &data,
                program.as_deref(),
                date,
                venue.as_deref(),
                OutputMode::from_json_flag(json),
                &config,
            ),
            Commands::Risk { probs, json } => {
                let verdict = RaceRiskClassifier::new(config.risk.clone()).classify(&probs);
                let row = coupon::RiskRow::from_verdict(probs.len(), &verdict);
                output::print_items(&[row], OutputMode::from_json_flag(json))
            }
        }
    }
}
