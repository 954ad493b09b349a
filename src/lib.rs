pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod profile;
pub mod sim;
pub mod strategy;

pub use config::AppConfig;
pub use domain::{CouponTag, OracleSignals, RaceKey, RaceRisk, RiskTag, Runner, RunnerLabel, Surface};
pub use error::{GanyanError, Result};
pub use persistence::{CheckpointStore, DirReportSink, JsonFileCheckpoint, MemoryCheckpoint, MemoryReportSink, ReportSink};
pub use profile::{Profile, ProfileStore};
pub use sim::{load_runners_from_csv, DailyReport, InMemoryRaceSource, RaceDataSource, RunSummary, WalkForwardHarness};
pub use strategy::{
    CalibratedRace, Coupon, DecisionEngine, RaceProgram, RaceRiskClassifier, ReconciliationLock, ScoreCalibrator,
    SequenceBuilder, TicketComposer,
};
