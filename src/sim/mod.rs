//! Walk-forward simulation
//!
//! - `source` - CSV loading and the date-partitioned data source seam
//! - `walk_forward` - the chronological replay harness

pub mod source;
pub mod walk_forward;

pub use source::{load_runners_from_csv, InMemoryRaceSource, RaceDataSource};
pub use walk_forward::{
    DailyReport, DayStability, FailedDate, RaceReport, RollingHitRate, RunSummary, StabilitySummary, WalkForwardHarness,
};
