//! Persistence Layer for Resumable Runs
//!
//! This module provides the harness's durable state and output:
//! - Checkpoint store for the last fully completed date
//! - Report sinks for daily reports, coupons and run summaries

pub mod checkpoint;
pub mod report;

pub use checkpoint::{Checkpoint, CheckpointStore, JsonFileCheckpoint, MemoryCheckpoint};
pub use report::{render_coupon_markdown, DirReportSink, MemoryReportSink, ReportSink};
