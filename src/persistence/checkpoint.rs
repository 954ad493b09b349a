//! Checkpoint Store
//!
//! Persists the last fully completed date of a walk-forward run so a
//! restarted run can skip what is already done.
//! A checkpoint is written:
//! - After a date has been scored, composed, reported and ingested
//! - Never for a date that failed

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::{GanyanError, Result};

/// On-disk checkpoint record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_completed_date: NaiveDate,
}

/// Storage for the harness checkpoint
pub trait CheckpointStore: Send + Sync {
    /// Last fully completed date, if any
    fn load(&self) -> Result<Option<NaiveDate>>;

    /// Record `date` as fully completed
    fn save(&self, date: NaiveDate) -> Result<()>;

    /// Forget any saved progress
    fn clear(&self) -> Result<()>;
}

/// JSON file checkpoint (`{"last_completed_date": "YYYY-MM-DD"}`)
#[derive(Debug, Clone)]
pub struct JsonFileCheckpoint {
    path: PathBuf,
}

impl JsonFileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CheckpointStore for JsonFileCheckpoint {
    fn load(&self) -> Result<Option<NaiveDate>> {
        if !self.path.exists() {
            debug!("No checkpoint at {}", self.path.display());
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&raw).map_err(|e| {
            GanyanError::Checkpoint(format!("{} is not a valid checkpoint: {}", self.path.display(), e))
        })?;
        info!(
            "Loaded checkpoint {}: last completed date {}",
            self.path.display(),
            checkpoint.last_completed_date
        );
        Ok(Some(checkpoint.last_completed_date))
    }

    fn save(&self, date: NaiveDate) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&Checkpoint {
            last_completed_date: date,
        })?;

        // Write-then-rename so a crash never leaves a truncated checkpoint
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Checkpoint saved: {}", date);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process checkpoint for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryCheckpoint {
    last: Mutex<Option<NaiveDate>>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(date: NaiveDate) -> Self {
        Self {
            last: Mutex::new(Some(date)),
        }
    }
}

impl CheckpointStore for MemoryCheckpoint {
    fn load(&self) -> Result<Option<NaiveDate>> {
        let guard = self
            .last
            .lock()
            .map_err(|e| GanyanError::Checkpoint(format!("lock poisoned: {e}")))?;
        Ok(*guard)
    }

    fn save(&self, date: NaiveDate) -> Result<()> {
        let mut guard = self
            .last
            .lock()
            .map_err(|e| GanyanError::Checkpoint(format!("lock poisoned: {e}")))?;
        *guard = Some(date);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .last
            .lock()
            .map_err(|e| GanyanError::Checkpoint(format!("lock poisoned: {e}")))?;
        *guard = None;
        Ok(())
    }
}
