//! Profile store
//!
//! Owns every entrant profile for one simulation run. The store is an explicit
//! value (never global), so independent runs keep isolated state.
//!
//! Ordering contract: results for date D may be ingested only after all scoring
//! for D has finished. The store does not check this; the walk-forward harness
//! guarantees it.

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::ProfileConfig;
use crate::domain::Runner;

use super::entrant::Profile;

#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: HashMap<String, Profile>,
    config: ProfileConfig,
    ingested: u64,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ProfileConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Apply one finalized result, creating the entrant's profile on first sighting.
    ///
    /// Each historical result must be ingested exactly once.
    pub fn ingest(&mut self, result: &Runner) {
        let profile = self
            .profiles
            .entry(result.name.clone())
            .or_insert_with(|| Profile::new(result.name.clone()));
        profile.update_with(result, &self.config);
        self.ingested += 1;
    }

    /// Ingest one day's results. Returns the number of results applied.
    pub fn ingest_day(&mut self, results: &[Runner]) -> usize {
        for result in results {
            self.ingest(result);
        }
        debug!("Ingested {} results into {} profiles", results.len(), self.profiles.len());
        results.len()
    }

    /// Bulk chronological ingestion of all results strictly before `before`.
    ///
    /// Sorts by (date, venue, race) first; results on or after the boundary are
    /// ignored. Returns the number of results applied.
    pub fn warm_up(&mut self, history: &[Runner], before: NaiveDate) -> usize {
        let mut eligible: Vec<&Runner> = history
            .iter()
            .filter(|r| r.race.date < before)
            .collect();
        eligible.sort_by(|a, b| a.race.cmp(&b.race));

        for result in &eligible {
            self.ingest(result);
        }

        info!(
            "Warmed up {} profiles from {} results before {}",
            self.profiles.len(),
            eligible.len(),
            before
        );
        eligible.len()
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Total results applied since creation
    pub fn ingested(&self) -> u64 {
        self.ingested
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }
}
