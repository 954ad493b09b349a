//! Per-entrant running profile
//!
//! A `Profile` accumulates one entrant's finalized results. It knows nothing
//! about time: the caller must feed results in chronological order and never
//! feed a result from the date being predicted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::config::ProfileConfig;
use crate::domain::{DistanceBucket, Runner, Surface};

/// Runs / wins / places counter for one breakdown bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketStats {
    pub runs: u32,
    pub wins: u32,
    pub places: u32,
}

impl BucketStats {
    fn record(&mut self, is_win: bool, is_place: bool) {
        self.runs += 1;
        if is_win {
            self.wins += 1;
        }
        if is_place {
            self.places += 1;
        }
    }

    /// Win rate in percent, 0 for an empty bucket
    pub fn win_rate(&self) -> f64 {
        if self.runs > 0 {
            self.wins as f64 / self.runs as f64 * 100.0
        } else {
            0.0
        }
    }
}

/// Cumulative statistics for one entrant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub starts: u32,
    pub wins: u32,
    /// Finishes at or inside the place cutoff (4th)
    pub places: u32,
    pub surface_stats: BTreeMap<Surface, BucketStats>,
    pub distance_stats: BTreeMap<DistanceBucket, BucketStats>,
    pub venue_stats: BTreeMap<String, BucketStats>,
    /// Most recent first
    pub recent_ranks: VecDeque<u32>,
    pub surprise_index: f64,
    pub last_race_date: Option<NaiveDate>,
    /// Retained for future use; not consumed by scoring
    pub last_jockey: Option<String>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            starts: 0,
            wins: 0,
            places: 0,
            surface_stats: BTreeMap::new(),
            distance_stats: BTreeMap::new(),
            venue_stats: BTreeMap::new(),
            recent_ranks: VecDeque::new(),
            surprise_index: 0.0,
            last_race_date: None,
            last_jockey: None,
        }
    }

    /// Apply one finalized result with the stock constants
    pub fn update(&mut self, result: &Runner) {
        self.update_with(result, &ProfileConfig::default());
    }

    /// Apply one finalized result.
    ///
    /// Not idempotent: applying the same result twice counts it twice.
    pub fn update_with(&mut self, result: &Runner, cfg: &ProfileConfig) {
        let rank = result.finish_rank;
        let is_win = rank == Some(1);
        let is_place = rank.is_some_and(|r| r <= cfg.place_cutoff);

        self.starts += 1;
        if is_win {
            self.wins += 1;
        }
        if is_place {
            self.places += 1;
        }
        self.last_race_date = Some(result.race.date);
        if result.jockey.is_some() {
            self.last_jockey = result.jockey.clone();
        }

        self.surface_stats
            .entry(result.surface)
            .or_default()
            .record(is_win, is_place);
        self.distance_stats
            .entry(result.distance_bucket())
            .or_default()
            .record(is_win, is_place);
        self.venue_stats
            .entry(result.race.venue.to_uppercase())
            .or_default()
            .record(is_win, is_place);

        // A did-not-finish does not enter form history
        if let Some(r) = rank {
            self.recent_ranks.push_front(r);
            self.recent_ranks.truncate(cfg.form_length);
        }

        if let Some(agf) = result.agf {
            if is_win && agf < cfg.surprise_win_agf_max {
                self.surprise_index += cfg.surprise_win_base - agf;
            } else if is_place && agf < cfg.surprise_place_agf_max {
                self.surprise_index += cfg.surprise_place_bonus;
            }
        }
        self.surprise_index *= cfg.surprise_decay;
    }

    /// Win rate in percent
    pub fn win_rate(&self) -> f64 {
        if self.starts > 0 {
            self.wins as f64 / self.starts as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Place rate in percent
    pub fn place_rate(&self) -> f64 {
        if self.starts > 0 {
            self.places as f64 / self.starts as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn surface(&self, surface: Surface) -> BucketStats {
        self.surface_stats.get(&surface).copied().unwrap_or_default()
    }

    pub fn distance(&self, bucket: DistanceBucket) -> BucketStats {
        self.distance_stats.get(&bucket).copied().unwrap_or_default()
    }

    pub fn venue(&self, venue: &str) -> BucketStats {
        self.venue_stats
            .get(&venue.to_uppercase())
            .copied()
            .unwrap_or_default()
    }

    /// "wins/starts"
    pub fn stat_line(&self) -> String {
        format!("{}/{}", self.wins, self.starts)
    }

    /// Evidence about this entrant in the context of an upcoming race
    pub fn evidence_for(&self, entry: &Runner) -> ProfileEvidence {
        if self.starts == 0 {
            return ProfileEvidence::default();
        }

        let form_len = self.recent_ranks.len();
        let (last5_win_rate, last5_avg_rank) = if form_len > 0 {
            let wins = self.recent_ranks.iter().filter(|&&r| r == 1).count();
            let total: u32 = self.recent_ranks.iter().sum();
            (
                Some(wins as f64 / form_len as f64),
                Some(total as f64 / form_len as f64),
            )
        } else {
            (None, None)
        };

        let overall = self.win_rate();
        let ratio = |bucket: BucketStats| {
            if bucket.runs == 0 {
                None
            } else if overall > 0.0 {
                Some(bucket.win_rate() / overall)
            } else {
                Some(0.0)
            }
        };

        let venue = self.venue(&entry.race.venue);
        ProfileEvidence {
            last5_win_rate,
            last5_avg_rank,
            track_specialization: ratio(self.surface(entry.surface)),
            distance_specialization: ratio(self.distance(entry.distance_bucket())),
            same_track_win_rate: (venue.runs > 0).then(|| venue.win_rate() / 100.0),
        }
    }
}

/// Read-only evidence derived from a profile, all ratios as fractions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileEvidence {
    /// Share of wins among the recent form list (0..1)
    pub last5_win_rate: Option<f64>,
    pub last5_avg_rank: Option<f64>,
    /// Surface win rate over overall win rate
    pub track_specialization: Option<f64>,
    /// Distance-bucket win rate over overall win rate
    pub distance_specialization: Option<f64>,
    /// Win rate at today's venue (0..1)
    pub same_track_win_rate: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RaceKey;

    fn result(day: u32, rank: Option<u32>, agf: Option<f64>) -> Runner {
        let race = RaceKey::new("Adana", NaiveDate::from_ymd_opt(2025, 6, day).unwrap(), 1);
        let mut r = Runner::new("Karayel", race, Surface::Dirt, 1400);
        r.finish_rank = rank;
        r.agf = agf;
        r
    }

    #[test]
    fn test_surprise_index_sequence() {
        let mut p = Profile::new("Karayel");
        p.update(&result(1, Some(1), Some(5.0)));
        assert!((p.surprise_index - 9.5).abs() < 1e-9, "got {}", p.surprise_index);

        p.update(&result(2, Some(3), Some(2.0)));
        assert!((p.surprise_index - 11.875).abs() < 1e-9, "got {}", p.surprise_index);
    }

    #[test]
    fn test_surprise_decays_without_bonus() {
        let mut p = Profile::new("Karayel");
        p.update(&result(1, Some(1), Some(5.0)));
        p.update(&result(2, Some(8), None));
        assert!((p.surprise_index - 9.025).abs() < 1e-9);
    }

    #[test]
    fn test_high_agf_win_gets_no_bonus() {
        let mut p = Profile::new("Karayel");
        p.update(&result(1, Some(1), Some(40.0)));
        assert_eq!(p.surprise_index, 0.0);
    }

    #[test]
    fn test_counts_and_rates() {
        let mut p = Profile::new("Karayel");
        p.update(&result(1, Some(1), None));
        p.update(&result(2, Some(4), None));
        p.update(&result(3, Some(7), None));
        p.update(&result(4, Some(2), None));

        assert_eq!(p.starts, 4);
        assert_eq!(p.wins, 1);
        assert_eq!(p.places, 3);
        assert_eq!(p.win_rate(), 25.0);
        assert_eq!(p.place_rate(), 75.0);
        assert_eq!(p.surface(Surface::Dirt).runs, 4);
        assert_eq!(p.distance(DistanceBucket::Short).wins, 1);
        assert_eq!(p.venue("adana").places, 3);
        assert_eq!(p.stat_line(), "1/4");
    }

    #[test]
    fn test_form_list_is_capped_and_most_recent_first() {
        let mut p = Profile::new("Karayel");
        for (day, rank) in [(1, 9), (2, 8), (3, 7), (4, 6), (5, 5), (6, 1)] {
            p.update(&result(day, Some(rank), None));
        }
        assert_eq!(p.recent_ranks, VecDeque::from(vec![1, 5, 6, 7, 8]));
    }

    #[test]
    fn test_unfinished_race_counts_start_but_not_form() {
        let mut p = Profile::new("Karayel");
        p.update(&result(1, None, Some(2.0)));
        assert_eq!(p.starts, 1);
        assert!(p.recent_ranks.is_empty());
        assert_eq!(p.wins, 0);
        assert_eq!(p.place_rate(), 0.0);
    }

    #[test]
    fn test_zero_starts_rates_are_zero() {
        let p = Profile::new("Karayel");
        assert_eq!(p.win_rate(), 0.0);
        assert_eq!(p.place_rate(), 0.0);
        assert_eq!(p.evidence_for(&result(1, None, None)), ProfileEvidence::default());
    }

    #[test]
    fn test_evidence_specialization_ratios() {
        let mut p = Profile::new("Karayel");
        p.update(&result(1, Some(1), None));
        p.update(&result(2, Some(1), None));

        let mut turf = result(3, Some(6), None);
        turf.surface = Surface::Turf;
        turf.distance_m = 2000;
        p.update(&turf);
        p.update(&result(4, Some(3), None));

        let ev = p.evidence_for(&result(5, None, None));
        // Dirt: 2 wins in 3 runs (66.7%) vs overall 2 in 4 (50%)
        let track = ev.track_specialization.unwrap();
        assert!((track - 4.0 / 3.0).abs() < 1e-9, "got {track}");
        assert_eq!(ev.last5_win_rate, Some(0.5));
        assert_eq!(ev.last5_avg_rank, Some(2.75));
        assert_eq!(ev.same_track_win_rate, Some(0.5));
    }
}
