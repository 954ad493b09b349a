//! Race data sources
//!
//! The harness reads programs, results and history through [`RaceDataSource`];
//! [`InMemoryRaceSource`] serves them from runner rows loaded from CSV.

use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::domain::{OracleSignals, RaceKey, Runner, Surface};
use crate::error::{GanyanError, Result};
use crate::strategy::RaceProgram;

/// Read access to race data, partitioned by date
#[cfg_attr(test, mockall::automock)]
pub trait RaceDataSource: Send + Sync {
    /// Entries for `date` known to the data rows, finish ranks stripped.
    /// This is the set that gets scored.
    fn program(&self, date: NaiveDate) -> Vec<Runner>;

    /// Finished runners on `date`
    fn results(&self, date: NaiveDate) -> Vec<Runner>;

    /// Finished runners strictly before `date`
    fn history_before(&self, date: NaiveDate) -> Vec<Runner>;

    /// Authoritative entrant lists for `date`; the separate program when one
    /// was loaded, otherwise the data rows
    fn program_entries(&self, date: NaiveDate) -> RaceProgram;
}

// ============================================================================
// CSV loading
// ============================================================================

const MIN_COLUMNS: usize = 6;
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y"];

/// Load runner rows from CSV.
///
/// Expected format:
/// `date,venue,race_no,runner,surface,distance,agf,rank,jockey,win_prob,place_prob,surprise_prob,track_spec,dist_spec,surprise_reason`.
/// Columns after `distance` are optional, empty cells are `None`, and a rank
/// of 0 means the runner did not finish. Malformed rows are skipped.
pub fn load_runners_from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Runner>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut runners = Vec::new();
    let mut skipped = 0usize;

    for (i, line) in reader.lines().enumerate() {
        if i == 0 {
            continue; // Skip header
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match parse_row(&line, i + 1) {
            Ok(runner) => runners.push(runner),
            Err(e) => {
                warn!("Skipping {}", e);
                skipped += 1;
            }
        }
    }

    info!(
        "Loaded {} runner rows from {} ({} skipped)",
        runners.len(),
        path.display(),
        skipped
    );
    Ok(runners)
}

fn parse_row(line: &str, line_no: usize) -> Result<Runner> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    let malformed = |reason: &str| GanyanError::MalformedInput {
        line: line_no,
        reason: reason.to_string(),
    };

    if parts.len() < MIN_COLUMNS {
        return Err(malformed("insufficient columns"));
    }

    let date = parse_date(parts[0]).ok_or_else(|| malformed("invalid date"))?;
    let venue = parts[1];
    if venue.is_empty() {
        return Err(malformed("missing venue"));
    }
    let race_no: u32 = parts[2].parse().map_err(|_| malformed("invalid race number"))?;
    let name = parts[3];
    if name.is_empty() {
        return Err(malformed("missing runner name"));
    }
    let distance_m: u32 = parts[5]
        .trim_end_matches('m')
        .parse()
        .map_err(|_| malformed("invalid distance"))?;

    let cell = |idx: usize| parts.get(idx).copied().filter(|s| !s.is_empty());
    let number = |idx: usize| cell(idx).and_then(|s| s.parse::<f64>().ok());

    let mut runner = Runner::new(
        name,
        RaceKey::new(venue, date, race_no),
        Surface::parse(parts[4]),
        distance_m,
    );
    runner.agf = number(6);
    runner.finish_rank = cell(7).and_then(|s| s.parse::<u32>().ok()).filter(|&r| r > 0);
    runner.jockey = cell(8).map(str::to_string);
    runner.signals = OracleSignals {
        win_prob: number(9),
        place_prob: number(10),
        surprise_prob: number(11),
        track_specialization: number(12),
        distance_specialization: number(13),
        // Free text: keep any commas it contained
        surprise_reason: (parts.len() > 14)
            .then(|| parts[14..].join(","))
            .filter(|s| !s.is_empty()),
    };
    Ok(runner)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

// ============================================================================
// In-memory source
// ============================================================================

/// Data source over loaded runner rows
#[derive(Debug, Clone, Default)]
pub struct InMemoryRaceSource {
    rows: Vec<Runner>,
    /// Separate program rows; when absent the program is derived from `rows`
    program_rows: Option<Vec<Runner>>,
}

impl InMemoryRaceSource {
    pub fn new(mut rows: Vec<Runner>) -> Self {
        rows.sort_by(|a, b| a.race.cmp(&b.race));
        Self {
            rows,
            program_rows: None,
        }
    }

    pub fn with_program(mut self, mut program_rows: Vec<Runner>) -> Self {
        program_rows.sort_by(|a, b| a.race.cmp(&b.race));
        self.program_rows = Some(program_rows);
        self
    }

    /// Load results (and optionally a separate program) from CSV files
    pub fn from_csv(data: &Path, program: Option<&Path>) -> Result<Self> {
        let source = Self::new(load_runners_from_csv(data)?);
        match program {
            Some(p) => Ok(source.with_program(load_runners_from_csv(p)?)),
            None => Ok(source),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn program_rows(&self) -> &[Runner] {
        self.program_rows.as_deref().unwrap_or(&self.rows)
    }
}

impl RaceDataSource for InMemoryRaceSource {
    fn program(&self, date: NaiveDate) -> Vec<Runner> {
        let program: Vec<Runner> = self
            .rows
            .iter()
            .filter(|r| r.race.date == date)
            .map(Runner::as_entry)
            .collect();
        debug!("Program for {}: {} entries", date, program.len());
        program
    }

    fn results(&self, date: NaiveDate) -> Vec<Runner> {
        self.rows
            .iter()
            .filter(|r| r.race.date == date && r.finish_rank.is_some())
            .cloned()
            .collect()
    }

    fn history_before(&self, date: NaiveDate) -> Vec<Runner> {
        self.rows
            .iter()
            .filter(|r| r.race.date < date && r.finish_rank.is_some())
            .cloned()
            .collect()
    }

    fn program_entries(&self, date: NaiveDate) -> RaceProgram {
        let rows: Vec<Runner> = self
            .program_rows()
            .iter()
            .filter(|r| r.race.date == date)
            .cloned()
            .collect();
        RaceProgram::from_runners(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "date,venue,race_no,runner,surface,distance,agf,rank,jockey,win_prob,place_prob,surprise_prob,track_spec,dist_spec,surprise_reason";

    fn write_csv(body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("ganyan-src-{}.csv", uuid::Uuid::new_v4()));
        let mut f = File::create(&path).unwrap();
        writeln!(f, "{HEADER}").unwrap();
        write!(f, "{body}").unwrap();
        path
    }

    #[test]
    fn test_parse_full_row() {
        let row = "2025-06-01,Istanbul,3,Poyraz,Çim,1800,12.5,1,A. Kaya,0.31,0.6,0.1,1.3,,late closer, rain";
        let r = parse_row(row, 2).unwrap();
        assert_eq!(r.race, RaceKey::new("Istanbul", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), 3));
        assert_eq!(r.surface, Surface::Turf);
        assert_eq!(r.distance_m, 1800);
        assert_eq!(r.agf, Some(12.5));
        assert_eq!(r.finish_rank, Some(1));
        assert_eq!(r.jockey.as_deref(), Some("A. Kaya"));
        assert_eq!(r.signals.win_prob, Some(0.31));
        assert_eq!(r.signals.track_specialization, Some(1.3));
        assert_eq!(r.signals.distance_specialization, None);
        assert_eq!(r.signals.surprise_reason.as_deref(), Some("late closer,rain"));
    }

    #[test]
    fn test_parse_minimal_row() {
        let r = parse_row("01/06/2025,Bursa,1,Lodos,kum,1200", 2).unwrap();
        assert_eq!(r.surface, Surface::Dirt);
        assert_eq!(r.agf, None);
        assert_eq!(r.finish_rank, None);
        assert!(r.signals.is_empty());
    }

    #[test]
    fn test_zero_rank_is_unfinished() {
        let r = parse_row("2025-06-01,Bursa,1,Lodos,kum,1200,5,0", 2).unwrap();
        assert_eq!(r.finish_rank, None);
    }

    #[test]
    fn test_malformed_rows_rejected() {
        assert!(parse_row("2025-06-01,Bursa,1,Lodos", 2).is_err());
        assert!(parse_row("yesterday,Bursa,1,Lodos,kum,1200", 2).is_err());
        assert!(parse_row("2025-06-01,Bursa,x,Lodos,kum,1200", 2).is_err());
        assert!(parse_row("2025-06-01,Bursa,1,,kum,1200", 2).is_err());
        assert!(parse_row("2025-06-01,Bursa,1,Lodos,kum,far", 2).is_err());
    }

    #[test]
    fn test_load_skips_malformed() {
        let path = write_csv(
            "2025-06-01,Bursa,1,Lodos,kum,1200,5,1\n\
             broken line\n\
             2025-06-01,Bursa,1,Poyraz,kum,1200,30,2\n",
        );
        let rows = load_runners_from_csv(&path).unwrap();
        assert_eq!(rows.len(), 2);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = load_runners_from_csv("/nonexistent/ganyan.csv").unwrap_err();
        assert!(matches!(err, GanyanError::Io(_)));
    }

    #[test]
    fn test_in_memory_partitions_by_date() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 6, day).unwrap();
        let row = |name: &str, day, rank| {
            Runner::new(name, RaceKey::new("Bursa", d(day), 1), Surface::Dirt, 1200).with_rank(rank)
        };
        let source = InMemoryRaceSource::new(vec![
            row("B", 2, 1),
            row("A", 1, 1),
            row("C", 2, 2),
        ]);

        assert!(source.program(d(2)).iter().all(|r| r.finish_rank.is_none()));
        assert_eq!(source.results(d(2)).len(), 2);
        let history = source.history_before(d(2));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].name, "A");
        assert_eq!(source.history_before(d(1)).len(), 0);
        assert_eq!(
            source.program_entries(d(2)).entrants(&RaceKey::new("Bursa", d(2), 1)).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_separate_program_is_authoritative() {
        let d = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let key = RaceKey::new("Bursa", d, 1);
        let source = InMemoryRaceSource::new(vec![
            Runner::new("A", key.clone(), Surface::Dirt, 1200).with_rank(1),
        ])
        .with_program(vec![
            Runner::new("A", key.clone(), Surface::Dirt, 1200),
            Runner::new("Late", key.clone(), Surface::Dirt, 1200),
        ]);
        // Only rows with data get scored; the lock sees the full program
        let scored: Vec<String> = source.program(d).into_iter().map(|r| r.name).collect();
        assert_eq!(scored, vec!["A".to_string()]);
        assert_eq!(source.program_entries(d).entrants(&key).unwrap().len(), 2);
        assert_eq!(source.results(d).len(), 1);
    }
}
