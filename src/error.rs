use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::RaceKey;

/// Main error type for the race decision pipeline
#[derive(Error, Debug)]
pub enum GanyanError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Input data errors
    #[error("Malformed input at line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    // Program / reconciliation errors
    #[error("No program found for {date}{}", venue.as_deref().map(|v| format!(" at {v}")).unwrap_or_default())]
    NoProgram {
        date: NaiveDate,
        venue: Option<String>,
    },

    #[error("Race missing from program: {race}")]
    RaceMissingFromProgram { race: RaceKey },

    #[error("Data incomplete for {race}: missing entrants [{}]", missing.join(", "))]
    DataIncomplete { race: RaceKey, missing: Vec<String> },

    #[error("No multi-leg sequence can be formed at {venue} on {date}; available races: {available:?}")]
    NoSequence {
        venue: String,
        date: NaiveDate,
        available: Vec<u32>,
    },

    // Persistence errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    // Generic errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GanyanError {
    /// Whether this error only terminates the current unit of work (a date or a
    /// coupon request) rather than the whole run.
    pub fn is_unit_scoped(&self) -> bool {
        matches!(
            self,
            GanyanError::NoProgram { .. }
                | GanyanError::RaceMissingFromProgram { .. }
                | GanyanError::DataIncomplete { .. }
                | GanyanError::NoSequence { .. }
        )
    }
}

/// Result type alias for GanyanError
pub type Result<T> = std::result::Result<T, GanyanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_incomplete_lists_missing_entrants() {
        let race = RaceKey::new("Adana", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), 3);
        let err = GanyanError::DataIncomplete {
            race,
            missing: vec!["Karayel".to_string(), "Poyraz".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Karayel, Poyraz"), "got: {msg}");
        assert!(msg.contains("Adana"), "got: {msg}");
        assert!(err.is_unit_scoped());
    }

    #[test]
    fn test_no_program_message_with_and_without_venue() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let plain = GanyanError::NoProgram { date, venue: None };
        assert_eq!(plain.to_string(), "No program found for 2025-06-01");

        let at_venue = GanyanError::NoProgram {
            date,
            venue: Some("Bursa".to_string()),
        };
        assert_eq!(at_venue.to_string(), "No program found for 2025-06-01 at Bursa");
    }

    #[test]
    fn test_io_error_is_not_unit_scoped() {
        let err = GanyanError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(!err.is_unit_scoped());
    }
}
