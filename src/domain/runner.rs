use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Track surface of a race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Dirt,
    Turf,
    Synthetic,
    Unknown,
}

impl Surface {
    /// Parse a surface label. Accepts English names and the vendor program
    /// spellings (`KUM`, `ÇİM`, `SENTETİK`); anything unrecognised is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        if upper.contains("SENTET") || upper.contains("SYNTH") {
            Surface::Synthetic
        } else if upper.contains("ÇİM") || upper.contains("ÇIM") || upper.contains("CIM") || upper.contains("TURF") {
            Surface::Turf
        } else if upper.contains("KUM") || upper.contains("DIRT") {
            Surface::Dirt
        } else {
            Surface::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Dirt => "dirt",
            Surface::Turf => "turf",
            Surface::Synthetic => "synthetic",
            Surface::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Distance category used for profile breakdowns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceBucket {
    /// < 1600m
    Short,
    /// 1600m - 1900m
    Medium,
    /// > 1900m
    Long,
}

impl DistanceBucket {
    pub fn from_meters(distance_m: u32) -> Self {
        if distance_m < 1600 {
            DistanceBucket::Short
        } else if distance_m > 1900 {
            DistanceBucket::Long
        } else {
            DistanceBucket::Medium
        }
    }
}

/// Identity of one race occurrence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RaceKey {
    pub date: NaiveDate,
    pub venue: String,
    pub race_no: u32,
}

impl RaceKey {
    pub fn new(venue: impl Into<String>, date: NaiveDate, race_no: u32) -> Self {
        Self {
            date,
            venue: venue.into(),
            race_no,
        }
    }
}

impl fmt::Display for RaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} race {} ({})", self.venue, self.race_no, self.date)
    }
}

/// Per-runner probabilities and ratios supplied by an external scoring model.
///
/// Every field is optional; the pipeline never requires the oracle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleSignals {
    pub win_prob: Option<f64>,
    pub place_prob: Option<f64>,
    pub surprise_prob: Option<f64>,
    pub track_specialization: Option<f64>,
    pub distance_specialization: Option<f64>,
    pub surprise_reason: Option<String>,
}

impl OracleSignals {
    pub fn is_empty(&self) -> bool {
        *self == OracleSignals::default()
    }
}

/// One entrant in one race occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runner {
    pub name: String,
    pub race: RaceKey,
    pub surface: Surface,
    pub distance_m: u32,
    /// Public-confidence index (percentage-like, lower = less expected)
    pub agf: Option<f64>,
    /// Populated only once the race has run
    pub finish_rank: Option<u32>,
    pub jockey: Option<String>,
    #[serde(default)]
    pub signals: OracleSignals,
}

impl Runner {
    pub fn new(
        name: impl Into<String>,
        race: RaceKey,
        surface: Surface,
        distance_m: u32,
    ) -> Self {
        Self {
            name: name.into(),
            race,
            surface,
            distance_m,
            agf: None,
            finish_rank: None,
            jockey: None,
            signals: OracleSignals::default(),
        }
    }

    pub fn with_agf(mut self, agf: f64) -> Self {
        self.agf = Some(agf);
        self
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.finish_rank = Some(rank);
        self
    }

    pub fn with_signals(mut self, signals: OracleSignals) -> Self {
        self.signals = signals;
        self
    }

    /// The program entry for this runner: identical, with the outcome removed.
    pub fn as_entry(&self) -> Self {
        Self {
            finish_rank: None,
            ..self.clone()
        }
    }

    pub fn distance_bucket(&self) -> DistanceBucket {
        DistanceBucket::from_meters(self.distance_m)
    }
}
