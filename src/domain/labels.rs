use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse per-runner risk tag from the decision engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTag {
    Low,
    Med,
    High,
    /// No usable history (cold start)
    Unknown,
}

impl RiskTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTag::Low => "LOW",
            RiskTag::Med => "MED",
            RiskTag::High => "HIGH",
            RiskTag::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RiskTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Race-relative categorical label assigned by the calibrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerLabel {
    Place,
    StrongFavorite,
    Banko,
    SurpriseCandidate,
}

impl RunnerLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerLabel::Place => "PLACE",
            RunnerLabel::StrongFavorite => "STRONG_FAVORITE",
            RunnerLabel::Banko => "BANKO",
            RunnerLabel::SurpriseCandidate => "SURPRISE_CANDIDATE",
        }
    }
}

impl fmt::Display for RunnerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coupon inclusion tag. `Wide` is always a superset of `Economy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponTag {
    Economy,
    Wide,
}

impl CouponTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponTag::Economy => "economy",
            CouponTag::Wide => "wide",
        }
    }
}

impl fmt::Display for CouponTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome-uncertainty classification of a whole race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaceRisk {
    Banko,
    Normal,
    SurpriseOpen,
    Risky,
    /// Any label the composer does not have a strategy for
    Unclassified,
}

impl RaceRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaceRisk::Banko => "BANKO",
            RaceRisk::Normal => "NORMAL",
            RaceRisk::SurpriseOpen => "SURPRISE_OPEN",
            RaceRisk::Risky => "RISKY",
            RaceRisk::Unclassified => "UNCLASSIFIED",
        }
    }

    /// Counts toward the chaos index
    pub fn is_chaotic(&self) -> bool {
        matches!(self, RaceRisk::Risky | RaceRisk::SurpriseOpen)
    }
}

impl fmt::Display for RaceRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
