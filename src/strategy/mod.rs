//! Strategy module
//!
//! The decision pipeline from raw profile scores to coupons.
//!
//! ## Pipeline
//!
//! - `decision` - heuristic scoring of today's program from profiles
//! - `calibrator` - race-relative percentiles, gaps, labels and coupon tags
//! - `race_risk` - entropy / gap classification of race uncertainty
//! - `reconciliation` - program lock that gates every coupon
//! - `composer` - risk-driven ticket selection with rationale
//! - `sequence` - six-leg economy / wide coupons
//! - `evaluation` - hit rates and coupon validation once results are known

pub mod calibrator;
pub mod composer;
pub mod decision;
pub mod evaluation;
pub mod race_risk;
pub mod rationale;
pub mod reconciliation;
pub mod sequence;
pub mod weighting;

pub use calibrator::{CalibratedRace, CalibratedRunner, ScoreCalibrator};
pub use composer::{Coupon, Pick, TicketComposer, TicketSelection};
pub use decision::{DecisionEngine, ScoredRunner};
pub use evaluation::{validate_coupon, CouponValidation, DailyMetrics, LegCheck, LegStatus, RiskBreakdown};
pub use race_risk::{shannon_entropy, RaceRiskClassifier, RaceRiskVerdict};
pub use rationale::generate_rationale;
pub use reconciliation::{Discrepancy, DiscrepancyKind, RaceProgram, ReconciliationLock, ReconciliationResult};
pub use sequence::{detect_sequences, SequenceBuilder, SequenceCoupon, SequenceLeg};
pub use weighting::{oracle_score, weights_for, Weights};
