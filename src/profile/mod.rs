//! Temporal entrant profiles
//!
//! - `entrant` - one entrant's cumulative statistics and derived evidence
//! - `store` - the run-scoped collection, fed strictly in date order

pub mod entrant;
pub mod store;

pub use entrant::{BucketStats, Profile, ProfileEvidence};
pub use store::ProfileStore;
