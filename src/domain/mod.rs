pub mod labels;
pub mod runner;

pub use labels::*;
pub use runner::*;
