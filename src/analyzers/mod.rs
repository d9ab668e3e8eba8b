//! Trend and score analysis over stored state-year data.
//!
//! Each state's industry codes are fitted with a linear LQ trend, combined
//! into one slope per category, normalized across states into 0-100 scores,
//! and passed through outlier correction on the way out.

pub mod categorize;
pub mod normalize;
pub mod outliers;
pub mod signal;
pub mod trend;
pub mod utility;

pub use signal::{SignalCalculator, SignalRunSummary};
