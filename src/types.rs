//! Records shared between the ingestion side and the signal side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The two retail categories every industry code may belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    BrickAndMortar,
    Ecommerce,
}

/// Per-state, per-year location quotient sums, as persisted after a year run.
///
/// Records are append-only: a later year adds a new record, it never edits
/// an older one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateYearRecord {
    pub state: String,
    pub year: i32,
    pub timestamp: DateTime<Utc>,
    pub brick_and_mortar_codes: HashMap<String, f64>,
    pub ecommerce_codes: HashMap<String, f64>,
}

impl StateYearRecord {
    pub fn codes(&self, category: Category) -> &HashMap<String, f64> {
        match category {
            Category::BrickAndMortar => &self.brick_and_mortar_codes,
            Category::Ecommerce => &self.ecommerce_codes,
        }
    }

    /// A record must carry at least one industry code in either category.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.brick_and_mortar_codes.is_empty() && self.ecommerce_codes.is_empty() {
            anyhow::bail!(
                "state-year record {}/{} has no industry codes",
                self.state,
                self.year
            );
        }
        Ok(())
    }
}

/// Ledger entry written once a year's source has been fully ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedYearMarker {
    pub year: i32,
    pub processed_at: DateTime<Utc>,
    pub source_size: Option<u64>,
    pub record_count: usize,
}

/// Direction of a fitted LQ trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Declining,
    Stable,
    Growing,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trend::Declining => "declining",
            Trend::Stable => "stable",
            Trend::Growing => "growing",
        };
        f.write_str(label)
    }
}

/// Trend figures for one state, before cross-state normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSignal {
    pub state: String,
    pub physical_slope: f64,
    pub ecommerce_slope: f64,
    pub physical_trend: Trend,
    pub ecommerce_trend: Trend,
    pub data_points: usize,
    pub years_analyzed: usize,
}

/// Final per-state signal. A new calculation run supersedes the previous one.
///
/// Slopes and scores may be NaN for degenerate inputs. JSON writes NaN as
/// `null`, so those fields read `null` back as NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub state: String,
    pub timestamp: DateTime<Utc>,
    pub calculated_at: DateTime<Utc>,
    #[serde(deserialize_with = "f64_or_nan")]
    pub physical_slope: f64,
    pub physical_trend: Trend,
    #[serde(deserialize_with = "f64_or_nan")]
    pub ecommerce_slope: f64,
    pub ecommerce_trend: Trend,
    #[serde(deserialize_with = "f64_or_nan")]
    pub physical_score: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub ecommerce_score: f64,
    pub data_points: usize,
    pub years_analyzed: usize,
}

fn f64_or_nan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}
