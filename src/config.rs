//! Pipeline tuning knobs, read from the environment (`.env` supported).

use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

use crate::analyzers::categorize::TREND_THRESHOLD;
use crate::analyzers::outliers::DEFAULT_STD_MULTIPLE;

pub const DEFAULT_INGEST_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_SIGNAL_BATCH_SIZE: usize = 5;
pub const DEFAULT_SIGNAL_BATCH_PAUSE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Rows per batch pulled from a yearly source.
    pub ingest_batch_size: usize,
    /// States computed concurrently per signal batch.
    pub signal_batch_size: usize,
    pub signal_batch_pause: Duration,
    pub trend_threshold: f64,
    pub outlier_std_multiple: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ingest_batch_size: DEFAULT_INGEST_BATCH_SIZE,
            signal_batch_size: DEFAULT_SIGNAL_BATCH_SIZE,
            signal_batch_pause: DEFAULT_SIGNAL_BATCH_PAUSE,
            trend_threshold: TREND_THRESHOLD,
            outlier_std_multiple: DEFAULT_STD_MULTIPLE,
        }
    }
}

impl PipelineConfig {
    /// Builds the config from environment variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            ingest_batch_size: parse_var("INGEST_BATCH_SIZE", lookup("INGEST_BATCH_SIZE"), defaults.ingest_batch_size)?,
            signal_batch_size: parse_var("SIGNAL_BATCH_SIZE", lookup("SIGNAL_BATCH_SIZE"), defaults.signal_batch_size)?,
            signal_batch_pause: Duration::from_millis(parse_var(
                "SIGNAL_BATCH_PAUSE_MS",
                lookup("SIGNAL_BATCH_PAUSE_MS"),
                defaults.signal_batch_pause.as_millis() as u64,
            )?),
            trend_threshold: parse_var("TREND_THRESHOLD", lookup("TREND_THRESHOLD"), defaults.trend_threshold)?,
            outlier_std_multiple: parse_var(
                "OUTLIER_STD_MULTIPLE",
                lookup("OUTLIER_STD_MULTIPLE"),
                defaults.outlier_std_multiple,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingest_batch_size == 0 {
            anyhow::bail!("INGEST_BATCH_SIZE must be at least 1");
        }
        if self.signal_batch_size == 0 {
            anyhow::bail!("SIGNAL_BATCH_SIZE must be at least 1");
        }
        if !(self.trend_threshold.is_finite() && self.trend_threshold >= 0.0) {
            anyhow::bail!("TREND_THRESHOLD must be a non-negative number");
        }
        if !(self.outlier_std_multiple.is_finite() && self.outlier_std_multiple > 0.0) {
            anyhow::bail!("OUTLIER_STD_MULTIPLE must be a positive number");
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {name}: {value:?}")),
    }
}
