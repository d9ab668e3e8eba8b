//! Export of computed signals.
//!
//! Signals can be written to a local CSV, gzip-compressed, and published to
//! S3 together with a JSON score index for downstream index builders.

pub mod s3;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use tracing::{debug, info};

use crate::analyzers::outliers::OutlierReport;
use crate::types::SignalRecord;

use self::s3::{write_bytes_to_s3, write_json_to_s3};

/// Scores published alongside the CSV export.
#[derive(Debug, Serialize)]
pub struct ScoreIndex {
    pub generated_at: DateTime<Utc>,
    pub physical: OutlierReport,
    pub ecommerce: HashMap<String, f64>,
}

/// Renders signal records as CSV with a single header line.
pub fn signals_to_csv(signals: &[SignalRecord]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(Vec::new());
    for signal in signals {
        writer.serialize(signal)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("finishing CSV buffer: {}", e.error()))
}

/// Writes signal records to `path`, replacing any previous export.
pub fn write_signals_csv(path: &str, signals: &[SignalRecord]) -> Result<()> {
    let body = signals_to_csv(signals)?;
    std::fs::write(path, &body).with_context(|| format!("writing {path}"))?;
    debug!(path, rows = signals.len(), "Signals written");
    Ok(())
}

pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Uploads the CSV export (optionally gzipped) and the score index under
/// `prefix` in `bucket`.
pub async fn publish_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    prefix: &str,
    signals: &[SignalRecord],
    index: &ScoreIndex,
    compress: bool,
) -> Result<()> {
    let prefix = prefix.trim_end_matches('/');
    let join = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        }
    };

    let csv = signals_to_csv(signals)?;
    let (body, key) = if compress {
        (gzip(&csv)?, join("signals.csv.gz"))
    } else {
        (csv, join("signals.csv"))
    };
    let content_type = if compress { "application/gzip" } else { "text/csv" };

    write_bytes_to_s3(client, bucket, &key, body, content_type).await?;
    write_json_to_s3(client, bucket, &join("scores.json"), index).await?;

    info!(bucket, key = %key, signals = signals.len(), "Signals published to S3");
    Ok(())
}
