//! JSON-on-disk store.
//!
//! Layout under the root directory:
//!
//! ```text
//! processed/<year>.json
//! state_years/<state>/<year>.json
//! signals/<state>/<timestamp_millis>.json
//! ```
//!
//! Every document is published create-if-absent through a hard link, so
//! retried or concurrent runs never overwrite or half-write something that is
//! already persisted.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{ProcessedYearLedger, SignalStore, StateYearStore};
use crate::types::{ProcessedYearMarker, SignalRecord, StateYearRecord};

pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn processed_path(&self, year: i32) -> PathBuf {
        self.root.join("processed").join(format!("{year}.json"))
    }

    fn state_year_dir(&self) -> PathBuf {
        self.root.join("state_years")
    }

    fn signal_dir(&self) -> PathBuf {
        self.root.join("signals")
    }
}

/// Writes `value` as a new file. Returns `false` if the file already existed.
///
/// The body goes to a sibling `.tmp` file first and is published with a hard
/// link, so `path` either holds a complete document or does not exist.
async fn create_json(path: &Path, value: &impl Serialize) -> Result<bool> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    if tokio::fs::try_exists(path).await? {
        debug!(path = %path.display(), "Document already exists, leaving it untouched");
        return Ok(false);
    }

    let body = serde_json::to_vec_pretty(value)?;
    let tmp = temp_path(path);

    let written = write_synced(&tmp, &body).await;
    let published = match written {
        Ok(()) => tokio::fs::hard_link(&tmp, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = tokio::fs::remove_file(&tmp).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %tmp.display(), error = %e, "Could not remove temp file");
        }
    }

    match published {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "Document already exists, leaving it untouched");
            Ok(false)
        }
        Err(e) => Err(e).with_context(|| format!("creating {}", path.display())),
    }
}

/// Unique sibling of `path` ending in `.tmp`, which listings ignore.
fn temp_path(path: &Path) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("doc");
    path.with_file_name(format!("{name}.{}.{n}.tmp", std::process::id()))
}

async fn write_synced(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(body).await?;
    file.flush().await?;
    file.sync_all().await
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("decoding {}", path.display()))
}

/// Lists `.json` files in `dir`, sorted by name. A missing directory is empty.
async fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("listing {}", dir.display())),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Lists subdirectory names of `dir`, sorted. A missing directory is empty.
async fn subdirs(dir: &Path) -> Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("listing {}", dir.display())),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[async_trait]
impl ProcessedYearLedger for FsStore {
    async fn is_year_processed(&self, year: i32) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.processed_path(year)).await?)
    }

    async fn mark_year_processed(&self, marker: ProcessedYearMarker) -> Result<()> {
        create_json(&self.processed_path(marker.year), &marker).await?;
        Ok(())
    }
}

#[async_trait]
impl StateYearStore for FsStore {
    async fn save_state_year_batch(&self, records: &[StateYearRecord]) -> Result<()> {
        for record in records {
            record.validate()?;
            let path = self
                .state_year_dir()
                .join(&record.state)
                .join(format!("{}.json", record.year));
            create_json(&path, record).await?;
        }
        Ok(())
    }

    async fn get_all_state_year_records(&self, state: &str) -> Result<Vec<StateYearRecord>> {
        let mut records = Vec::new();
        for path in json_files(&self.state_year_dir().join(state)).await? {
            records.push(read_json(&path).await?);
        }
        Ok(records)
    }

    async fn list_states_with_any_data(&self) -> Result<Vec<String>> {
        let mut states = Vec::new();
        for state in subdirs(&self.state_year_dir()).await? {
            if !json_files(&self.state_year_dir().join(&state)).await?.is_empty() {
                states.push(state);
            }
        }
        Ok(states)
    }
}

#[async_trait]
impl SignalStore for FsStore {
    async fn save_signal(&self, record: &SignalRecord) -> Result<()> {
        let path = self.signal_dir().join(&record.state).join(format!(
            "{:020}.json",
            record.timestamp.timestamp_millis()
        ));
        create_json(&path, record).await?;
        Ok(())
    }

    async fn get_all_signals(&self) -> Result<Vec<SignalRecord>> {
        let mut latest = Vec::new();
        for state in subdirs(&self.signal_dir()).await? {
            // Zero-padded millis sort chronologically by file name.
            if let Some(path) = json_files(&self.signal_dir().join(&state)).await?.pop() {
                latest.push(read_json(&path).await?);
            }
        }
        Ok(latest)
    }
}
