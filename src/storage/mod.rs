//! Persistence contracts used by the pipeline.
//!
//! Each persisted entity kind gets its own narrow trait. [`FsStore`] keeps
//! JSON documents on disk; [`MemoryStore`] keeps everything in process.

pub mod fs;
pub mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{ProcessedYearMarker, SignalRecord, StateYearRecord};

/// Remembers which yearly source files have been fully ingested.
#[async_trait]
pub trait ProcessedYearLedger: Send + Sync {
    async fn is_year_processed(&self, year: i32) -> Result<bool>;

    /// Create-if-absent: marking an already marked year is a silent no-op.
    async fn mark_year_processed(&self, marker: ProcessedYearMarker) -> Result<()>;
}

/// Append-only store of per-state, per-year LQ sums.
#[async_trait]
pub trait StateYearStore: Send + Sync {
    async fn save_state_year_batch(&self, records: &[StateYearRecord]) -> Result<()>;

    async fn get_all_state_year_records(&self, state: &str) -> Result<Vec<StateYearRecord>>;

    async fn list_states_with_any_data(&self) -> Result<Vec<String>>;
}

/// Store of computed signals. Reads return the latest record per state.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Create-if-absent per `(state, timestamp)`; a duplicate is a no-op.
    async fn save_signal(&self, record: &SignalRecord) -> Result<()>;

    async fn get_all_signals(&self) -> Result<Vec<SignalRecord>>;
}
