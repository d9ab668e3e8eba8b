//! In-process store, used by tests and dry runs.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::{ProcessedYearLedger, SignalStore, StateYearStore};
use crate::types::{ProcessedYearMarker, SignalRecord, StateYearRecord};

#[derive(Default)]
struct Inner {
    processed: BTreeMap<i32, ProcessedYearMarker>,
    state_years: BTreeMap<String, BTreeMap<i32, StateYearRecord>>,
    signals: HashMap<String, BTreeMap<DateTime<Utc>, SignalRecord>>,
}

/// Keeps every entity kind in memory behind a single lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }

    /// Marker for `year`, if the year has been processed.
    pub fn marker(&self, year: i32) -> Result<Option<ProcessedYearMarker>> {
        Ok(self.lock()?.processed.get(&year).cloned())
    }

    /// Total number of stored state-year records across all states.
    pub fn state_year_count(&self) -> Result<usize> {
        Ok(self.lock()?.state_years.values().map(BTreeMap::len).sum())
    }
}

#[async_trait]
impl ProcessedYearLedger for MemoryStore {
    async fn is_year_processed(&self, year: i32) -> Result<bool> {
        Ok(self.lock()?.processed.contains_key(&year))
    }

    async fn mark_year_processed(&self, marker: ProcessedYearMarker) -> Result<()> {
        self.lock()?.processed.entry(marker.year).or_insert(marker);
        Ok(())
    }
}

#[async_trait]
impl StateYearStore for MemoryStore {
    async fn save_state_year_batch(&self, records: &[StateYearRecord]) -> Result<()> {
        for record in records {
            record.validate()?;
        }

        let mut inner = self.lock()?;
        for record in records {
            inner
                .state_years
                .entry(record.state.clone())
                .or_default()
                .entry(record.year)
                .or_insert_with(|| record.clone());
        }
        Ok(())
    }

    async fn get_all_state_year_records(&self, state: &str) -> Result<Vec<StateYearRecord>> {
        Ok(self
            .lock()?
            .state_years
            .get(state)
            .map(|years| years.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_states_with_any_data(&self) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .state_years
            .iter()
            .filter(|(_, years)| !years.is_empty())
            .map(|(state, _)| state.clone())
            .collect())
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn save_signal(&self, record: &SignalRecord) -> Result<()> {
        self.lock()?
            .signals
            .entry(record.state.clone())
            .or_default()
            .entry(record.timestamp)
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn get_all_signals(&self) -> Result<Vec<SignalRecord>> {
        let mut latest: Vec<SignalRecord> = self
            .lock()?
            .signals
            .values()
            .filter_map(|runs| runs.values().next_back().cloned())
            .collect();
        latest.sort_by(|a, b| a.state.cmp(&b.state));
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Trend;
    use chrono::Duration;

    fn signal(state: &str, at: DateTime<Utc>, score: f64) -> SignalRecord {
        SignalRecord {
            state: state.to_string(),
            timestamp: at,
            calculated_at: at,
            physical_slope: 0.0,
            physical_trend: Trend::Stable,
            ecommerce_slope: 0.0,
            ecommerce_trend: Trend::Stable,
            physical_score: score,
            ecommerce_score: score,
            data_points: 0,
            years_analyzed: 0,
        }
    }

    #[tokio::test]
    async fn test_mark_year_is_create_if_absent() {
        let store = MemoryStore::new();
        let first = ProcessedYearMarker {
            year: 2020,
            processed_at: Utc::now(),
            source_size: Some(10),
            record_count: 3,
        };
        let second = ProcessedYearMarker {
            record_count: 99,
            ..first.clone()
        };

        store.mark_year_processed(first).await.unwrap();
        store.mark_year_processed(second).await.unwrap();

        assert!(store.is_year_processed(2020).await.unwrap());
        assert_eq!(store.marker(2020).unwrap().unwrap().record_count, 3);
    }

    #[tokio::test]
    async fn test_empty_state_year_record_rejected() {
        let store = MemoryStore::new();
        let record = StateYearRecord {
            state: "CA".to_string(),
            year: 2020,
            timestamp: Utc::now(),
            brick_and_mortar_codes: HashMap::new(),
            ecommerce_codes: HashMap::new(),
        };
        assert!(store.save_state_year_batch(&[record]).await.is_err());
        assert_eq!(store.state_year_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_latest_signal_wins() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(5);

        store.save_signal(&signal("CA", t0, 10.0)).await.unwrap();
        store.save_signal(&signal("CA", t1, 20.0)).await.unwrap();
        store.save_signal(&signal("CA", t1, 99.0)).await.unwrap();

        let all = store.get_all_signals().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].physical_score, 20.0);
    }
}
