use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ingest::aggregate::YearAccumulator;
use crate::ingest::classify::classify;
use crate::ingest::csv_stream::CsvBatchReader;
use crate::ingest::row::{QcewColumns, RawRow};
use crate::ingest::validate::{StateValidation, validate_state_record};
use crate::source::SourceProvider;
use crate::storage::{ProcessedYearLedger, StateYearStore};
use crate::types::ProcessedYearMarker;

/// Row counters for one year's ingest.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestCounts {
    pub rows: usize,
    pub skipped_lines: usize,
    pub valid_rows: usize,
    pub contributions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YearOutcome {
    AlreadyProcessed,
    Processed { records: usize, counts: IngestCounts },
}

/// Ingests yearly sources into per-state records, at most once per year.
pub struct YearProcessor {
    source: Arc<dyn SourceProvider>,
    ledger: Arc<dyn ProcessedYearLedger>,
    store: Arc<dyn StateYearStore>,
    batch_size: usize,
}

impl YearProcessor {
    pub fn new(
        source: Arc<dyn SourceProvider>,
        ledger: Arc<dyn ProcessedYearLedger>,
        store: Arc<dyn StateYearStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            ledger,
            store,
            batch_size,
        }
    }

    /// Processes every available year in ascending order, one at a time.
    ///
    /// The first failing year aborts the run; years already persisted stay
    /// persisted and are skipped by the ledger check on the next run.
    pub async fn process_all_years(&self) -> Result<Vec<(i32, YearOutcome)>> {
        let mut years = self
            .source
            .list_available_years()
            .await
            .context("listing available years")?;
        years.sort_unstable();
        years.dedup();

        info!(years = ?years, "Processing yearly sources");

        let mut outcomes = Vec::with_capacity(years.len());
        for year in years {
            let outcome = self
                .process_year(year)
                .await
                .with_context(|| format!("processing year {year}"))?;
            outcomes.push((year, outcome));
        }

        Ok(outcomes)
    }

    #[tracing::instrument(skip(self))]
    pub async fn process_year(&self, year: i32) -> Result<YearOutcome> {
        if self.ledger.is_year_processed(year).await? {
            info!("Year already processed, skipping");
            return Ok(YearOutcome::AlreadyProcessed);
        }

        let source_size = match self.source.year_stream_size(year).await {
            Ok(size) => size,
            Err(e) => {
                warn!(error = %e, "Could not determine source size");
                None
            }
        };
        info!(source_bytes = ?source_size, "Streaming yearly source");

        let stream = self.source.open_year_stream(year).await?;
        let mut reader = CsvBatchReader::new(stream, self.batch_size);
        let mut accumulator = YearAccumulator::default();
        let mut columns: Option<QcewColumns> = None;
        let mut counts = IngestCounts::default();

        while let Some(batch) = reader.next_batch().await? {
            let cols = match columns {
                Some(cols) => cols,
                None => {
                    let cols = QcewColumns::resolve(reader.header().unwrap_or_default())?;
                    columns = Some(cols);
                    cols
                }
            };

            for fields in batch {
                counts.rows += 1;
                let row = RawRow::from_fields(&cols, fields);

                let StateValidation::Valid { state_abbr, retail_lq } = validate_state_record(&row) else {
                    continue;
                };
                counts.valid_rows += 1;

                let tag = classify(&row.industry_code);
                counts.contributions += accumulator.add(state_abbr, &row.industry_code, retail_lq, tag);
            }

            debug!(
                rows = counts.rows,
                valid = counts.valid_rows,
                states = accumulator.state_count(),
                "Batch aggregated"
            );
        }
        counts.skipped_lines = reader.skipped_lines();

        // A header without any usable rows still has to carry the required columns.
        if columns.is_none() {
            if let Some(header) = reader.header() {
                QcewColumns::resolve(header)?;
            }
        }

        let records = accumulator.into_records(year, Utc::now());
        if !records.is_empty() {
            self.store
                .save_state_year_batch(&records)
                .await
                .context("saving state-year records")?;
        }

        self.ledger
            .mark_year_processed(ProcessedYearMarker {
                year,
                processed_at: Utc::now(),
                source_size,
                record_count: records.len(),
            })
            .await
            .context("marking year processed")?;

        info!(
            records = records.len(),
            rows = counts.rows,
            valid = counts.valid_rows,
            skipped_lines = counts.skipped_lines,
            "Year processed"
        );

        Ok(YearOutcome::Processed {
            records: records.len(),
            counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::IngestError;
    use crate::source::MemorySource;
    use crate::storage::MemoryStore;

    const HEADER: &str = "\"area_fips\",\"own_code\",\"industry_code\",\"year\",\"lq_annual_avg_emplvl\"\n";

    fn processor(source: MemorySource, store: &Arc<MemoryStore>) -> YearProcessor {
        YearProcessor::new(Arc::new(source), store.clone(), store.clone(), 2)
    }

    #[tokio::test]
    async fn test_process_year_aggregates_and_marks() {
        let body = format!(
            "{HEADER}\
             \"06000\",\"5\",\"445\",\"2021\",\"1.0\"\n\
             \"06000\",\"5\",\"445\",\"2021\",\"1.5\"\n\
             \"06000\",\"5\",\"4541\",\"2021\",\"0.8\"\n\
             \"06037\",\"5\",\"445\",\"2021\",\"9.0\"\n\
             \"48000\",\"5\",\"722\",\"2021\",\"1.1\"\n\
             \"48000\",\"5\",\"445\",\"2021\",\"0\"\n\
             \"06000\",\"5\",\"445\"\n"
        );
        let store = Arc::new(MemoryStore::new());
        let processor = processor(MemorySource::new().with_year(2021, body), &store);

        let outcome = processor.process_year(2021).await.unwrap();
        let YearOutcome::Processed { records, counts } = outcome else {
            panic!("expected a processed year");
        };

        assert_eq!(records, 1);
        assert_eq!(counts.rows, 6);
        assert_eq!(counts.skipped_lines, 1);
        assert_eq!(counts.valid_rows, 4);
        assert_eq!(counts.contributions, 3);

        let ca = store.get_all_state_year_records("CA").await.unwrap();
        assert_eq!(ca[0].brick_and_mortar_codes["445"], 2.5);
        assert_eq!(ca[0].ecommerce_codes["4541"], 0.8);
        assert!(store.get_all_state_year_records("TX").await.unwrap().is_empty());

        let marker = store.marker(2021).unwrap().unwrap();
        assert_eq!(marker.record_count, 1);
        assert!(marker.source_size.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_processed_year_is_skipped() {
        let body = format!("{HEADER}\"06000\",\"5\",\"445\",\"2021\",\"1.0\"\n");
        let store = Arc::new(MemoryStore::new());
        let processor = processor(MemorySource::new().with_year(2021, body), &store);

        processor.process_year(2021).await.unwrap();
        let again = processor.process_year(2021).await.unwrap();

        assert_eq!(again, YearOutcome::AlreadyProcessed);
        assert_eq!(store.state_year_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_column_fails_year_without_marking() {
        let body = "area_fips,industry_code,year\n06000,445,2021\n";
        let store = Arc::new(MemoryStore::new());
        let processor = processor(MemorySource::new().with_year(2021, body), &store);

        let err = processor.process_year(2021).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IngestError>(),
            Some(IngestError::MissingColumn(_))
        ));
        assert!(!store.is_year_processed(2021).await.unwrap());
    }

    #[tokio::test]
    async fn test_header_without_rows_is_still_checked() {
        for body in ["foo,bar\n", "foo,bar\n1,2,3\n4\n"] {
            let store = Arc::new(MemoryStore::new());
            let processor = processor(MemorySource::new().with_year(2021, body), &store);

            let err = processor.process_year(2021).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<IngestError>(),
                Some(IngestError::MissingColumn(_))
            ));
            assert!(!store.is_year_processed(2021).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_header_only_year_with_required_columns_is_marked() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor(MemorySource::new().with_year(2021, HEADER), &store);

        let outcome = processor.process_year(2021).await.unwrap();
        assert!(matches!(outcome, YearOutcome::Processed { records: 0, .. }));
        assert_eq!(store.marker(2021).unwrap().unwrap().record_count, 0);
    }

    #[tokio::test]
    async fn test_malformed_year_aborts_run() {
        let store = Arc::new(MemoryStore::new());
        let good = format!("{HEADER}\"06000\",\"5\",\"445\",\"2020\",\"1.0\"\n");
        let bad = "\n , \n";
        let source = MemorySource::new().with_year(2020, good).with_year(2021, bad);
        let processor = processor(source, &store);

        assert!(processor.process_all_years().await.is_err());
        assert!(store.is_year_processed(2020).await.unwrap());
        assert!(!store.is_year_processed(2021).await.unwrap());
    }
}
