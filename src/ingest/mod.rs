//! Yearly source ingestion.
//!
//! A QCEW singlefile is streamed in batches, reduced to statewide retail rows,
//! classified into brick-and-mortar and e-commerce industries, and summed per
//! state before being persisted as one record per state for the year.

pub mod aggregate;
pub mod classify;
pub mod csv_stream;
pub mod row;
pub mod validate;
pub mod year;

pub use year::{IngestCounts, YearOutcome, YearProcessor};
