pub mod analyzers;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod output;
pub mod source;
pub mod storage;
pub mod types;
