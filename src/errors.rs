use std::io;

use thiserror::Error;

/// Failures that make a yearly source file unusable as a whole.
///
/// Row-level problems (wrong column count, bad values) never surface here;
/// those rows are skipped and counted by the reader.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed source: {0}")]
    MalformedSource(String),
    #[error("source header is missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error(transparent)]
    Io(#[from] io::Error),
}
