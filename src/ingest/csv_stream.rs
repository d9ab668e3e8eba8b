//! Streaming, bounded-memory CSV reader.
//!
//! QCEW singlefiles run to several gigabytes, so rows are parsed line by line
//! from an async byte stream and handed out in fixed-size batches. Nothing
//! but the current partial line and the not-yet-returned rows is held in
//! memory.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::errors::IngestError;

/// Cap on the buffered partial line before parsed rows are flushed early.
pub const MAX_PENDING_LINE_BYTES: usize = 1024 * 1024;

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// One parsed data line, fields in header order.
pub type CsvRow = Vec<String>;

/// Reads a header line followed by data lines and yields them in batches.
///
/// The reader is forward-only: once a batch has been returned it is never
/// produced again, and after `next_batch` returns `Ok(None)` the source is
/// exhausted.
pub struct CsvBatchReader<R> {
    reader: R,
    batch_size: usize,
    max_pending_bytes: usize,
    chunk: Vec<u8>,
    pending: Vec<u8>,
    rows: Vec<CsvRow>,
    header: Option<Arc<[String]>>,
    line_number: usize,
    skipped_lines: usize,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin> CsvBatchReader<R> {
    pub fn new(reader: R, batch_size: usize) -> Self {
        Self {
            reader,
            batch_size: batch_size.max(1),
            max_pending_bytes: MAX_PENDING_LINE_BYTES,
            chunk: vec![0; READ_CHUNK_BYTES],
            pending: Vec::new(),
            rows: Vec::new(),
            header: None,
            line_number: 0,
            skipped_lines: 0,
            exhausted: false,
        }
    }

    /// Overrides the pending-line cap. Mostly useful for exercising the
    /// early-flush path without megabytes of input.
    pub fn with_max_pending_bytes(mut self, max_pending_bytes: usize) -> Self {
        self.max_pending_bytes = max_pending_bytes;
        self
    }

    /// Column names from the header line, once it has been read.
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Number of data lines dropped for having the wrong field count.
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Returns the next batch of at most `batch_size` rows, or `None` when the
    /// stream is exhausted.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<CsvRow>>, IngestError> {
        loop {
            if self.rows.len() >= self.batch_size {
                let rest = self.rows.split_off(self.batch_size);
                return Ok(Some(std::mem::replace(&mut self.rows, rest)));
            }

            if self.exhausted {
                if self.rows.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.rows)));
            }

            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                self.exhausted = true;
                let tail = std::mem::take(&mut self.pending);
                self.consume_line(&tail)?;
                debug!(
                    lines = self.line_number,
                    skipped = self.skipped_lines,
                    "CSV source exhausted"
                );
                continue;
            }

            self.pending.extend_from_slice(&self.chunk[..n]);
            self.drain_complete_lines()?;

            if self.pending.len() > self.max_pending_bytes && !self.rows.is_empty() {
                warn!(
                    pending_bytes = self.pending.len(),
                    rows = self.rows.len(),
                    "Partial line exceeds buffer cap, flushing parsed rows early"
                );
                let rest = self.rows.split_off(self.rows.len().min(self.batch_size));
                return Ok(Some(std::mem::replace(&mut self.rows, rest)));
            }
        }
    }

    fn drain_complete_lines(&mut self) -> Result<(), IngestError> {
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let line = std::mem::take(&mut self.pending);
            let result = self.consume_line(&line[start..end]);
            self.pending = line;
            result?;
            start = end + 1;
        }
        self.pending.drain(..start);
        Ok(())
    }

    fn consume_line(&mut self, raw: &[u8]) -> Result<(), IngestError> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw);
        if line.trim().is_empty() {
            return Ok(());
        }
        self.line_number += 1;

        let fields = split_fields(&line);

        let Some(header) = &self.header else {
            if fields.iter().all(|f| f.is_empty()) {
                return Err(IngestError::MalformedSource(
                    "header line has no column names".to_string(),
                ));
            }
            debug!(columns = fields.len(), "CSV header parsed");
            self.header = Some(fields.into());
            return Ok(());
        };

        if fields.len() != header.len() {
            self.skipped_lines += 1;
            debug!(
                line = self.line_number,
                expected = header.len(),
                found = fields.len(),
                "Skipping line with wrong field count"
            );
            return Ok(());
        }

        self.rows.push(fields);
        Ok(())
    }
}

/// Splits one line on commas outside double quotes.
///
/// A `""` inside a quoted section is a literal quote. Every field is trimmed.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}
