use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Cursor;

use super::{SourceProvider, YearStream};

/// Serves yearly CSV bodies held in memory.
#[derive(Default)]
pub struct MemorySource {
    years: BTreeMap<i32, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_year(mut self, year: i32, body: impl Into<Vec<u8>>) -> Self {
        self.years.insert(year, body.into());
        self
    }
}

#[async_trait]
impl SourceProvider for MemorySource {
    async fn open_year_stream(&self, year: i32) -> Result<YearStream> {
        let body = self
            .years
            .get(&year)
            .ok_or_else(|| anyhow::anyhow!("no source for {year}"))?;
        Ok(Box::pin(Cursor::new(body.clone())))
    }

    async fn year_stream_size(&self, year: i32) -> Result<Option<u64>> {
        Ok(self.years.get(&year).map(|b| b.len() as u64))
    }

    async fn list_available_years(&self) -> Result<Vec<i32>> {
        Ok(self.years.keys().copied().collect())
    }
}
