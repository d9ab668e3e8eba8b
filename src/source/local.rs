use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use super::{SourceProvider, YearStream, year_from_file_name};

/// Reads yearly CSV files from a local directory. A file belongs to a year
/// when its name starts with that year and ends in `.csv`.
pub struct LocalDirSource {
    dir: PathBuf,
}

impl LocalDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn year_files(&self) -> Result<Vec<(i32, PathBuf)>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("listing source directory {}", self.dir.display()))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let year = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(year_from_file_name);
            if let Some(year) = year {
                files.push((year, path));
            }
        }
        files.sort();
        Ok(files)
    }

    async fn path_for(&self, year: i32) -> Result<PathBuf> {
        self.year_files()
            .await?
            .into_iter()
            .find(|(y, _)| *y == year)
            .map(|(_, path)| path)
            .ok_or_else(|| anyhow::anyhow!("no source file for {year} in {}", self.dir.display()))
    }
}

#[async_trait]
impl SourceProvider for LocalDirSource {
    async fn open_year_stream(&self, year: i32) -> Result<YearStream> {
        let path = self.path_for(year).await?;
        let file = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(Box::pin(file))
    }

    async fn year_stream_size(&self, year: i32) -> Result<Option<u64>> {
        let path = self.path_for(year).await?;
        Ok(Some(tokio::fs::metadata(&path).await?.len()))
    }

    async fn list_available_years(&self) -> Result<Vec<i32>> {
        let mut years: Vec<i32> = self.year_files().await?.into_iter().map(|(y, _)| y).collect();
        years.dedup();
        Ok(years)
    }
}
