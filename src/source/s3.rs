use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{SourceProvider, YearStream, year_from_file_name};

/// Streams yearly CSV objects from an S3 bucket.
///
/// Objects under `prefix` whose file name starts with a four-digit year are
/// treated as that year's source, e.g. `qcew/2021.annual.singlefile.csv`.
pub struct S3Source {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3Source {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// All `(year, key)` pairs under the prefix, following continuation tokens.
    async fn year_keys(&self) -> Result<Vec<(i32, String)>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .with_context(|| format!("listing s3://{}/{}", self.bucket, self.prefix))?;

            for object in resp.contents() {
                let Some(key) = object.key() else { continue };
                if !key.ends_with(".csv") {
                    continue;
                }
                let file_name = key.rsplit('/').next().unwrap_or(key);
                if let Some(year) = year_from_file_name(file_name) {
                    keys.push((year, key.to_string()));
                }
            }

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated() == Some(true) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        keys.sort();
        debug!(bucket = %self.bucket, objects = keys.len(), "Listed yearly source objects");
        Ok(keys)
    }

    async fn key_for(&self, year: i32) -> Result<String> {
        self.year_keys()
            .await?
            .into_iter()
            .find(|(y, _)| *y == year)
            .map(|(_, key)| key)
            .ok_or_else(|| anyhow::anyhow!("no source object for {year} in s3://{}/{}", self.bucket, self.prefix))
    }
}

#[async_trait]
impl SourceProvider for S3Source {
    async fn open_year_stream(&self, year: i32) -> Result<YearStream> {
        let key = self.key_for(year).await?;
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .with_context(|| format!("fetching s3://{}/{}", self.bucket, key))?;

        Ok(Box::pin(resp.body.into_async_read()))
    }

    async fn year_stream_size(&self, year: i32) -> Result<Option<u64>> {
        let key = self.key_for(year).await?;
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .with_context(|| format!("inspecting s3://{}/{}", self.bucket, key))?;

        Ok(head.content_length().and_then(|len| u64::try_from(len).ok()))
    }

    async fn list_available_years(&self) -> Result<Vec<i32>> {
        let mut years: Vec<i32> = self.year_keys().await?.into_iter().map(|(y, _)| y).collect();
        years.dedup();
        Ok(years)
    }
}
