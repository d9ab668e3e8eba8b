//! Providers of the yearly QCEW source files.

pub mod local;
pub mod memory;
pub mod s3;

pub use local::LocalDirSource;
pub use memory::MemorySource;
pub use s3::S3Source;

use anyhow::Result;
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Byte stream of one year's CSV.
pub type YearStream = Pin<Box<dyn AsyncRead + Send>>;

#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn open_year_stream(&self, year: i32) -> Result<YearStream>;

    /// Size in bytes, when the provider knows it. Only used for logging.
    async fn year_stream_size(&self, year: i32) -> Result<Option<u64>>;

    async fn list_available_years(&self) -> Result<Vec<i32>>;
}

/// Extracts the year from a file name such as `2021.annual.singlefile.csv`.
///
/// The name must start with exactly four digits followed by a non-digit or
/// the end of the name.
pub fn year_from_file_name(name: &str) -> Option<i32> {
    let digits = name.bytes().take_while(u8::is_ascii_digit).count();
    if digits != 4 {
        return None;
    }
    name[..4].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_from_file_name() {
        assert_eq!(year_from_file_name("2021.annual.singlefile.csv"), Some(2021));
        assert_eq!(year_from_file_name("2019.csv"), Some(2019));
        assert_eq!(year_from_file_name("20190.csv"), None);
        assert_eq!(year_from_file_name("qcew_2019.csv"), None);
        assert_eq!(year_from_file_name("201.csv"), None);
    }
}
