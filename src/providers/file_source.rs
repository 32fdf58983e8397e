use crate::core::currency::RateSource;
use crate::core::rates::RateTable;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Reads a rate table from a JSON file on disk.
pub struct JsonFileRateSource {
    path: PathBuf,
}

impl JsonFileRateSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RateSource for JsonFileRateSource {
    #[instrument(name = "FileRateFetch", skip(self), fields(path = %self.path.display()))]
    async fn fetch_table(&self) -> Result<RateTable> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read rate file: {}", self.path.display()))?;
        let table: RateTable = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse rate file: {}", self.path.display()))?;
        debug!("Read {} rate dates", table.len());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_table_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rates.json");
        fs::write(&path, r#"{"2024-01-01": {"CHF": 1.17}}"#).unwrap();

        let table = JsonFileRateSource::new(&path).fetch_table().await.unwrap();
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_and_invalid_files_are_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        let err = JsonFileRateSource::new(&missing)
            .fetch_table()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read rate file"));

        let invalid = dir.path().join("invalid.json");
        fs::write(&invalid, r#"{"not-a-date": {}}"#).unwrap();
        let err = JsonFileRateSource::new(&invalid)
            .fetch_table()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse rate file"));
    }
}
