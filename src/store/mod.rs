//! Local persistence of the last good rate table.

use crate::core::currency::RateSource;
use crate::core::rates::RateTable;
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::{debug, instrument};

const PARTITION: &str = "rates";
const SNAPSHOT_KEY: &str = "snapshot";

/// Keeps the whole rate table as one JSON snapshot in a fjall keyspace, so a
/// save replaces the previous table in a single write.
pub struct RateArchive {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl RateArchive {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open rate archive at {}", path.display()))?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .context("Failed to open rate archive partition")?;
        debug!("Opened rate archive at {}", path.display());
        Ok(Self {
            keyspace,
            partition,
        })
    }

    /// Returns the stored table, or an empty one if nothing was saved yet.
    #[instrument(name = "ArchiveLoad", skip(self))]
    pub fn load(&self) -> Result<RateTable> {
        read_snapshot(&self.partition)
    }

    #[instrument(name = "ArchiveSave", skip_all, fields(days = table.len()))]
    pub fn save(&self, table: &RateTable) -> Result<()> {
        let bytes = serde_json::to_vec(table).context("Failed to encode rate table")?;
        self.partition
            .insert(SNAPSHOT_KEY, bytes)
            .context("Failed to write rate archive")?;
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to flush rate archive")?;
        Ok(())
    }
}

fn read_snapshot(partition: &PartitionHandle) -> Result<RateTable> {
    match partition
        .get(SNAPSHOT_KEY)
        .context("Failed to read rate archive")?
    {
        Some(bytes) => {
            let table: RateTable =
                serde_json::from_slice(&bytes).context("Failed to decode archived rate table")?;
            debug!("Loaded {} archived rate dates", table.len());
            Ok(table)
        }
        None => {
            debug!("Rate archive is empty");
            Ok(RateTable::default())
        }
    }
}

#[async_trait]
impl RateSource for RateArchive {
    /// Reads the snapshot on the blocking pool, fjall I/O is synchronous.
    async fn fetch_table(&self) -> Result<RateTable> {
        let partition = self.partition.clone();
        tokio::task::spawn_blocking(move || read_snapshot(&partition))
            .await
            .context("Rate archive read task failed")?
    }
}
