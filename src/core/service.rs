//! Shared, atomically replaceable rate table with resolution and aggregation
//! entry points for callers.

use crate::core::aggregate::{self, Bucket, CategorizedRecord, Granularity, MoneyRecord};
use crate::core::currency::{CurrencyCode, RateSource};
use crate::core::rates::RateTable;
use crate::core::seed::seed_table;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Owns the current rate table snapshot.
///
/// Readers take a cheap `Arc` clone and compute without holding the lock, so
/// they always see either the previous or the next table in full.
pub struct RateService {
    table: RwLock<Arc<RateTable>>,
}

impl RateService {
    /// Creates the service, falling back to the bundled seed if `initial` is
    /// empty.
    pub fn new(initial: RateTable) -> Self {
        Self {
            table: RwLock::new(Arc::new(non_empty_or_seed(initial))),
        }
    }

    pub fn snapshot(&self) -> Arc<RateTable> {
        let guard = self.table.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Publishes `table` as a whole, replacing the previous one.
    pub fn replace(&self, table: RateTable) {
        let next = Arc::new(non_empty_or_seed(table));
        let days = next.len();
        let mut guard = self.table.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
        debug!("Published rate table with {days} dates");
    }

    /// Fetches a full snapshot from `source` and publishes it.
    ///
    /// Tables whose dates carry different currency sets are rejected. On
    /// failure the current table stays in place and the error is returned.
    #[instrument(name = "RateRefresh", skip_all)]
    pub async fn refresh(&self, source: &dyn RateSource) -> Result<usize> {
        let fetched = source
            .fetch_table()
            .await
            .and_then(|table| table.validate().map(|()| table));
        match fetched {
            Ok(table) => {
                self.replace(table);
                let days = self.snapshot().len();
                info!("Rate table refreshed, {days} dates available");
                Ok(days)
            }
            Err(e) => {
                warn!("Rate refresh failed, keeping previous table: {e:#}");
                Err(e).context("Failed to refresh rate table")
            }
        }
    }

    /// Conversion rate from `source` to `counter` on `date`, `None` if unknown.
    pub fn resolve_rate(
        &self,
        source: &CurrencyCode,
        counter: &CurrencyCode,
        date: NaiveDate,
    ) -> Option<Decimal> {
        self.snapshot().resolve(source, counter, date)
    }

    pub fn aggregate_by_category<'a, R, I>(
        &self,
        records: I,
        target: &CurrencyCode,
    ) -> Vec<Bucket<String>>
    where
        R: CategorizedRecord + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        aggregate::by_category(&self.snapshot(), records, target)
    }

    pub fn aggregate_by_time<'a, R, I>(
        &self,
        records: I,
        granularity: Granularity,
        target: &CurrencyCode,
    ) -> Vec<Bucket<NaiveDate>>
    where
        R: MoneyRecord + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        aggregate::by_time(&self.snapshot(), records, granularity, target)
    }
}

impl Default for RateService {
    fn default() -> Self {
        Self::new(RateTable::default())
    }
}

fn non_empty_or_seed(table: RateTable) -> RateTable {
    if table.is_empty() {
        warn!("Rate table is empty, using bundled seed rates");
        seed_table()
    } else {
        table
    }
}

/// Refreshes `service` from `source` whenever a change is signalled on
/// `changes`. Notifications that pile up during a refresh collapse into one.
/// The task exits once every sender is dropped.
///
/// The CLI refreshes once per invocation and does not use this. It is meant
/// for long running hosts that embed [`RateService`] and learn about rate
/// updates from elsewhere, such as a webhook or a file watcher.
pub fn spawn_refresh_listener(
    service: Arc<RateService>,
    source: Arc<dyn RateSource>,
    mut changes: mpsc::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while changes.recv().await.is_some() {
            while changes.try_recv().is_ok() {}
            if let Err(e) = service.refresh(source.as_ref()).await {
                debug!("Background refresh skipped: {e:#}");
            }
        }
        debug!("Rate change channel closed, refresh listener stopping");
    })
}
