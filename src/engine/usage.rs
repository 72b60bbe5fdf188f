use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::storage::StateStore;

/// Weekly usage counters, write-through to durable storage
///
/// Counters are keyed by (site, week-id) and only ever grow within a
/// week; moving to a new week-id starts a fresh bucket. Historical
/// buckets are retained.
pub struct UsageStore {
    minutes: BTreeMap<String, u64>,
    store: Arc<dyn StateStore>,
}

impl UsageStore {
    /// Load the usage table from the backing store
    pub fn open(store: Arc<dyn StateStore>) -> Result<Self> {
        let minutes = store.load_usage().context("Failed to load usage table")?;
        Ok(Self { minutes, store })
    }

    fn key(site: &str, week: NaiveDate) -> String {
        format!("{}:{}", site, week)
    }

    /// Accumulated minutes for a site in a given week, 0 if absent
    pub fn get(&self, site: &str, week: NaiveDate) -> u64 {
        self.minutes
            .get(&Self::key(site, week))
            .copied()
            .unwrap_or(0)
    }

    /// Add minutes to a site's weekly counter
    ///
    /// The new total is persisted before this returns; a persistence
    /// failure propagates to the caller. The in-memory counter keeps the
    /// increment either way so decisions stay truthful for this process.
    pub fn add(&mut self, site: &str, week: NaiveDate, delta: u64) -> Result<u64> {
        let entry = self.minutes.entry(Self::key(site, week)).or_insert(0);
        *entry += delta;
        let total = *entry;

        self.store
            .save_usage(&self.minutes)
            .with_context(|| format!("Failed to persist usage for {}", site))?;

        Ok(total)
    }
}
