//! MarketDataStore boundary
//!
//! The engine consumes read queries only. `PostgresMarketStore` (in
//! `adapters`) is the production implementation; `InMemoryMarketStore`
//! serves replay files and tests.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::domain::{MarketSplitRecord, SourceTable, TimeWindow};
use crate::error::{Result, StoreError};

/// Read-only query interface over market split data
#[async_trait]
pub trait MarketDataStore: Send + Sync {
    /// Rows of `table` observed within `window`
    async fn query(
        &self,
        table: SourceTable,
        window: &TimeWindow,
    ) -> std::result::Result<Vec<MarketSplitRecord>, StoreError>;
}

/// Keep only the most recent observation of each game/market/source/book stream
pub fn latest_per_stream(records: &[MarketSplitRecord]) -> Vec<MarketSplitRecord> {
    let mut latest: HashMap<_, &MarketSplitRecord> = HashMap::new();
    for record in records {
        latest
            .entry(record.stream_key())
            .and_modify(|current| {
                if record.observed_at > current.observed_at {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    latest.into_values().cloned().collect()
}

/// Store backed by a vector of observations
#[derive(Default)]
pub struct InMemoryMarketStore {
    history: Vec<MarketSplitRecord>,
    failing: DashSet<SourceTable>,
    queries: AtomicUsize,
    per_table: DashMap<SourceTable, usize>,
    latency: Option<Duration>,
}

impl InMemoryMarketStore {
    pub fn new(history: Vec<MarketSplitRecord>) -> Self {
        Self {
            history,
            ..Default::default()
        }
    }

    /// Load a JSON array of records (the replay file format)
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let records: Vec<MarketSplitRecord> = serde_json::from_str(&raw)?;
        debug!(
            "Loaded {} records from {}",
            records.len(),
            path.as_ref().display()
        );
        Ok(Self::new(records))
    }

    /// Delay every query, e.g. to exercise deadlines
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every query against `table` fail
    pub fn fail_table(&self, table: SourceTable) {
        self.failing.insert(table);
    }

    pub fn restore_table(&self, table: SourceTable) {
        self.failing.remove(&table);
    }

    /// Total queries served (including failed ones)
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn queries_for(&self, table: SourceTable) -> usize {
        self.per_table.get(&table).map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl MarketDataStore for InMemoryMarketStore {
    async fn query(
        &self,
        table: SourceTable,
        window: &TimeWindow,
    ) -> std::result::Result<Vec<MarketSplitRecord>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        *self.per_table.entry(table).or_insert(0) += 1;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.contains(&table) {
            return Err(StoreError::Unavailable(format!("{table} is offline")));
        }

        // Same predicate as the SQL store: in-window and taken before first pitch
        let in_window: Vec<MarketSplitRecord> = self
            .history
            .iter()
            .filter(|r| window.contains(r.observed_at) && r.observed_before_start())
            .cloned()
            .collect();

        Ok(match table {
            SourceTable::SplitHistory => in_window,
            SourceTable::LatestSplits => latest_per_stream(&in_window),
        })
    }
}
