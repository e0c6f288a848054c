//! Caching repository in front of the MarketDataStore
//!
//! Entries are keyed by `(category, window.start, window.end)` and live until
//! `clear_cache`. Concurrent misses on one key may both reach the store; the
//! first result inserted wins and both callers see identical data.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{MarketSplitRecord, SourceTable, StrategyCategory, TimeWindow};
use crate::error::{RepositoryError, StoreError};

use super::store::MarketDataStore;

/// Shared, immutable result of one fetch
pub type RecordBatch = Arc<Vec<MarketSplitRecord>>;

/// Clock used to detect windows no observation can fall into
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    category: StrategyCategory,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl CacheKey {
    fn new(category: StrategyCategory, window: &TimeWindow) -> Self {
        Self {
            category,
            start: window.start,
            end: window.end,
        }
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Store queries issued
    pub store_calls: u64,
    pub entries: usize,
    pub hit_rate: f64,
}

/// Caches and batches reads from the MarketDataStore
pub struct SignalRepository {
    store: Arc<dyn MarketDataStore>,
    cache: DashMap<CacheKey, RecordBatch>,
    hits: AtomicU64,
    misses: AtomicU64,
    store_calls: AtomicU64,
    clock: Clock,
}

impl SignalRepository {
    pub fn new(store: Arc<dyn MarketDataStore>) -> Self {
        Self::with_clock(store, Arc::new(Utc::now))
    }

    pub fn with_clock(store: Arc<dyn MarketDataStore>, clock: Clock) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            store_calls: AtomicU64::new(0),
            clock,
        }
    }

    /// Records for one category within `window`
    pub async fn fetch(
        &self,
        category: StrategyCategory,
        window: &TimeWindow,
    ) -> Result<RecordBatch, RepositoryError> {
        if window.is_future_only((self.clock)()) {
            debug!(%category, %window, "window starts in the future, skipping store");
            return Ok(Arc::new(Vec::new()));
        }

        let key = CacheKey::new(category, window);
        if let Some(entry) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry.value().clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let rows = self
            .query_table(category.source_table(), window)
            .await
            .map_err(|e| RepositoryError::new(category, *window, e))?;

        let batch = Arc::new(select_for(category, &rows));
        debug!(%category, %window, records = batch.len(), "fetched from store");
        Ok(self.insert(key, batch))
    }

    /// Records for several categories, one store query per distinct table
    pub async fn fetch_batch(
        &self,
        categories: &BTreeSet<StrategyCategory>,
        window: &TimeWindow,
    ) -> Result<HashMap<StrategyCategory, RecordBatch>, RepositoryError> {
        if window.is_future_only((self.clock)()) {
            debug!(%window, "window starts in the future, skipping store");
            return Ok(categories
                .iter()
                .map(|c| (*c, Arc::new(Vec::new())))
                .collect());
        }

        let mut out = HashMap::with_capacity(categories.len());
        let mut missing: BTreeMap<SourceTable, Vec<StrategyCategory>> = BTreeMap::new();

        for category in categories {
            let key = CacheKey::new(*category, window);
            if let Some(entry) = self.cache.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                out.insert(*category, entry.value().clone());
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                missing
                    .entry(category.source_table())
                    .or_default()
                    .push(*category);
            }
        }

        let queries = missing
            .iter()
            .map(|(table, _)| self.query_table(*table, window));
        let results = join_all(queries).await;

        let mut first_error = None;
        for ((table, waiting), result) in missing.into_iter().zip(results) {
            match result {
                Ok(rows) => {
                    for category in waiting {
                        let batch = Arc::new(select_for(category, &rows));
                        out.insert(category, self.insert(CacheKey::new(category, window), batch));
                    }
                }
                Err(e) => {
                    warn!(%table, %window, error = %e, "batched fetch failed");
                    if first_error.is_none() {
                        first_error = Some(RepositoryError::new(waiting[0], *window, e));
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(out),
        }
    }

    /// Drop every cached entry. Counters are kept.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Store queries issued so far
    pub fn call_count(&self) -> u64 {
        self.store_calls.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            store_calls: self.call_count(),
            entries: self.cache.len(),
            hit_rate: self.cache_hit_rate(),
        }
    }

    fn insert(&self, key: CacheKey, batch: RecordBatch) -> RecordBatch {
        self.cache.entry(key).or_insert(batch).value().clone()
    }

    async fn query_table(
        &self,
        table: SourceTable,
        window: &TimeWindow,
    ) -> Result<Vec<MarketSplitRecord>, StoreError> {
        self.store_calls.fetch_add(1, Ordering::Relaxed);
        let rows = self.store.query(table, window).await?;
        Ok(sanitize(rows, window))
    }
}

/// Drop unusable rows, deduplicate, and order deterministically
fn sanitize(rows: Vec<MarketSplitRecord>, window: &TimeWindow) -> Vec<MarketSplitRecord> {
    let total = rows.len();
    let mut seen = HashSet::new();
    let mut out: Vec<MarketSplitRecord> = rows
        .into_iter()
        .filter(|r| {
            if !r.percentages_in_range() {
                warn!(
                    game_id = %r.game_id,
                    source = %r.source,
                    bet = r.home_or_over_bet_pct,
                    stake = r.home_or_over_stake_pct,
                    "discarding record with out-of-range percentages"
                );
                return false;
            }
            r.observed_before_start() && window.contains(r.observed_at)
        })
        .filter(|r| {
            seen.insert((
                r.stream_key(),
                r.observed_at,
                r.home_or_over_bet_pct.to_bits(),
                r.home_or_over_stake_pct.to_bits(),
            ))
        })
        .collect();

    out.sort_by(|a, b| {
        a.game_id
            .cmp(&b.game_id)
            .then(a.market_type.cmp(&b.market_type))
            .then(a.source.cmp(&b.source))
            .then(a.book.cmp(&b.book))
            .then(a.observed_at.cmp(&b.observed_at))
    });

    if out.len() < total {
        debug!(kept = out.len(), total, "sanitized store rows");
    }
    out
}

fn select_for(category: StrategyCategory, rows: &[MarketSplitRecord]) -> Vec<MarketSplitRecord> {
    rows.iter().filter(|r| category.accepts(r)).cloned().collect()
}
