//! Strategy processor interface and shared helpers

use std::collections::BTreeMap;

use crate::domain::{MarketSplitRecord, MarketType, Signal, StrategyCategory, TimeWindow};
use crate::error::ProcessorError;

/// A detection strategy
///
/// Processors are pure: given the window and the records of their category
/// they emit zero or more signals. All I/O happens in the repository before
/// `process` is called.
pub trait StrategyProcessor: Send + Sync {
    /// Unique strategy name, used for logging and history lookup
    fn name(&self) -> &str;

    /// Data category this processor reads
    fn category(&self) -> StrategyCategory;

    /// Detect signals in `records`
    fn process(
        &self,
        window: &TimeWindow,
        records: &[MarketSplitRecord],
    ) -> Result<Vec<Signal>, ProcessorError>;
}

/// Stream key without the game-independent parts
pub(crate) type StreamKey<'a> = (&'a str, MarketType, &'a str, Option<&'a str>);

pub(crate) fn stream_of(record: &MarketSplitRecord) -> StreamKey<'_> {
    (
        record.game_id.as_str(),
        record.market_type,
        record.source.as_str(),
        record.book.as_deref(),
    )
}

/// Group records by an arbitrary key, each group ordered by observation time
pub(crate) fn group_by<'a, K, F>(
    records: &'a [MarketSplitRecord],
    key: F,
) -> BTreeMap<K, Vec<&'a MarketSplitRecord>>
where
    K: Ord,
    F: Fn(&'a MarketSplitRecord) -> K,
{
    let mut groups: BTreeMap<K, Vec<&MarketSplitRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(key(record)).or_default().push(record);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|r| r.observed_at);
    }
    groups
}

/// Most recent record of every game/market/source/book stream
pub(crate) fn latest_by_stream(records: &[MarketSplitRecord]) -> Vec<&MarketSplitRecord> {
    group_by(records, stream_of)
        .into_values()
        .filter_map(|group| group.last().copied())
        .collect()
}

/// Differential of a record, rejecting non-finite inputs
pub(crate) fn checked_differential(record: &MarketSplitRecord) -> Result<f64, ProcessorError> {
    let differential = record.differential();
    if differential.is_finite() {
        Ok(differential)
    } else {
        Err(ProcessorError::Arithmetic(format!(
            "non-finite differential for game {} ({} / {})",
            record.game_id, record.source, record.market_type
        )))
    }
}

/// Source label for a signal aggregated over several records
pub(crate) fn aggregate_source(records: &[&MarketSplitRecord]) -> String {
    let mut sources: Vec<&str> = records.iter().map(|r| r.source.as_str()).collect();
    sources.sort_unstable();
    sources.dedup();
    match sources.as_slice() {
        [single] => single.to_string(),
        _ => "multi".to_string(),
    }
}
