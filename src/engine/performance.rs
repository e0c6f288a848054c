//! Strategy historical performance lookup
//!
//! Trailing results per strategy are produced by the external backtesting
//! component; the engine only reads them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Trailing record of one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPerformance {
    pub strategy_name: String,
    /// Fraction of graded bets won (0.0-1.0)
    pub win_rate: f64,
    /// Return on investment in percent
    pub roi: f64,
    pub sample_size: u32,
}

/// `(strategy_name) -> performance` lookup consumed by the scorer
pub trait PerformanceLookup: Send + Sync {
    fn lookup(&self, strategy_name: &str) -> Option<StrategyPerformance>;
}

/// In-memory performance table
#[derive(Debug, Clone, Default)]
pub struct PerformanceTable {
    entries: HashMap<String, StrategyPerformance>,
}

impl PerformanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = StrategyPerformance>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.insert(entry);
        }
        table
    }

    /// Insert or replace the entry for a strategy
    pub fn insert(&mut self, entry: StrategyPerformance) {
        self.entries.insert(entry.strategy_name.clone(), entry);
    }

    /// Entries from `other` replace ours
    pub fn merge(&mut self, other: PerformanceTable) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PerformanceLookup for PerformanceTable {
    fn lookup(&self, strategy_name: &str) -> Option<StrategyPerformance> {
        self.entries.get(strategy_name).cloned()
    }
}
