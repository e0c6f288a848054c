use serde::{Deserialize, Serialize};
use std::fmt;

use super::market::{MarketSplitRecord, MarketType};

/// Physical table/view the store serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    /// Most recent observation per game/market/source/book
    LatestSplits,
    /// Every observation, for movement-based strategies
    SplitHistory,
}

impl SourceTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTable::LatestSplits => "latest_splits",
            SourceTable::SplitHistory => "split_history",
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Data category a strategy processor consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyCategory {
    SharpAction,
    OpposingMarkets,
    BookConflict,
    SteamMove,
    PublicFade,
    LateFlip,
    Consensus,
    UnderdogValue,
}

impl StrategyCategory {
    pub const ALL: [StrategyCategory; 8] = [
        StrategyCategory::SharpAction,
        StrategyCategory::OpposingMarkets,
        StrategyCategory::BookConflict,
        StrategyCategory::SteamMove,
        StrategyCategory::PublicFade,
        StrategyCategory::LateFlip,
        StrategyCategory::Consensus,
        StrategyCategory::UnderdogValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyCategory::SharpAction => "sharp_action",
            StrategyCategory::OpposingMarkets => "opposing_markets",
            StrategyCategory::BookConflict => "book_conflict",
            StrategyCategory::SteamMove => "steam_move",
            StrategyCategory::PublicFade => "public_fade",
            StrategyCategory::LateFlip => "late_flip",
            StrategyCategory::Consensus => "consensus",
            StrategyCategory::UnderdogValue => "underdog_value",
        }
    }

    /// Table backing this category's data
    pub fn source_table(&self) -> SourceTable {
        match self {
            StrategyCategory::SteamMove | StrategyCategory::LateFlip => SourceTable::SplitHistory,
            _ => SourceTable::LatestSplits,
        }
    }

    /// Row filter applied on top of the table query
    pub fn accepts(&self, record: &MarketSplitRecord) -> bool {
        match self {
            StrategyCategory::OpposingMarkets => record.market_type != MarketType::Total,
            StrategyCategory::BookConflict => record.book.is_some(),
            StrategyCategory::UnderdogValue => {
                record.market_type == MarketType::Moneyline && record.line_value.is_some()
            }
            _ => true,
        }
    }
}

impl fmt::Display for StrategyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn movement_categories_read_history() {
        let tables: BTreeSet<_> = StrategyCategory::ALL
            .iter()
            .map(|c| c.source_table())
            .collect();
        assert_eq!(tables.len(), 2);
        assert_eq!(
            StrategyCategory::LateFlip.source_table(),
            SourceTable::SplitHistory
        );
        assert_eq!(
            StrategyCategory::PublicFade.source_table(),
            SourceTable::LatestSplits
        );
    }
}
