//! Opposing markets: moneyline and spread money point at different teams
//!
//! When the sharp side of the moneyline and the run line disagree for the same
//! book, the market with the larger differential is followed.

use crate::config::OpposingMarketsConfig;
use crate::domain::{BetSide, MarketSplitRecord, MarketType, Signal, StrategyCategory, TimeWindow};
use crate::error::ProcessorError;

use super::traits::{checked_differential, group_by, latest_by_stream, StrategyProcessor};

pub struct OpposingMarketsProcessor {
    config: OpposingMarketsConfig,
}

impl OpposingMarketsProcessor {
    pub fn new(config: OpposingMarketsConfig) -> Self {
        Self { config }
    }
}

impl StrategyProcessor for OpposingMarketsProcessor {
    fn name(&self) -> &str {
        "opposing_markets"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::OpposingMarkets
    }

    fn process(
        &self,
        _window: &TimeWindow,
        records: &[MarketSplitRecord],
    ) -> Result<Vec<Signal>, ProcessorError> {
        let latest: Vec<MarketSplitRecord> = latest_by_stream(records).into_iter().cloned().collect();
        let by_book = group_by(&latest, |r| {
            (r.game_id.as_str(), r.source.as_str(), r.book.as_deref())
        });

        let mut signals = Vec::new();
        for group in by_book.values() {
            let moneyline = group.iter().find(|r| r.market_type == MarketType::Moneyline);
            let spread = group.iter().find(|r| r.market_type == MarketType::Spread);
            let (Some(moneyline), Some(spread)) = (moneyline, spread) else {
                continue;
            };

            let ml_diff = checked_differential(moneyline)?;
            let spread_diff = checked_differential(spread)?;
            if ml_diff.abs() < self.config.min_differential
                || spread_diff.abs() < self.config.min_differential
            {
                continue;
            }
            // Both markets are Home/Away, so opposite signs mean opposite teams
            if ml_diff.signum() == spread_diff.signum() {
                continue;
            }

            let (record, differential) = if ml_diff.abs() >= spread_diff.abs() {
                (*moneyline, ml_diff)
            } else {
                (*spread, spread_diff)
            };
            if let Some(side) = BetSide::from_differential(record.market_type, differential) {
                signals.push(Signal::from_record(record, self.name(), differential, side));
            }
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testing::{split, window};

    #[test]
    fn test_follows_stronger_market() {
        let processor = OpposingMarketsProcessor::new(OpposingMarketsConfig::default());
        let records = vec![
            split(MarketType::Moneyline, 40.0, 52.0).build(),
            split(MarketType::Spread, 55.0, 35.0).build(),
        ];

        let signals = processor.process(&window(), &records).unwrap();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].market_type, MarketType::Spread);
        assert_eq!(signals[0].recommended_side, BetSide::Away);
        assert_eq!(signals[0].raw_strength, 20.0);
    }

    #[test]
    fn test_agreeing_markets_emit_nothing() {
        let processor = OpposingMarketsProcessor::new(OpposingMarketsConfig::default());
        let records = vec![
            split(MarketType::Moneyline, 40.0, 55.0).build(),
            split(MarketType::Spread, 45.0, 60.0).build(),
        ];

        assert!(processor.process(&window(), &records).unwrap().is_empty());
    }

    #[test]
    fn test_markets_from_different_books_are_not_paired() {
        let processor = OpposingMarketsProcessor::new(OpposingMarketsConfig::default());
        let records = vec![
            split(MarketType::Moneyline, 40.0, 60.0).book("circa").build(),
            split(MarketType::Spread, 60.0, 40.0).book("draftkings").build(),
        ];

        assert!(processor.process(&window(), &records).unwrap().is_empty());
    }
}
