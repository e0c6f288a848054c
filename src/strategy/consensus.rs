//! Consensus: several books agree on the sharp side of a market

use crate::config::ConsensusConfig;
use crate::domain::{BetSide, MarketSplitRecord, Signal, StrategyCategory, TimeWindow};
use crate::error::ProcessorError;

use super::traits::{
    aggregate_source, checked_differential, group_by, latest_by_stream, StrategyProcessor,
};

pub struct ConsensusProcessor {
    config: ConsensusConfig,
}

impl ConsensusProcessor {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }
}

impl StrategyProcessor for ConsensusProcessor {
    fn name(&self) -> &str {
        "consensus"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Consensus
    }

    fn process(
        &self,
        _window: &TimeWindow,
        records: &[MarketSplitRecord],
    ) -> Result<Vec<Signal>, ProcessorError> {
        let latest: Vec<MarketSplitRecord> = latest_by_stream(records).into_iter().cloned().collect();
        let markets = group_by(&latest, |r| (r.game_id.as_str(), r.market_type));

        let mut signals = Vec::new();
        for books in markets.values() {
            if books.len() < self.config.min_books {
                continue;
            }

            let mut differentials = Vec::with_capacity(books.len());
            for record in books {
                differentials.push(checked_differential(record)?);
            }
            let unanimous = differentials.iter().all(|d| *d > 0.0)
                || differentials.iter().all(|d| *d < 0.0);
            if !unanimous {
                continue;
            }

            let mean = differentials.iter().sum::<f64>() / differentials.len() as f64;
            if mean.abs() < self.config.min_differential {
                continue;
            }

            let Some(newest) = books.last() else {
                continue;
            };
            if let Some(side) = BetSide::from_differential(newest.market_type, mean) {
                let source = aggregate_source(books);
                signals.push(
                    Signal::from_record(newest, self.name(), mean, side).with_source(&source, None),
                );
            }
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MarketType;
    use crate::strategy::testing::{split, window};

    fn processor() -> ConsensusProcessor {
        ConsensusProcessor::new(ConsensusConfig::default())
    }

    #[test]
    fn test_unanimous_books_produce_one_signal() {
        let records = vec![
            split(MarketType::Total, 45.0, 55.0).book("circa").build(),
            split(MarketType::Total, 40.0, 52.0).book("draftkings").build(),
            split(MarketType::Total, 48.0, 56.0).source("action_network").book("fanduel").build(),
        ];

        let signals = processor().process(&window(), &records).unwrap();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].recommended_side, BetSide::Over);
        assert_eq!(signals[0].source, "multi");
        assert!((signals[0].differential - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_dissenting_book_breaks_consensus() {
        let records = vec![
            split(MarketType::Spread, 45.0, 60.0).book("circa").build(),
            split(MarketType::Spread, 40.0, 58.0).book("draftkings").build(),
            split(MarketType::Spread, 55.0, 50.0).book("fanduel").build(),
        ];

        assert!(processor().process(&window(), &records).unwrap().is_empty());
    }
}
