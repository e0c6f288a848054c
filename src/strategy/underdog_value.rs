//! Underdog value: sharp money on the plus-money side of the moneyline

use crate::config::UnderdogValueConfig;
use crate::domain::{BetSide, MarketSplitRecord, MarketType, Signal, StrategyCategory, TimeWindow};
use crate::error::ProcessorError;

use super::traits::{checked_differential, latest_by_stream, StrategyProcessor};

pub struct UnderdogValueProcessor {
    config: UnderdogValueConfig,
}

impl UnderdogValueProcessor {
    pub fn new(config: UnderdogValueConfig) -> Self {
        Self { config }
    }

    /// Side the money backs when it is the underdog, judged by the home price
    fn underdog_backed(&self, home_price: f64, differential: f64) -> Option<BetSide> {
        let min = self.config.min_differential;
        if home_price >= self.config.min_price && differential >= min {
            Some(BetSide::Home)
        } else if home_price <= -self.config.min_price && differential <= -min {
            Some(BetSide::Away)
        } else {
            None
        }
    }
}

impl StrategyProcessor for UnderdogValueProcessor {
    fn name(&self) -> &str {
        "underdog_value"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::UnderdogValue
    }

    fn process(
        &self,
        _window: &TimeWindow,
        records: &[MarketSplitRecord],
    ) -> Result<Vec<Signal>, ProcessorError> {
        let mut signals = Vec::new();
        for record in latest_by_stream(records) {
            if record.market_type != MarketType::Moneyline {
                continue;
            }
            let Some(home_price) = record.line_value else {
                continue;
            };
            let differential = checked_differential(record)?;
            if let Some(side) = self.underdog_backed(home_price, differential) {
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

    fn processor() -> UnderdogValueProcessor {
        UnderdogValueProcessor::new(UnderdogValueConfig::default())
    }

    #[test]
    fn test_money_on_away_dog() {
        // home is -130 so the away side is the dog
        let records = vec![split(MarketType::Moneyline, 60.0, 48.0).build()];

        let signals = processor().process(&window(), &records).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].recommended_side, BetSide::Away);
    }

    #[test]
    fn test_money_on_home_dog() {
        let records = vec![split(MarketType::Moneyline, 40.0, 55.0).line(120.0).build()];

        let signals = processor().process(&window(), &records).unwrap();
        assert_eq!(signals[0].recommended_side, BetSide::Home);
    }

    #[test]
    fn test_money_on_favourite_is_ignored() {
        let records = vec![split(MarketType::Moneyline, 40.0, 55.0).build()];
        assert!(processor().process(&window(), &records).unwrap().is_empty());
    }
}
