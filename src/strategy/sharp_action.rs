//! Sharp action: money-weighted preference diverging from ticket count

use crate::config::SharpActionConfig;
use crate::domain::{BetSide, MarketSplitRecord, Signal, StrategyCategory, TimeWindow};
use crate::error::ProcessorError;

use super::traits::{checked_differential, latest_by_stream, StrategyProcessor};

pub struct SharpActionProcessor {
    config: SharpActionConfig,
}

impl SharpActionProcessor {
    pub fn new(config: SharpActionConfig) -> Self {
        Self { config }
    }
}

impl StrategyProcessor for SharpActionProcessor {
    fn name(&self) -> &str {
        "sharp_action"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::SharpAction
    }

    fn process(
        &self,
        _window: &TimeWindow,
        records: &[MarketSplitRecord],
    ) -> Result<Vec<Signal>, ProcessorError> {
        let mut signals = Vec::new();
        for record in latest_by_stream(records) {
            let differential = checked_differential(record)?;
            if differential.abs() < self.config.min_differential {
                continue;
            }
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
    use crate::domain::MarketType;
    use crate::strategy::testing::{split, window};

    #[test]
    fn test_uses_latest_observation_per_book() {
        let processor = SharpActionProcessor::new(SharpActionConfig::default());
        let records = vec![
            split(MarketType::Total, 70.0, 45.0).minutes_before(240).build(),
            split(MarketType::Total, 65.0, 80.0).minutes_before(30).build(),
            split(MarketType::Total, 50.0, 55.0).book("draftkings").build(),
        ];

        let signals = processor.process(&window(), &records).unwrap();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].recommended_side, BetSide::Over);
        assert_eq!(signals[0].differential, 15.0);
        assert_eq!(signals[0].raw_strength, 15.0);
        assert_eq!(signals[0].book.as_deref(), Some("circa"));
    }

    #[test]
    fn test_negative_differential_backs_away() {
        let processor = SharpActionProcessor::new(SharpActionConfig::default());
        let records = vec![split(MarketType::Moneyline, 72.0, 48.0).build()];

        let signals = processor.process(&window(), &records).unwrap();
        assert_eq!(signals[0].recommended_side, BetSide::Away);
        assert_eq!(signals[0].raw_strength, 24.0);
    }

    #[test]
    fn test_non_finite_input_is_arithmetic_fault() {
        let processor = SharpActionProcessor::new(SharpActionConfig::default());
        let records = vec![split(MarketType::Spread, f64::NAN, 50.0).build()];

        assert!(matches!(
            processor.process(&window(), &records),
            Err(ProcessorError::Arithmetic(_))
        ));
    }
}
