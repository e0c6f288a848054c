//! Late flip: the sharp side changes in the final hours before the game

use chrono::Duration;

use crate::config::LateFlipConfig;
use crate::domain::{BetSide, MarketSplitRecord, Signal, StrategyCategory, TimeWindow};
use crate::error::ProcessorError;

use super::traits::{checked_differential, group_by, stream_of, StrategyProcessor};

pub struct LateFlipProcessor {
    config: LateFlipConfig,
}

impl LateFlipProcessor {
    pub fn new(config: LateFlipConfig) -> Self {
        Self { config }
    }

    fn late_period(&self) -> Duration {
        Duration::seconds((self.config.late_hours * 3600.0) as i64)
    }
}

impl StrategyProcessor for LateFlipProcessor {
    fn name(&self) -> &str {
        "late_flip"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::LateFlip
    }

    fn process(
        &self,
        _window: &TimeWindow,
        records: &[MarketSplitRecord],
    ) -> Result<Vec<Signal>, ProcessorError> {
        let late_period = self.late_period();
        let mut signals = Vec::new();

        for series in group_by(records, stream_of).values() {
            let Some(latest) = series.last() else {
                continue;
            };
            let cutoff = latest.game_time - late_period;
            if latest.observed_at < cutoff {
                continue;
            }
            let Some(early) = series.iter().rev().find(|r| r.observed_at < cutoff) else {
                continue;
            };

            let early_diff = checked_differential(early)?;
            let late_diff = checked_differential(latest)?;
            if late_diff.abs() < self.config.min_differential {
                continue;
            }

            let early_side = BetSide::from_differential(early.market_type, early_diff);
            let late_side = BetSide::from_differential(latest.market_type, late_diff);
            match (early_side, late_side) {
                (Some(before), Some(after)) if before != after => {
                    signals.push(Signal::from_record(latest, self.name(), late_diff, after));
                }
                _ => {}
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

    fn processor() -> LateFlipProcessor {
        LateFlipProcessor::new(LateFlipConfig::default())
    }

    #[test]
    fn test_follows_money_after_flip() {
        let records = vec![
            split(MarketType::Moneyline, 50.0, 58.0).minutes_before(600).build(),
            split(MarketType::Moneyline, 52.0, 56.0).minutes_before(240).build(),
            split(MarketType::Moneyline, 55.0, 44.0).minutes_before(20).build(),
        ];

        let signals = processor().process(&window(), &records).unwrap();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].recommended_side, BetSide::Away);
        assert_eq!(signals[0].differential, -11.0);
    }

    #[test]
    fn test_no_flip_when_side_holds() {
        let records = vec![
            split(MarketType::Total, 50.0, 60.0).minutes_before(400).build(),
            split(MarketType::Total, 50.0, 65.0).minutes_before(30).build(),
        ];
        assert!(processor().process(&window(), &records).unwrap().is_empty());
    }

    #[test]
    fn test_weak_late_money_is_ignored() {
        let records = vec![
            split(MarketType::Spread, 50.0, 60.0).minutes_before(400).build(),
            split(MarketType::Spread, 50.0, 45.0).minutes_before(30).build(),
        ];
        assert!(processor().process(&window(), &records).unwrap().is_empty());
    }
}
