//! Public fade: enough books with lopsided tickets on one side and money leaning the other way

use crate::config::PublicFadeConfig;
use crate::domain::{BetSide, MarketSplitRecord, Signal, StrategyCategory, TimeWindow};
use crate::error::ProcessorError;

use super::traits::{
    aggregate_source, checked_differential, group_by, latest_by_stream, StrategyProcessor,
};

pub struct PublicFadeProcessor {
    config: PublicFadeConfig,
}

impl PublicFadeProcessor {
    pub fn new(config: PublicFadeConfig) -> Self {
        Self { config }
    }
}

impl StrategyProcessor for PublicFadeProcessor {
    fn name(&self) -> &str {
        "public_fade"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::PublicFade
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

            let Some(newest) = books.last() else {
                continue;
            };
            let threshold = self.config.public_threshold;
            let mut heavy_home_or_over = 0;
            let mut heavy_other = 0;
            let mut diff_total = 0.0;
            for record in books {
                if record.home_or_over_bet_pct >= threshold {
                    heavy_home_or_over += 1;
                } else if 100.0 - record.home_or_over_bet_pct >= threshold {
                    heavy_other += 1;
                }
                diff_total += checked_differential(record)?;
            }
            let avg_diff = diff_total / books.len() as f64;

            let public_side = if heavy_home_or_over >= self.config.min_books {
                BetSide::home_or_over(newest.market_type)
            } else if heavy_other >= self.config.min_books {
                BetSide::home_or_over(newest.market_type).opposite()
            } else {
                continue;
            };
            let fade = public_side.opposite();

            // Money has to be on the fade side, otherwise the public is right there too
            if BetSide::from_differential(newest.market_type, avg_diff) != Some(fade) {
                continue;
            }

            let source = aggregate_source(books);
            signals.push(
                Signal::from_record(newest, self.name(), avg_diff, fade).with_source(&source, None),
            );
        }
        Ok(signals)
    }
}
