//! Book conflict: books from one source disagree on where the money is
//!
//! Follows the book showing the largest differential.

use crate::config::BookConflictConfig;
use crate::domain::{BetSide, MarketSplitRecord, Signal, StrategyCategory, TimeWindow};
use crate::error::ProcessorError;

use super::traits::{checked_differential, group_by, latest_by_stream, StrategyProcessor};

pub struct BookConflictProcessor {
    config: BookConflictConfig,
}

impl BookConflictProcessor {
    pub fn new(config: BookConflictConfig) -> Self {
        Self { config }
    }
}

impl StrategyProcessor for BookConflictProcessor {
    fn name(&self) -> &str {
        "book_conflict"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::BookConflict
    }

    fn process(
        &self,
        _window: &TimeWindow,
        records: &[MarketSplitRecord],
    ) -> Result<Vec<Signal>, ProcessorError> {
        let latest: Vec<MarketSplitRecord> = latest_by_stream(records).into_iter().cloned().collect();
        let markets = group_by(&latest, |r| {
            (r.game_id.as_str(), r.market_type, r.source.as_str())
        });

        let mut signals = Vec::new();
        for books in markets.values() {
            if books.len() < 2 {
                continue;
            }

            let mut scored = Vec::with_capacity(books.len());
            for record in books {
                if record.book.is_none() {
                    return Err(ProcessorError::InvalidInput(format!(
                        "book_conflict received a record without a book for game {}",
                        record.game_id
                    )));
                }
                scored.push((*record, checked_differential(record)?));
            }

            let min = self.config.min_differential;
            let backs_home_or_over = scored.iter().any(|(_, d)| *d >= min);
            let backs_other_side = scored.iter().any(|(_, d)| *d <= -min);
            if !(backs_home_or_over && backs_other_side) {
                continue;
            }

            let strongest = scored.iter().max_by(|(ra, da), (rb, db)| {
                da.abs()
                    .total_cmp(&db.abs())
                    // earlier book name wins a tie
                    .then_with(|| rb.book.cmp(&ra.book))
            });
            if let Some((record, differential)) = strongest {
                if let Some(side) = BetSide::from_differential(record.market_type, *differential) {
                    signals.push(Signal::from_record(record, self.name(), *differential, side));
                }
            }
        }
        Ok(signals)
    }
}
