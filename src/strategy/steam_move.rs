//! Steam move: money moves sharply while ticket counts barely change

use chrono::Duration;

use crate::config::SteamMoveConfig;
use crate::domain::{BetSide, MarketSplitRecord, Signal, StrategyCategory, TimeWindow};
use crate::error::ProcessorError;

use super::traits::{checked_differential, group_by, stream_of, StrategyProcessor};

pub struct SteamMoveProcessor {
    config: SteamMoveConfig,
}

impl SteamMoveProcessor {
    pub fn new(config: SteamMoveConfig) -> Self {
        Self { config }
    }
}

impl StrategyProcessor for SteamMoveProcessor {
    fn name(&self) -> &str {
        "steam_move"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::SteamMove
    }

    fn process(
        &self,
        _window: &TimeWindow,
        records: &[MarketSplitRecord],
    ) -> Result<Vec<Signal>, ProcessorError> {
        let lookback = Duration::minutes(self.config.window_minutes);
        let mut signals = Vec::new();

        for series in group_by(records, stream_of).values() {
            let Some(latest) = series.last() else {
                continue;
            };
            let since = latest.observed_at - lookback;
            let Some(baseline) = series
                .iter()
                .find(|r| r.observed_at >= since && r.observed_at < latest.observed_at)
            else {
                continue;
            };

            let stake_move = latest.home_or_over_stake_pct - baseline.home_or_over_stake_pct;
            let bet_move = latest.home_or_over_bet_pct - baseline.home_or_over_bet_pct;
            if !(stake_move.is_finite() && bet_move.is_finite()) {
                return Err(ProcessorError::Arithmetic(format!(
                    "non-finite movement for game {}",
                    latest.game_id
                )));
            }

            if stake_move.abs() < self.config.min_stake_move
                || bet_move.abs() * 2.0 >= stake_move.abs()
            {
                continue;
            }

            // The move triggers; the current split has to lean the same way
            let differential = checked_differential(latest)?;
            if differential == 0.0 || differential.signum() != stake_move.signum() {
                continue;
            }
            if let Some(side) = BetSide::from_differential(latest.market_type, differential) {
                signals.push(Signal::from_record(latest, self.name(), differential, side));
            }
        }
        Ok(signals)
    }
}
