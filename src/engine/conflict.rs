//! Per-game conflict resolution
//!
//! Collapses the scored signals of one game into one recommendation per
//! market type. Market types are independent: a weak moneyline pick is never
//! compared against, or replaced by, a strong spread pick.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;
use tracing::debug;

use crate::config::ResolutionConfig;
use crate::domain::{MarketType, Recommendation, ScoredSignal};
use crate::error::ResolutionError;

pub struct ConflictResolver {
    config: ResolutionConfig,
}

impl ConflictResolver {
    pub fn new(config: ResolutionConfig) -> Self {
        Self { config }
    }

    /// Resolve all signals of one game, one recommendation per market type
    ///
    /// The result does not depend on input order.
    pub fn resolve(
        &self,
        signals: &[ScoredSignal],
    ) -> Result<Vec<Recommendation>, ResolutionError> {
        let first = signals.first().ok_or(ResolutionError::EmptyInput)?;
        let game = first.signal.game_key();
        if let Some(other) = signals.iter().find(|s| s.signal.game_key() != game) {
            return Err(ResolutionError::MixedGames {
                first: game.to_string(),
                other: other.signal.game_key().to_string(),
            });
        }

        let mut by_market: BTreeMap<MarketType, Vec<&ScoredSignal>> = BTreeMap::new();
        for signal in signals {
            by_market.entry(signal.signal.market_type).or_default().push(signal);
        }

        Ok(by_market
            .into_iter()
            .filter_map(|(market, group)| self.resolve_market(market, &group))
            .collect())
    }

    fn resolve_market(
        &self,
        market: MarketType,
        group: &[&ScoredSignal],
    ) -> Option<Recommendation> {
        let top = group.iter().copied().max_by(|a, b| by_score(a, b))?;
        let sides: BTreeSet<_> = group.iter().map(|s| s.signal.recommended_side).collect();

        let (pick, conflict_resolved) = if sides.len() == 1 {
            (top, true)
        } else {
            let side = top.signal.recommended_side;
            let runner_up = group
                .iter()
                .filter(|s| s.signal.recommended_side != side)
                .map(|s| s.confidence_score)
                .fold(f64::NEG_INFINITY, f64::max);

            if top.confidence_score - runner_up > self.config.near_tie_margin {
                (top, true)
            } else {
                let floor = top.confidence_score - self.config.near_tie_margin;
                let pick = group
                    .iter()
                    .copied()
                    .filter(|s| s.confidence_score >= floor)
                    .max_by(|a, b| by_history(a, b))
                    .unwrap_or(top);
                debug!(
                    game = %pick.signal.game_key(),
                    market = %market,
                    top = top.confidence_score,
                    runner_up,
                    chosen = %pick.signal.strategy_name,
                    "near-tie conflict settled on strategy history"
                );
                (pick, false)
            }
        };

        Some(Recommendation {
            pick: pick.clone(),
            conflict_resolved,
            alternatives_considered: sides.len(),
            signals_considered: group.len(),
        })
    }
}

/// Score, then most recent, then lexically smallest strategy name
fn by_score(a: &ScoredSignal, b: &ScoredSignal) -> Ordering {
    OrderedFloat(a.confidence_score)
        .cmp(&OrderedFloat(b.confidence_score))
        .then_with(|| a.signal.produced_at.cmp(&b.signal.produced_at))
        .then_with(|| identity_order(a, b))
}

/// Strategy history first, then the usual score ordering
fn by_history(a: &ScoredSignal, b: &ScoredSignal) -> Ordering {
    OrderedFloat(a.components.strategy_performance)
        .cmp(&OrderedFloat(b.components.strategy_performance))
        .then_with(|| by_score(a, b))
}

/// Total order on the remaining identity fields; smaller names rank higher
fn identity_order(a: &ScoredSignal, b: &ScoredSignal) -> Ordering {
    let key = |s: &ScoredSignal| {
        (
            s.signal.strategy_name.clone(),
            s.signal.source.clone(),
            s.signal.book.clone(),
            s.signal.recommended_side,
        )
    };
    key(b).cmp(&key(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;

    use crate::config::ScoringConfig;
    use crate::domain::{BetSide, ConfidenceLevel, ScoreComponents, Signal};
    use crate::engine::scoring::ConfidenceScorer;
    use crate::strategy::testing::{game_time, split};

    fn resolver() -> ConflictResolver {
        ConflictResolver::new(ResolutionConfig::default())
    }

    fn scored(market: MarketType, side: BetSide, strategy: &str, score: f64) -> ScoredSignal {
        let record = split(market, 45.0, 60.0).build();
        let mut signal = Signal::from_record(&record, strategy, 15.0, side);
        signal.produced_at = game_time() - Duration::hours(2);
        ScoredSignal {
            signal,
            confidence_score: score,
            confidence_level: ConfidenceLevel::Moderate,
            components: ScoreComponents {
                signal_strength: 70.0,
                source_reliability: 65.0,
                strategy_performance: 50.0,
                data_quality: 100.0,
                market_context: 100.0,
            },
            explanation: String::new(),
            stake_suggestion: 2.0,
        }
    }

    fn with_history(mut s: ScoredSignal, performance: f64) -> ScoredSignal {
        s.components.strategy_performance = performance;
        s
    }

    #[test]
    fn test_agreeing_signals_pick_highest_score() {
        let signals = vec![
            scored(MarketType::Spread, BetSide::Home, "sharp_action", 72.0),
            scored(MarketType::Spread, BetSide::Home, "consensus", 78.0),
            scored(MarketType::Spread, BetSide::Home, "late_flip", 61.0),
        ];

        let recs = resolver().resolve(&signals).unwrap();

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].pick.signal.strategy_name, "consensus");
        assert!(recs[0].conflict_resolved);
        assert_eq!(recs[0].alternatives_considered, 1);
        assert_eq!(recs[0].signals_considered, 3);
    }

    #[test]
    fn test_equal_scores_prefer_recent_then_name() {
        let mut newer = scored(MarketType::Total, BetSide::Over, "steam_move", 70.0);
        newer.signal.produced_at += Duration::seconds(5);
        let signals = vec![
            scored(MarketType::Total, BetSide::Over, "consensus", 70.0),
            newer,
            scored(MarketType::Total, BetSide::Over, "book_conflict", 70.0),
        ];
        let recs = resolver().resolve(&signals).unwrap();
        assert_eq!(recs[0].pick.signal.strategy_name, "steam_move");

        let tied = vec![
            scored(MarketType::Total, BetSide::Over, "consensus", 70.0),
            scored(MarketType::Total, BetSide::Over, "book_conflict", 70.0),
        ];
        let recs = resolver().resolve(&tied).unwrap();
        assert_eq!(recs[0].pick.signal.strategy_name, "book_conflict");
    }

    #[test]
    fn test_clear_contradiction_picks_stronger_side() {
        let signals = vec![
            scored(MarketType::Moneyline, BetSide::Away, "public_fade", 45.0),
            scored(MarketType::Moneyline, BetSide::Home, "sharp_action", 85.0),
        ];

        let recs = resolver().resolve(&signals).unwrap();

        assert_eq!(recs[0].pick.confidence_score, 85.0);
        assert_eq!(recs[0].pick.signal.recommended_side, BetSide::Home);
        assert!(recs[0].conflict_resolved);
        assert_eq!(recs[0].alternatives_considered, 2);
    }

    #[test]
    fn test_near_tie_falls_back_to_history() {
        let signals = vec![
            with_history(
                scored(MarketType::Moneyline, BetSide::Home, "sharp_action", 81.0),
                55.0,
            ),
            with_history(
                scored(MarketType::Moneyline, BetSide::Away, "late_flip", 80.0),
                68.0,
            ),
        ];

        let recs = resolver().resolve(&signals).unwrap();

        assert!(!recs[0].conflict_resolved);
        assert_eq!(recs[0].pick.signal.strategy_name, "late_flip");
        assert_eq!(recs[0].pick.signal.recommended_side, BetSide::Away);
        assert_eq!(recs[0].alternatives_considered, 2);
    }

    #[test]
    fn test_margin_is_inclusive() {
        let signals = vec![
            scored(MarketType::Spread, BetSide::Home, "sharp_action", 80.0),
            scored(MarketType::Spread, BetSide::Away, "late_flip", 78.0),
        ];
        let recs = resolver().resolve(&signals).unwrap();
        assert!(!recs[0].conflict_resolved);
    }

    #[test]
    fn test_result_is_independent_of_input_order() {
        let signals = vec![
            with_history(scored(MarketType::Spread, BetSide::Home, "a", 80.0), 60.0),
            with_history(scored(MarketType::Spread, BetSide::Away, "b", 79.5), 60.0),
            with_history(scored(MarketType::Spread, BetSide::Away, "c", 79.5), 60.0),
            scored(MarketType::Total, BetSide::Over, "d", 66.0),
            scored(MarketType::Total, BetSide::Under, "e", 66.0),
        ];
        let expected = resolver().resolve(&signals).unwrap();

        let mut rotated = signals.clone();
        for _ in 0..signals.len() {
            rotated.rotate_left(1);
            assert_eq!(resolver().resolve(&rotated).unwrap(), expected);
            let mut reversed = rotated.clone();
            reversed.reverse();
            assert_eq!(resolver().resolve(&reversed).unwrap(), expected);
        }
    }

    #[test]
    fn test_markets_resolve_independently() {
        let signals = vec![
            scored(MarketType::Moneyline, BetSide::Home, "underdog_value", 40.0),
            scored(MarketType::Spread, BetSide::Away, "sharp_action", 90.0),
        ];

        let recs = resolver().resolve(&signals).unwrap();

        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].market_type(), MarketType::Moneyline);
        assert_eq!(recs[0].pick.confidence_score, 40.0);
        assert_eq!(recs[1].market_type(), MarketType::Spread);
        assert_eq!(recs[1].pick.confidence_score, 90.0);
    }

    #[test]
    fn test_contract_violations() {
        assert_eq!(resolver().resolve(&[]), Err(ResolutionError::EmptyInput));

        let mut other = scored(MarketType::Total, BetSide::Over, "consensus", 70.0);
        other.signal.home_team = "TB".into();
        let signals = vec![
            scored(MarketType::Total, BetSide::Over, "consensus", 70.0),
            other,
        ];
        assert!(matches!(
            resolver().resolve(&signals),
            Err(ResolutionError::MixedGames { .. })
        ));
    }

    #[test]
    fn test_scored_output_feeds_resolver() {
        let scorer = ConfidenceScorer::new(Arc::new(ScoringConfig::default()));
        let strong = split(MarketType::Moneyline, 40.0, 62.0).book("circa").build();
        let weak = split(MarketType::Moneyline, 70.0, 62.0).book("draftkings").build();
        let signals = vec![
            scorer
                .score(&Signal::from_record(&strong, "sharp_action", 22.0, BetSide::Home), None)
                .unwrap(),
            scorer
                .score(&Signal::from_record(&weak, "book_conflict", -8.0, BetSide::Away), None)
                .unwrap(),
        ];

        let recs = resolver().resolve(&signals).unwrap();
        assert_eq!(recs[0].pick.signal.recommended_side, BetSide::Home);
        assert!(recs[0].conflict_resolved);
    }
}
