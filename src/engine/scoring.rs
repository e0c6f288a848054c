//! Multi-factor confidence scoring
//!
//! Turns a raw signal into a 0-100 confidence score from five components:
//!
//! | Component              | Default weight | Input                                  |
//! |------------------------|----------------|----------------------------------------|
//! | `signal_strength`      | 0.50           | piecewise curve over \|differential\|  |
//! | `source_reliability`   | 0.25           | `(source, book)` table                 |
//! | `strategy_performance` | 0.15           | trailing win rate / ROI                |
//! | `data_quality`         | 0.05           | book, staleness, line presence         |
//! | `market_context`       | 0.05           | hours before first pitch               |
//!
//! Supporting components are gated by strength so a weak signal cannot be
//! carried by a reliable source alone, and the weighted sum is anchored to
//! strength. The score is non-decreasing in `raw_strength` with every other
//! input held fixed.

use std::sync::Arc;

use tracing::trace;

use crate::config::ScoringConfig;
use crate::domain::{ConfidenceLevel, ScoreComponents, ScoredSignal, Signal};
use crate::error::ScoringError;

use super::performance::StrategyPerformance;

/// Win rate needed to break even at -110
const BREAK_EVEN_WIN_RATE: f64 = 0.5238;
/// Graded bets at which history carries half its weight
const HISTORY_SHRINKAGE: f64 = 30.0;
const NEUTRAL: f64 = 50.0;

/// Piecewise-linear strength curve over |differential|, clamped to [0, 100]
pub fn signal_strength(differential: f64) -> f64 {
    let d = differential.abs();
    if !d.is_finite() {
        return 0.0;
    }
    let strength = if d >= 25.0 {
        90.0 + ((d - 25.0) * 0.8).min(10.0)
    } else if d >= 18.0 {
        // capped so the curve never drops at the 25 boundary
        (80.0 + (d - 18.0) * 2.5).min(90.0)
    } else if d >= 12.0 {
        65.0 + (d - 12.0) * 2.5
    } else if d >= 8.0 {
        50.0 + (d - 8.0) * 3.75
    } else if d >= 5.0 {
        25.0 + (d - 5.0) * 8.33
    } else if d >= 3.0 {
        10.0 + (d - 3.0) * 7.5
    } else {
        d * 3.33
    };
    strength.clamp(0.0, 100.0)
}

pub struct ConfidenceScorer {
    config: Arc<ScoringConfig>,
}

impl ConfidenceScorer {
    pub fn new(config: Arc<ScoringConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one signal. Malformed signals are rejected, never zero-scored.
    pub fn score(
        &self,
        signal: &Signal,
        performance: Option<&StrategyPerformance>,
    ) -> Result<ScoredSignal, ScoringError> {
        validate(signal)?;

        let components = ScoreComponents {
            signal_strength: signal_strength(signal.raw_strength),
            source_reliability: self.source_reliability(&signal.source, signal.book.as_deref()),
            strategy_performance: self.strategy_performance(performance),
            data_quality: self.data_quality(signal),
            market_context: self.market_context(signal),
        };
        let confidence_score = self.combine(&components);
        let confidence_level = self.level(confidence_score);
        let stake_suggestion = self.stake(confidence_score);

        trace!(
            strategy = %signal.strategy_name,
            game = %signal.game_id,
            market = %signal.market_type,
            score = confidence_score,
            level = %confidence_level,
            "scored signal"
        );

        Ok(ScoredSignal {
            explanation: explain(signal, &components, confidence_level),
            signal: signal.clone(),
            confidence_score,
            confidence_level,
            components,
            stake_suggestion,
        })
    }

    fn combine(&self, c: &ScoreComponents) -> f64 {
        let w = &self.config.weights;
        let support = w.source_reliability * c.source_reliability
            + w.strategy_performance * c.strategy_performance
            + w.data_quality * c.data_quality
            + w.market_context * c.market_context;
        let gate = (c.signal_strength / self.config.support_gate_strength)
            .min(1.0)
            .max(self.config.min_support_gate);
        let weighted = w.signal_strength * c.signal_strength + gate * support;

        let anchor = self.config.strength_anchor;
        (anchor * c.signal_strength + (1.0 - anchor) * weighted).clamp(0.0, 100.0)
    }

    /// Exact `(source, book)`, then the source-wide entry, then the default
    pub fn source_reliability(&self, source: &str, book: Option<&str>) -> f64 {
        let table = &self.config.source_reliability;
        let exact = book.and_then(|book| {
            table
                .iter()
                .find(|e| e.source == source && e.book.as_deref() == Some(book))
        });
        exact
            .or_else(|| table.iter().find(|e| e.source == source && e.book.is_none()))
            .map(|e| e.score)
            .unwrap_or(self.config.default_reliability)
    }

    /// Neutral until the strategy has enough graded bets
    pub fn strategy_performance(&self, performance: Option<&StrategyPerformance>) -> f64 {
        let Some(p) = performance else {
            return NEUTRAL;
        };
        if p.sample_size < self.config.min_history_sample
            || !p.win_rate.is_finite()
            || !p.roi.is_finite()
        {
            return NEUTRAL;
        }

        let win_edge = NEUTRAL + (p.win_rate - BREAK_EVEN_WIN_RATE) * 500.0;
        let roi = NEUTRAL + p.roi * 5.0;
        let raw = ((win_edge + roi) / 2.0).clamp(0.0, 100.0);

        let n = p.sample_size as f64;
        let trust = n / (n + HISTORY_SHRINKAGE);
        NEUTRAL + (raw - NEUTRAL) * trust
    }

    pub fn data_quality(&self, signal: &Signal) -> f64 {
        let mut quality: f64 = 100.0;
        if signal.book.is_none() {
            quality -= 30.0;
        }
        let hours_before = (signal.game_time - signal.observed_at).num_seconds() as f64 / 3600.0;
        if hours_before > self.config.stale_after_hours {
            quality -= 30.0;
        }
        if signal.market_type.requires_line() && signal.line_value.is_none() {
            quality -= 40.0;
        }
        quality.max(0.0)
    }

    /// Closer to first pitch scores higher
    pub fn market_context(&self, signal: &Signal) -> f64 {
        let hours_before = (signal.game_time - signal.observed_at).num_seconds() as f64 / 3600.0;
        match hours_before {
            h if h <= 1.0 => 100.0,
            h if h <= 3.0 => 80.0,
            h if h <= 6.0 => 60.0,
            h if h <= 24.0 => 40.0,
            _ => 20.0,
        }
    }

    pub fn level(&self, score: f64) -> ConfidenceLevel {
        let l = &self.config.levels;
        if score >= l.elite {
            ConfidenceLevel::Elite
        } else if score >= l.high {
            ConfidenceLevel::High
        } else if score >= l.moderate {
            ConfidenceLevel::Moderate
        } else if score >= l.low {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::Minimal
        }
    }

    /// Units for the highest bucket the score reaches
    pub fn stake(&self, score: f64) -> f64 {
        self.config
            .stake_buckets
            .iter()
            .filter(|b| score >= b.min_score)
            .last()
            .map(|b| b.units)
            .unwrap_or(0.0)
    }
}

fn validate(signal: &Signal) -> Result<(), ScoringError> {
    let required = [
        ("game_id", signal.game_id.as_str()),
        ("home_team", signal.home_team.as_str()),
        ("away_team", signal.away_team.as_str()),
        ("strategy_name", signal.strategy_name.as_str()),
        ("source", signal.source.as_str()),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ScoringError::MissingField(field));
        }
    }

    let d = signal.differential;
    if !d.is_finite() {
        return Err(ScoringError::NonFiniteDifferential(d));
    }
    if d.abs() > 100.0 {
        return Err(ScoringError::DifferentialOutOfRange(d));
    }
    if !signal.raw_strength.is_finite() || (signal.raw_strength - d.abs()).abs() > 1e-9 {
        return Err(ScoringError::InconsistentStrength {
            differential: d,
            raw_strength: signal.raw_strength,
        });
    }
    Ok(())
}

fn explain(signal: &Signal, c: &ScoreComponents, level: ConfidenceLevel) -> String {
    format!(
        "{} {} {} on {}: {:.1}% differential (strength {:.0}), {} reliability {:.0}, \
         history {:.0}, data quality {:.0}, timing {:.0}",
        level,
        signal.strategy_name,
        signal.recommended_side,
        signal.market_type,
        signal.differential,
        c.signal_strength,
        signal.book.as_deref().unwrap_or(&signal.source),
        c.source_reliability,
        c.strategy_performance,
        c.data_quality,
        c.market_context,
    )
}
