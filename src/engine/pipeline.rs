//! Detect, score and resolve in one call
//!
//! `SignalEngine` is the surface consumers use. A run returns every
//! recommendation that could be produced together with a manifest of the
//! strategies that failed and the signals that were dropped.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::domain::{Recommendation, ScoredSignal, StrategyCategory, TimeWindow};
use crate::error::{DetectionError, ProcessorFailure, ScoringError};

use super::conflict::ConflictResolver;
use super::orchestrator::Orchestrator;
use super::performance::PerformanceLookup;
use super::scoring::ConfidenceScorer;
use crate::repository::CacheStats;

/// A signal the scorer rejected
#[derive(Debug, Clone, Serialize)]
pub struct DroppedSignal {
    pub strategy: String,
    pub game_id: String,
    pub reason: String,
    #[serde(skip)]
    pub error: Option<ScoringError>,
}

/// Result of one `detect_and_resolve` run
#[derive(Debug)]
pub struct DetectionReport {
    pub run_id: Uuid,
    pub window: TimeWindow,
    /// Ordered by game time, teams, then market type
    pub recommendations: Vec<Recommendation>,
    pub completed: Vec<String>,
    pub failures: Vec<ProcessorFailure>,
    pub dropped: Vec<DroppedSignal>,
    pub cache: CacheStats,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedStrategy {
    pub strategy: String,
    pub category: StrategyCategory,
    pub reason: String,
}

/// Serialisable summary of what succeeded and what did not
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub window: TimeWindow,
    pub recommendations: usize,
    pub completed: Vec<String>,
    pub failed: Vec<FailedStrategy>,
    pub dropped_signals: Vec<DroppedSignal>,
    pub cache: CacheStats,
    pub elapsed_ms: u64,
}

impl DetectionReport {
    pub fn manifest(&self) -> RunManifest {
        RunManifest {
            run_id: self.run_id,
            window: self.window,
            recommendations: self.recommendations.len(),
            completed: self.completed.clone(),
            failed: self
                .failures
                .iter()
                .map(|f| FailedStrategy {
                    strategy: f.processor.clone(),
                    category: f.category,
                    reason: f.error.to_string(),
                })
                .collect(),
            dropped_signals: self.dropped.clone(),
            cache: self.cache,
            elapsed_ms: self.elapsed.as_millis() as u64,
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() || !self.dropped.is_empty()
    }
}

pub struct SignalEngine {
    orchestrator: Orchestrator,
    scorer: ConfidenceScorer,
    resolver: ConflictResolver,
    performance: Arc<dyn PerformanceLookup>,
}

impl SignalEngine {
    pub fn new(
        orchestrator: Orchestrator,
        scorer: ConfidenceScorer,
        resolver: ConflictResolver,
        performance: Arc<dyn PerformanceLookup>,
    ) -> Self {
        Self {
            orchestrator,
            scorer,
            resolver,
            performance,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Run every strategy over `window` and return one recommendation per
    /// game and market type
    pub async fn detect_and_resolve(
        &self,
        window: &TimeWindow,
    ) -> Result<DetectionReport, DetectionError> {
        let detection = self.orchestrator.detect(window).await?;
        let span = info_span!("resolution", run_id = %detection.run_id);
        let _guard = span.enter();

        let mut recommendations = Vec::new();
        let mut dropped = Vec::new();

        for signals in detection.signals.values() {
            let mut scored: Vec<ScoredSignal> = Vec::with_capacity(signals.len());
            for signal in signals {
                let history = self.performance.lookup(&signal.strategy_name);
                match self.scorer.score(signal, history.as_ref()) {
                    Ok(s) => scored.push(s),
                    Err(err) => {
                        warn!(
                            strategy = %signal.strategy_name,
                            game_id = %signal.game_id,
                            error = %err,
                            "dropping signal that failed scoring"
                        );
                        dropped.push(DroppedSignal {
                            strategy: signal.strategy_name.clone(),
                            game_id: signal.game_id.clone(),
                            reason: err.to_string(),
                            error: Some(err),
                        });
                    }
                }
            }
            if scored.is_empty() {
                continue;
            }
            recommendations.extend(self.resolver.resolve(&scored)?);
        }

        recommendations.sort_by(|a, b| {
            a.game_key()
                .game_time
                .cmp(&b.game_key().game_time)
                .then_with(|| a.game_key().cmp(&b.game_key()))
                .then_with(|| a.market_type().cmp(&b.market_type()))
        });
        dropped.sort_by(|a, b| (&a.strategy, &a.game_id).cmp(&(&b.strategy, &b.game_id)));

        let cache = self.orchestrator.repository().stats();
        info!(
            recommendations = recommendations.len(),
            dropped = dropped.len(),
            failed = detection.failures.len(),
            cache_hit_rate = cache.hit_rate,
            "run resolved"
        );

        Ok(DetectionReport {
            run_id: detection.run_id,
            window: detection.window,
            recommendations,
            completed: detection.completed,
            failures: detection.failures,
            dropped,
            cache,
            elapsed: detection.elapsed,
        })
    }
}
