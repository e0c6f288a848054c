use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::market::{BetSide, GameKey, MarketSplitRecord, MarketType};

/// Raw output of one strategy for one game/market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub game_time: DateTime<Utc>,
    pub market_type: MarketType,
    /// Signed stake % minus bet % for the home/over side
    pub differential: f64,
    pub strategy_name: String,
    pub source: String,
    pub book: Option<String>,
    pub recommended_side: BetSide,
    /// |differential|
    pub raw_strength: f64,
    pub line_value: Option<f64>,
    /// Observation time of the data the signal was derived from
    pub observed_at: DateTime<Utc>,
    pub produced_at: DateTime<Utc>,
}

impl Signal {
    /// Build a signal from the record it was derived from
    pub fn from_record(
        record: &MarketSplitRecord,
        strategy_name: &str,
        differential: f64,
        recommended_side: BetSide,
    ) -> Self {
        Self {
            game_id: record.game_id.clone(),
            home_team: record.home_team.clone(),
            away_team: record.away_team.clone(),
            game_time: record.game_time,
            market_type: record.market_type,
            differential,
            strategy_name: strategy_name.to_string(),
            source: record.source.clone(),
            book: record.book.clone(),
            recommended_side,
            raw_strength: differential.abs(),
            line_value: record.line_value,
            observed_at: record.observed_at,
            produced_at: Utc::now(),
        }
    }

    /// Same signal attributed to an aggregate source rather than one book
    pub fn with_source(mut self, source: &str, book: Option<String>) -> Self {
        self.source = source.to_string();
        self.book = book;
        self
    }

    pub fn game_key(&self) -> GameKey {
        GameKey {
            away_team: self.away_team.clone(),
            home_team: self.home_team.clone(),
            game_time: self.game_time,
        }
    }
}

/// Discrete confidence bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Minimal,
    Low,
    Moderate,
    High,
    Elite,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Minimal => "MINIMAL",
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::Moderate => "MODERATE",
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::Elite => "ELITE",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-component values (each 0-100) behind a confidence score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub signal_strength: f64,
    pub source_reliability: f64,
    pub strategy_performance: f64,
    pub data_quality: f64,
    pub market_context: f64,
}

/// A signal enriched with its confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSignal {
    #[serde(flatten)]
    pub signal: Signal,
    pub confidence_score: f64,
    pub confidence_level: ConfidenceLevel,
    pub components: ScoreComponents,
    pub explanation: String,
    /// Suggested stake in units
    pub stake_suggestion: f64,
}

/// Final per-(game, market) decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub pick: ScoredSignal,
    /// False when a contradiction fell inside the near-tie band
    pub conflict_resolved: bool,
    /// Distinct sides proposed for this game/market
    pub alternatives_considered: usize,
    /// Scored signals the decision was drawn from
    pub signals_considered: usize,
}

impl Recommendation {
    pub fn game_key(&self) -> GameKey {
        self.pick.signal.game_key()
    }

    pub fn market_type(&self) -> MarketType {
        self.pick.signal.market_type
    }
}
