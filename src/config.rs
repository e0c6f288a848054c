use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::engine::performance::StrategyPerformance;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub resolution: ResolutionConfig,
    #[serde(default)]
    pub strategies: StrategiesConfig,
    /// Static strategy history, used when the database holds none
    #[serde(default)]
    pub performance: Vec<StrategyPerformance>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Schema holding the split tables
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_max_connections() -> u32 {
    5
}

fn default_schema() -> String {
    "splits".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/sharpline".to_string(),
            max_connections: default_max_connections(),
            schema: default_schema(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Deadline for one detection run in milliseconds (none = wait for every processor)
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: Option<u64>,
    /// Warm the repository cache with one batched fetch before fanning out
    #[serde(default = "default_true")]
    pub prefetch: bool,
}

fn default_deadline_ms() -> Option<u64> {
    Some(30_000)
}

fn default_true() -> bool {
    true
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            prefetch: true,
        }
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// Versioned scoring table. Loaded once and shared read-only.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub version: u32,
    pub weights: ScoringWeights,
    pub levels: LevelThresholds,
    /// Ascending `min_score` steps; the last step at or below a score wins
    pub stake_buckets: Vec<StakeBucket>,
    pub source_reliability: Vec<SourceReliability>,
    pub default_reliability: f64,
    /// Observations older than this (relative to game time) lose data quality
    pub stale_after_hours: f64,
    /// Strength at which supporting components count in full
    pub support_gate_strength: f64,
    /// Share of supporting components that counts even at zero strength
    pub min_support_gate: f64,
    /// Share of the final score taken directly from signal strength
    pub strength_anchor: f64,
    /// Graded bets required before a strategy's history moves its component off neutral
    pub min_history_sample: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub signal_strength: f64,
    pub source_reliability: f64,
    pub strategy_performance: f64,
    pub data_quality: f64,
    pub market_context: f64,
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.signal_strength
            + self.source_reliability
            + self.strategy_performance
            + self.data_quality
            + self.market_context
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            signal_strength: 0.50,
            source_reliability: 0.25,
            strategy_performance: 0.15,
            data_quality: 0.05,
            market_context: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct LevelThresholds {
    pub elite: f64,
    pub high: f64,
    pub moderate: f64,
    pub low: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            elite: 90.0,
            high: 75.0,
            moderate: 60.0,
            low: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StakeBucket {
    pub min_score: f64,
    pub units: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceReliability {
    pub source: String,
    /// None applies to every book of the source
    #[serde(default)]
    pub book: Option<String>,
    pub score: f64,
}

impl SourceReliability {
    fn new(source: &str, book: Option<&str>, score: f64) -> Self {
        Self {
            source: source.to_string(),
            book: book.map(str::to_string),
            score,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let bucket = |min_score, units| StakeBucket { min_score, units };
        Self {
            version: 1,
            weights: ScoringWeights::default(),
            levels: LevelThresholds::default(),
            stake_buckets: vec![
                bucket(0.0, 0.0),
                bucket(40.0, 1.0),
                bucket(60.0, 2.0),
                bucket(75.0, 3.0),
                bucket(83.0, 4.0),
                bucket(95.0, 5.0),
            ],
            source_reliability: vec![
                SourceReliability::new("vsin", Some("circa"), 80.0),
                SourceReliability::new("vsin", Some("draftkings"), 70.0),
                SourceReliability::new("vsin", None, 65.0),
                SourceReliability::new("action_network", None, 65.0),
                SourceReliability::new("sbd", None, 60.0),
            ],
            default_reliability: 50.0,
            stale_after_hours: 6.0,
            support_gate_strength: 50.0,
            min_support_gate: 0.1,
            strength_anchor: 0.5,
            min_history_sample: 10,
        }
    }
}

impl ScoringConfig {
    /// Collect every problem with the table
    pub fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            errors.push(format!("scoring weights must sum to 1.0, got {sum:.4}"));
        }
        let w = &self.weights;
        if [
            w.signal_strength,
            w.source_reliability,
            w.strategy_performance,
            w.data_quality,
            w.market_context,
        ]
        .iter()
        .any(|v| *v < 0.0)
        {
            errors.push("scoring weights must be non-negative".to_string());
        }

        let l = &self.levels;
        if !(l.elite > l.high && l.high > l.moderate && l.moderate > l.low && l.low > 0.0) {
            errors.push("level thresholds must descend elite > high > moderate > low > 0".to_string());
        }

        if self.stake_buckets.is_empty() {
            errors.push("at least one stake bucket is required".to_string());
        }
        for pair in self.stake_buckets.windows(2) {
            if pair[1].min_score <= pair[0].min_score {
                errors.push("stake bucket min_score must be strictly ascending".to_string());
            }
            if pair[1].units < pair[0].units {
                errors.push("stake bucket units must not decrease".to_string());
            }
        }

        for entry in &self.source_reliability {
            if !(0.0..=100.0).contains(&entry.score) {
                errors.push(format!(
                    "reliability for {} must be within [0, 100]",
                    entry.source
                ));
            }
        }

        if self.support_gate_strength <= 0.0 {
            errors.push("support_gate_strength must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_support_gate) {
            errors.push("min_support_gate must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.strength_anchor) {
            errors.push("strength_anchor must be within [0, 1]".to_string());
        }
        if self.stale_after_hours <= 0.0 {
            errors.push("stale_after_hours must be positive".to_string());
        }

        errors
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Score gap at or below which opposing signals count as a near tie
    pub near_tie_margin: f64,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            near_tie_margin: 2.0,
        }
    }
}

// ============================================================================
// Strategies
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StrategiesConfig {
    pub sharp_action: SharpActionConfig,
    pub opposing_markets: OpposingMarketsConfig,
    pub book_conflict: BookConflictConfig,
    pub steam_move: SteamMoveConfig,
    pub public_fade: PublicFadeConfig,
    pub late_flip: LateFlipConfig,
    pub consensus: ConsensusConfig,
    pub underdog_value: UnderdogValueConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SharpActionConfig {
    pub enabled: bool,
    pub min_differential: f64,
}

impl Default for SharpActionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_differential: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpposingMarketsConfig {
    pub enabled: bool,
    pub min_differential: f64,
}

impl Default for OpposingMarketsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_differential: 8.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookConflictConfig {
    pub enabled: bool,
    pub min_differential: f64,
}

impl Default for BookConflictConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_differential: 8.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SteamMoveConfig {
    pub enabled: bool,
    /// Look-back from the latest observation
    pub window_minutes: i64,
    /// Stake % movement that counts as steam
    pub min_stake_move: f64,
}

impl Default for SteamMoveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_minutes: 60,
            min_stake_move: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublicFadeConfig {
    pub enabled: bool,
    /// Bet % on one side that marks it as the public side
    pub public_threshold: f64,
    pub min_books: usize,
}

impl Default for PublicFadeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            public_threshold: 75.0,
            min_books: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LateFlipConfig {
    pub enabled: bool,
    /// Hours before game time that count as "late"
    pub late_hours: f64,
    pub min_differential: f64,
}

impl Default for LateFlipConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            late_hours: 3.0,
            min_differential: 8.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub enabled: bool,
    pub min_books: usize,
    pub min_differential: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_books: 3,
            min_differential: 8.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UnderdogValueConfig {
    pub enabled: bool,
    pub min_differential: f64,
    /// Minimum American price (e.g. +100) for a side to count as the underdog
    pub min_price: f64,
}

impl Default for UnderdogValueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_differential: 8.0,
            min_price: 100.0,
        }
    }
}

impl StrategiesConfig {
    fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let positive = [
            ("sharp_action.min_differential", self.sharp_action.min_differential),
            ("opposing_markets.min_differential", self.opposing_markets.min_differential),
            ("book_conflict.min_differential", self.book_conflict.min_differential),
            ("steam_move.min_stake_move", self.steam_move.min_stake_move),
            ("late_flip.late_hours", self.late_flip.late_hours),
            ("late_flip.min_differential", self.late_flip.min_differential),
            ("consensus.min_differential", self.consensus.min_differential),
            ("underdog_value.min_differential", self.underdog_value.min_differential),
        ];
        for (name, value) in positive {
            if value <= 0.0 {
                errors.push(format!("strategies.{name} must be positive"));
            }
        }
        if self.steam_move.window_minutes <= 0 {
            errors.push("strategies.steam_move.window_minutes must be positive".to_string());
        }
        if !(50.0..=100.0).contains(&self.public_fade.public_threshold) {
            errors.push("strategies.public_fade.public_threshold must be within [50, 100]".to_string());
        }
        if self.public_fade.min_books == 0 || self.consensus.min_books == 0 {
            errors.push("strategies min_books must be at least 1".to_string());
        }
        errors
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("database.url", "postgres://localhost/sharpline")?
            .set_default("database.max_connections", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SHARPLINE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (SHARPLINE__DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("SHARPLINE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Configuration with every default, pointed at `database_url`
    pub fn default_config(database_url: &str) -> Self {
        Self {
            database: DatabaseConfig {
                url: database_url.to_string(),
                ..DatabaseConfig::default()
            },
            detection: DetectionConfig::default(),
            scoring: ScoringConfig::default(),
            resolution: ResolutionConfig::default(),
            strategies: StrategiesConfig::default(),
            performance: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = self.scoring.problems();
        errors.extend(self.strategies.problems());

        if self.resolution.near_tie_margin < 0.0 {
            errors.push("resolution.near_tie_margin must not be negative".to_string());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be at least 1".to_string());
        }
        if self
            .database
            .schema
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '_'))
        {
            errors.push("database.schema must be a plain identifier".to_string());
        }
        if self.detection.deadline_ms == Some(0) {
            errors.push("detection.deadline_ms must be positive when set".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default_config("postgres://localhost/test");
        assert!(config.validate().is_ok());
        assert!((config.scoring.weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = AppConfig::default_config("postgres://localhost/test");
        config.scoring.weights.signal_strength = 0.9;
        config.scoring.stake_buckets[2].units = 0.5;
        config.resolution.near_tie_margin = -1.0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3, "{errors:?}");
    }

    #[test]
    fn test_shipped_defaults_load_and_validate() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
        let config = AppConfig::load_from(&dir).unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.scoring.stake_buckets.len(), 6);
        assert_eq!(config.scoring.source_reliability.len(), 5);
        assert_eq!(config.resolution.near_tie_margin, 2.0);
        assert!(config.strategies.late_flip.enabled);
    }

    #[test]
    fn test_schema_must_be_identifier() {
        let mut config = AppConfig::default_config("postgres://localhost/test");
        config.database.schema = "splits; drop table x".to_string();
        assert!(config.validate().is_err());
    }
}
