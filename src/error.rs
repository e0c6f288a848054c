use std::fmt;

use thiserror::Error;

use crate::domain::{StrategyCategory, TimeWindow};

/// Main error type for the detection engine
#[derive(Error, Debug)]
pub enum SharplineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Engine errors
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Binary glue attaches context with anyhow; keep the whole chain in the message
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for SharplineError
pub type Result<T> = std::result::Result<T, SharplineError>;

/// Errors raised at the MarketDataStore boundary
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed row: {0}")]
    Malformed(String),
}

/// A failed repository fetch, naming what was being fetched
#[derive(Error, Debug)]
#[error("fetch of {category} over {window} failed: {source}")]
pub struct RepositoryError {
    pub category: StrategyCategory,
    pub window: TimeWindow,
    #[source]
    pub source: StoreError,
}

impl RepositoryError {
    pub fn new(category: StrategyCategory, window: TimeWindow, source: StoreError) -> Self {
        Self {
            category,
            window,
            source,
        }
    }
}

/// Failure of a single strategy processor invocation
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("arithmetic fault: {0}")]
    Arithmetic(String),

    #[error("processor panicked: {0}")]
    Panicked(String),

    #[error("processor did not finish before the deadline")]
    TimedOut,

    #[error("processor cancelled")]
    Cancelled,
}

/// A signal that could not be scored
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("signal is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("differential is not finite: {0}")]
    NonFiniteDifferential(f64),

    #[error("differential {0} outside [-100, 100]")]
    DifferentialOutOfRange(f64),

    #[error("raw strength {raw_strength} does not match |differential| {differential}")]
    InconsistentStrength { differential: f64, raw_strength: f64 },
}

/// ConflictResolver contract violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("cannot resolve an empty signal set")]
    EmptyInput,

    #[error("signals span more than one game: {first} and {other}")]
    MixedGames { first: String, other: String },
}

/// One processor that contributed no signals to a run, and why
#[derive(Debug)]
pub struct ProcessorFailure {
    pub processor: String,
    pub category: StrategyCategory,
    pub error: ProcessorError,
}

impl fmt::Display for ProcessorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.processor, self.category, self.error)
    }
}

/// Errors surfaced at or above the Orchestrator boundary
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("no strategy processors registered")]
    EmptyRegistry,

    #[error("strategy processor registered twice: {0}")]
    DuplicateProcessor(String),

    #[error(
        "deadline exceeded after {elapsed_ms}ms with no processor completed; failed: [{}]",
        format_failures(.failures)
    )]
    DeadlineExceeded {
        elapsed_ms: u64,
        failures: Vec<ProcessorFailure>,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

fn format_failures(failures: &[ProcessorFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::error::Error as _;

    #[test]
    fn repository_error_names_category_and_keeps_source() {
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap(),
        )
        .unwrap();
        let err = RepositoryError::new(
            StrategyCategory::SteamMove,
            window,
            StoreError::Unavailable("connection refused".into()),
        );

        let text = err.to_string();
        assert!(text.contains("steam_move"));
        assert!(text.contains("connection refused"));
        assert!(err.source().is_some());
    }

    #[test]
    fn context_chain_survives_conversion() {
        use anyhow::Context;

        let missing: std::result::Result<(), SharplineError> = Err(SharplineError::Io(
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        ));
        let err: SharplineError = missing
            .context("loading replay file splits.json")
            .unwrap_err()
            .into();

        assert!(matches!(err, SharplineError::Other(_)));
        let text = err.to_string();
        assert!(text.contains("loading replay file splits.json"));
        assert!(text.contains("no such file"));
    }

    #[test]
    fn deadline_error_lists_failures() {
        let err = DetectionError::DeadlineExceeded {
            elapsed_ms: 50,
            failures: vec![ProcessorFailure {
                processor: "late_flip".into(),
                category: StrategyCategory::LateFlip,
                error: ProcessorError::TimedOut,
            }],
        };
        let text = err.to_string();
        assert!(text.contains("late_flip"));
        assert!(text.contains("deadline"));
    }
}
