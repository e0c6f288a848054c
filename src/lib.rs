pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod repository;
pub mod strategy;

pub use config::AppConfig;
pub use domain::{
    BetSide, ConfidenceLevel, GameKey, MarketSplitRecord, MarketType, Recommendation,
    ScoredSignal, Signal, StrategyCategory, TimeWindow,
};
pub use engine::{
    ConfidenceScorer, ConflictResolver, DetectionReport, Orchestrator, PerformanceLookup,
    PerformanceTable, RunManifest, SignalEngine,
};
pub use error::{
    DetectionError, ProcessorError, RepositoryError, ResolutionError, Result, ScoringError,
    SharplineError,
};
pub use repository::{InMemoryMarketStore, MarketDataStore, SignalRepository};
