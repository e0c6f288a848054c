//! Detection engine
//!
//! - `orchestrator` - runs strategy processors concurrently with per-processor isolation
//! - `scoring` - multi-factor confidence scorer
//! - `conflict` - collapses a game's signals into one pick per market type
//! - `performance` - strategy history lookup
//! - `pipeline` - `SignalEngine`, tying the above together

pub mod conflict;
pub mod orchestrator;
pub mod performance;
pub mod pipeline;
pub mod scoring;

pub use conflict::ConflictResolver;
pub use orchestrator::{Detection, Orchestrator};
pub use performance::{PerformanceLookup, PerformanceTable, StrategyPerformance};
pub use pipeline::{DetectionReport, DroppedSignal, FailedStrategy, RunManifest, SignalEngine};
pub use scoring::{signal_strength, ConfidenceScorer};
