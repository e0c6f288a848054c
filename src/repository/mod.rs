//! Market data access
//!
//! - `store` - the read-only MarketDataStore boundary and an in-memory store
//! - `cache` - SignalRepository, the caching/batching layer strategies read through

pub mod cache;
pub mod store;

pub use cache::{CacheStats, Clock, RecordBatch, SignalRepository};
pub use store::{latest_per_stream, InMemoryMarketStore, MarketDataStore};
