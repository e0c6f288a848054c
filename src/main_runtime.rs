use std::sync::Arc;

use sharpline::config::AppConfig;
use sharpline::engine::{
    ConfidenceScorer, ConflictResolver, Orchestrator, PerformanceTable, SignalEngine,
};
use sharpline::error::{Result, SharplineError};
use sharpline::repository::{MarketDataStore, SignalRepository};
use sharpline::strategy::build_processors;
use tracing_subscriber::EnvFilter;

/// Console (plain or JSON) plus optional daily file logging. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str, json: bool) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},sharpline={level},sqlx=warn")));

    // File logging is opt-in through SHARPLINE_LOG_DIR.
    //
    // `tracing_appender::rolling::daily` panics if it cannot create the first
    // file, so writability is checked up front.
    let file_layer = std::env::var("SHARPLINE_LOG_DIR").ok().and_then(|log_dir| {
        if std::fs::create_dir_all(&log_dir).is_err() {
            eprintln!("Warning: Could not create log directory {log_dir}, file logging disabled");
            return None;
        }
        let probe = std::path::Path::new(&log_dir).join(".sharpline_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&probe)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&probe);
                let file_appender = tracing_appender::rolling::daily(&log_dir, "sharpline.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // Lives for the rest of the process
                Box::leak(Box::new(guard));
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {log_dir} ({e}), file logging disabled"
                );
                None
            }
        }
    });

    // Logs go to stderr so stdout carries only the report
    let (plain, structured) = if json {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        )
    } else {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            ),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured)
        .with(file_layer)
        .init();
}

/// Load and validate configuration
pub fn load_config(dir: &std::path::Path) -> Result<AppConfig> {
    let config = AppConfig::load_from(dir)?;
    config.validate().map_err(SharplineError::InvalidConfig)?;
    Ok(config)
}

/// Wire repository, processors, scorer and resolver around `store`
pub fn build_engine(
    config: &AppConfig,
    store: Arc<dyn MarketDataStore>,
    performance: PerformanceTable,
) -> Result<SignalEngine> {
    let repository = Arc::new(SignalRepository::new(store));
    let processors = build_processors(&config.strategies);
    let orchestrator = Orchestrator::new(repository, processors, config.detection.clone())?;

    let mut history = PerformanceTable::from_entries(config.performance.iter().cloned());
    history.merge(performance);

    Ok(SignalEngine::new(
        orchestrator,
        ConfidenceScorer::new(Arc::new(config.scoring.clone())),
        ConflictResolver::new(config.resolution.clone()),
        Arc::new(history),
    ))
}
