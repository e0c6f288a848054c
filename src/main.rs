use std::sync::Arc;

use chrono::Utc;
use anyhow::Context;
use clap::Parser;
use sharpline::adapters::PostgresMarketStore;
use sharpline::cli::{Cli, Commands};
use sharpline::config::AppConfig;
use sharpline::domain::TimeWindow;
use sharpline::engine::{DetectionReport, PerformanceTable, SignalEngine};
use sharpline::error::Result;
use sharpline::repository::InMemoryMarketStore;
use tracing::{info, warn};

mod main_runtime;

use main_runtime::{build_engine, init_logging, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = load_config(&cli.config);
    match &loaded {
        Ok(config) => init_logging(&config.logging.level, cli.json_logs || config.logging.json),
        Err(_) => init_logging("info", cli.json_logs),
    }
    let mut config = loaded?;

    match cli.command {
        Commands::Detect {
            hours,
            deadline_ms,
            manifest_only,
        } => {
            if deadline_ms.is_some() {
                config.detection.deadline_ms = deadline_ms;
            }
            run_detect(config, hours, manifest_only).await?;
        }
        Commands::Replay {
            file,
            start,
            end,
            manifest_only,
        } => {
            let store = InMemoryMarketStore::from_json_file(&file)
                .with_context(|| format!("loading replay file {}", file.display()))?;
            let engine = build_engine(&config, Arc::new(store), PerformanceTable::new())?;
            let window = TimeWindow::new(start, end)?;
            run_once(&engine, &window, manifest_only).await?;
        }
        Commands::CheckConfig => {
            println!(
                "configuration ok: scoring v{}, {} strategies enabled",
                config.scoring.version,
                sharpline::strategy::build_processors(&config.strategies).len()
            );
        }
    }

    Ok(())
}

async fn run_detect(config: AppConfig, hours: i64, manifest_only: bool) -> Result<()> {
    let store = PostgresMarketStore::new(
        &config.database.url,
        config.database.max_connections,
        &config.database.schema,
    )
    .await
    .context("connecting to the split database")?;

    let performance = match store.load_performance().await {
        Ok(table) => table,
        Err(e) => {
            warn!(error = %e, "strategy history unavailable, using configured entries only");
            PerformanceTable::new()
        }
    };

    let engine = build_engine(&config, Arc::new(store), performance)?;
    let window = TimeWindow::lookback(Utc::now(), hours)?;
    run_once(&engine, &window, manifest_only).await
}

async fn run_once(engine: &SignalEngine, window: &TimeWindow, manifest_only: bool) -> Result<()> {
    let report = engine.detect_and_resolve(window).await?;
    print_report(&report, manifest_only)?;
    if report.is_partial() {
        info!(
            failed = report.failures.len(),
            dropped = report.dropped.len(),
            "run completed with partial results"
        );
    }
    Ok(())
}

fn print_report(report: &DetectionReport, manifest_only: bool) -> Result<()> {
    let manifest = report.manifest();
    let output = if manifest_only {
        serde_json::to_string_pretty(&manifest)?
    } else {
        serde_json::to_string_pretty(&serde_json::json!({
            "manifest": manifest,
            "recommendations": report.recommendations,
        }))?
    };
    println!("{output}");
    Ok(())
}
