use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, info, instrument, warn};

use crate::domain::{MarketSplitRecord, MarketType, SourceTable, TimeWindow};
use crate::engine::performance::{PerformanceTable, StrategyPerformance};
use crate::error::{Result, StoreError};
use crate::repository::MarketDataStore;

/// Internal row type for sqlx query_as
#[derive(Debug, FromRow)]
struct SplitRow {
    game_id: String,
    home_team: String,
    away_team: String,
    game_time: DateTime<Utc>,
    market_type: String,
    line_value: Option<f64>,
    source: String,
    book: Option<String>,
    home_or_over_bet_pct: f64,
    home_or_over_stake_pct: f64,
    observed_at: DateTime<Utc>,
}

impl TryFrom<SplitRow> for MarketSplitRecord {
    type Error = StoreError;

    fn try_from(row: SplitRow) -> std::result::Result<Self, Self::Error> {
        let market_type: MarketType = row.market_type.parse().map_err(|_| {
            StoreError::Malformed(format!(
                "game {} has unknown market type {:?}",
                row.game_id, row.market_type
            ))
        })?;
        Ok(MarketSplitRecord {
            game_id: row.game_id,
            home_team: row.home_team,
            away_team: row.away_team,
            game_time: row.game_time,
            market_type,
            line_value: row.line_value,
            source: row.source,
            book: row.book,
            home_or_over_bet_pct: row.home_or_over_bet_pct,
            home_or_over_stake_pct: row.home_or_over_stake_pct,
            observed_at: row.observed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PerformanceRow {
    strategy_name: String,
    win_rate: f64,
    roi: f64,
    sample_size: i32,
}

/// PostgreSQL market data store
#[derive(Clone)]
pub struct PostgresMarketStore {
    pool: PgPool,
    schema: String,
}

impl PostgresMarketStore {
    /// Connect to PostgreSQL
    pub async fn new(database_url: &str, max_connections: u32, schema: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self::from_pool(pool, schema))
    }

    /// Create a store from an existing connection pool
    pub fn from_pool(pool: PgPool, schema: &str) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
        }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn history_table(&self) -> String {
        format!("{}.market_split_history", self.schema)
    }

    fn sql_for(&self, table: SourceTable) -> String {
        const COLUMNS: &str = "game_id, home_team, away_team, game_time, market_type, line_value, \
             source, book, home_or_over_bet_pct, home_or_over_stake_pct, observed_at";
        match table {
            SourceTable::SplitHistory => format!(
                "SELECT {COLUMNS} FROM {} \
                 WHERE observed_at BETWEEN $1 AND $2 AND observed_at < game_time \
                 ORDER BY game_id, market_type, source, book, observed_at",
                self.history_table()
            ),
            SourceTable::LatestSplits => format!(
                "SELECT DISTINCT ON (game_id, market_type, source, book) {COLUMNS} FROM {} \
                 WHERE observed_at BETWEEN $1 AND $2 AND observed_at < game_time \
                 ORDER BY game_id, market_type, source, book, observed_at DESC",
                self.history_table()
            ),
        }
    }

    /// Load trailing strategy results written by the backtesting job
    pub async fn load_performance(&self) -> Result<PerformanceTable> {
        let rows = sqlx::query_as::<_, PerformanceRow>(&format!(
            "SELECT strategy_name, win_rate, roi, sample_size FROM {}.strategy_performance",
            self.schema
        ))
        .fetch_all(&self.pool)
        .await?;

        let table = PerformanceTable::from_entries(rows.into_iter().map(|row| {
            StrategyPerformance {
                strategy_name: row.strategy_name,
                win_rate: row.win_rate,
                roi: row.roi,
                sample_size: row.sample_size.max(0) as u32,
            }
        }));
        info!("Loaded performance history for {} strategies", table.len());
        Ok(table)
    }
}

#[async_trait]
impl MarketDataStore for PostgresMarketStore {
    #[instrument(skip_all, fields(table = %table, window = %window))]
    async fn query(
        &self,
        table: SourceTable,
        window: &TimeWindow,
    ) -> std::result::Result<Vec<MarketSplitRecord>, StoreError> {
        let rows = sqlx::query_as::<_, SplitRow>(&self.sql_for(table))
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;

        let total = rows.len();
        let mut records = Vec::with_capacity(total);
        for row in rows {
            match MarketSplitRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping row: {}", e),
            }
        }

        debug!("Fetched {}/{} rows from {}", records.len(), total, table);
        Ok(records)
    }
}
