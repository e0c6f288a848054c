//! Record builders shared by processor tests

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::domain::{MarketSplitRecord, MarketType, TimeWindow};

pub fn game_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 4, 23, 10, 0).unwrap()
}

pub fn window() -> TimeWindow {
    TimeWindow::lookback(game_time(), 24).unwrap()
}

pub struct SplitBuilder {
    record: MarketSplitRecord,
}

/// A record for game `g1` (BOS @ NYY) observed one hour before first pitch
pub fn split(market: MarketType, bet: f64, stake: f64) -> SplitBuilder {
    SplitBuilder {
        record: MarketSplitRecord {
            game_id: "g1".into(),
            home_team: "NYY".into(),
            away_team: "BOS".into(),
            game_time: game_time(),
            market_type: market,
            line_value: match market {
                MarketType::Moneyline => Some(-130.0),
                MarketType::Spread => Some(-1.5),
                MarketType::Total => Some(8.5),
            },
            source: "vsin".into(),
            book: Some("circa".into()),
            home_or_over_bet_pct: bet,
            home_or_over_stake_pct: stake,
            observed_at: game_time() - Duration::hours(1),
        },
    }
}

impl SplitBuilder {
    pub fn game(mut self, game_id: &str) -> Self {
        self.record.game_id = game_id.into();
        self
    }

    pub fn book(mut self, book: &str) -> Self {
        self.record.book = Some(book.into());
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.record.source = source.into();
        self
    }

    pub fn line(mut self, line: f64) -> Self {
        self.record.line_value = Some(line);
        self
    }

    pub fn minutes_before(mut self, minutes: i64) -> Self {
        self.record.observed_at = game_time() - Duration::minutes(minutes);
        self
    }

    pub fn build(self) -> MarketSplitRecord {
        self.record
    }
}
