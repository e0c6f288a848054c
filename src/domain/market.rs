use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SharplineError};

/// Market a split record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Moneyline,
    Spread,
    Total,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Moneyline => "moneyline",
            MarketType::Spread => "spread",
            MarketType::Total => "total",
        }
    }

    /// Spread and total markets are meaningless without a line
    pub fn requires_line(&self) -> bool {
        !matches!(self, MarketType::Moneyline)
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MarketType {
    type Err = SharplineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "moneyline" | "ml" | "h2h" => Ok(MarketType::Moneyline),
            "spread" | "runline" | "run_line" => Ok(MarketType::Spread),
            "total" | "totals" | "over_under" => Ok(MarketType::Total),
            other => Err(SharplineError::Validation(format!(
                "unknown market type: {other}"
            ))),
        }
    }
}

/// Side a recommendation backs
///
/// Moneyline and spread markets use Home/Away, totals use Over/Under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BetSide {
    Home,
    Away,
    Over,
    Under,
}

impl BetSide {
    /// Side favoured by a signed home/over differential. Zero favours nobody.
    pub fn from_differential(market: MarketType, differential: f64) -> Option<Self> {
        if differential > 0.0 {
            Some(Self::home_or_over(market))
        } else if differential < 0.0 {
            Some(Self::home_or_over(market).opposite())
        } else {
            None
        }
    }

    pub fn home_or_over(market: MarketType) -> Self {
        match market {
            MarketType::Total => BetSide::Over,
            _ => BetSide::Home,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            BetSide::Home => BetSide::Away,
            BetSide::Away => BetSide::Home,
            BetSide::Over => BetSide::Under,
            BetSide::Under => BetSide::Over,
        }
    }

    pub fn is_home_or_over(&self) -> bool {
        matches!(self, BetSide::Home | BetSide::Over)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BetSide::Home => "HOME",
            BetSide::Away => "AWAY",
            BetSide::Over => "OVER",
            BetSide::Under => "UNDER",
        }
    }
}

impl fmt::Display for BetSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive `[start, end]` range of observation times scoping a detection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end < start {
            return Err(SharplineError::Validation(format!(
                "window end {end} precedes start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Window covering the `hours` leading up to `now`
    pub fn lookback(now: DateTime<Utc>, hours: i64) -> Result<Self> {
        Self::new(now - Duration::hours(hours.max(0)), now)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    /// True when no observation made at or before `now` can fall inside
    pub fn is_future_only(&self, now: DateTime<Utc>) -> bool {
        self.start > now
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} .. {}]",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

/// Identity of a game independent of any source's game id format
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameKey {
    pub away_team: String,
    pub home_team: String,
    pub game_time: DateTime<Utc>,
}

impl fmt::Display for GameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} ({})",
            self.away_team,
            self.home_team,
            self.game_time.format("%Y-%m-%d %H:%M")
        )
    }
}

/// One observation of bet/money splits for a game, market, source and book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSplitRecord {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub game_time: DateTime<Utc>,
    pub market_type: MarketType,
    /// Spread/total line, or the home American price for moneyline
    pub line_value: Option<f64>,
    pub source: String,
    pub book: Option<String>,
    pub home_or_over_bet_pct: f64,
    pub home_or_over_stake_pct: f64,
    pub observed_at: DateTime<Utc>,
}

impl MarketSplitRecord {
    /// Signed stake % minus bet % for the home/over side
    pub fn differential(&self) -> f64 {
        self.home_or_over_stake_pct - self.home_or_over_bet_pct
    }

    pub fn game_key(&self) -> GameKey {
        GameKey {
            away_team: self.away_team.clone(),
            home_team: self.home_team.clone(),
            game_time: self.game_time,
        }
    }

    /// Data observed at or after first pitch says nothing about the pregame market
    pub fn observed_before_start(&self) -> bool {
        self.observed_at < self.game_time
    }

    pub fn percentages_in_range(&self) -> bool {
        (0.0..=100.0).contains(&self.home_or_over_bet_pct)
            && (0.0..=100.0).contains(&self.home_or_over_stake_pct)
    }

    /// Hours between observation and game start
    pub fn hours_before_game(&self) -> f64 {
        (self.game_time - self.observed_at).num_seconds() as f64 / 3600.0
    }

    /// Key identifying one observation stream
    pub fn stream_key(&self) -> (String, MarketType, String, Option<String>) {
        (
            self.game_id.clone(),
            self.market_type,
            self.source.clone(),
            self.book.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_rejects_inverted_range() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert!(TimeWindow::new(start, end).is_err());
        assert!(TimeWindow::new(end, start).is_ok());
    }

    #[test]
    fn side_follows_differential_sign() {
        assert_eq!(
            BetSide::from_differential(MarketType::Total, 4.0),
            Some(BetSide::Over)
        );
        assert_eq!(
            BetSide::from_differential(MarketType::Spread, -4.0),
            Some(BetSide::Away)
        );
        assert_eq!(BetSide::from_differential(MarketType::Moneyline, 0.0), None);
    }

    #[test]
    fn market_type_parses_aliases() {
        assert_eq!("ML".parse::<MarketType>().unwrap(), MarketType::Moneyline);
        assert_eq!("run_line".parse::<MarketType>().unwrap(), MarketType::Spread);
        assert!("parlay".parse::<MarketType>().is_err());
    }
}
