use std::fmt;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Bar size requested from the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
pub enum Interval {
    #[default]
    #[serde(rename = "1min")]
    #[value(name = "1min")]
    OneMinute,
    #[serde(rename = "5min")]
    #[value(name = "5min")]
    FiveMinutes,
}

impl Interval {
    pub const ALL: [Interval; 2] = [Interval::OneMinute, Interval::FiveMinutes];

    pub fn as_str(self) -> &'static str {
        match self {
            Interval::OneMinute => "1min",
            Interval::FiveMinutes => "5min",
        }
    }

    pub fn minutes(self) -> i64 {
        match self {
            Interval::OneMinute => 1,
            Interval::FiveMinutes => 5,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bias {
    Long,
    Short,
    Neutral,
}

impl Bias {
    pub fn is_actionable(self) -> bool {
        !matches!(self, Bias::Neutral)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Bias::Long => "LONG",
            Bias::Short => "SHORT",
            Bias::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Time-of-day bucket of the US equity regular session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Session {
    Opening,
    Midday,
    Power,
    Off,
}

impl Session {
    pub fn as_str(self) -> &'static str {
        match self {
            Session::Opening => "OPENING",
            Session::Midday => "MIDDAY",
            Session::Power => "POWER",
            Session::Off => "OFF",
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Signal preset selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SignalMode {
    FastScalp,
    #[default]
    CleanerSignals,
}

impl SignalMode {
    pub const ALL: [SignalMode; 2] = [SignalMode::FastScalp, SignalMode::CleanerSignals];

    pub fn label(self) -> &'static str {
        match self {
            SignalMode::FastScalp => "Fast scalp",
            SignalMode::CleanerSignals => "Cleaner signals",
        }
    }
}

impl fmt::Display for SignalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// One OHLCV bar. `timestamp` is exchange-local (US/Eastern) time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub symbol: String,
    pub bias: Bias,
    /// Scalp score, always within 0..=100.
    pub setup_score: u32,
    pub reason: String,
    pub entry: Option<f64>,
    pub stop: Option<f64>,
    pub target_1r: Option<f64>,
    pub target_2r: Option<f64>,
    pub last_price: Option<f64>,
    pub timestamp: Option<NaiveDateTime>,
    pub session: Session,
}

impl SignalResult {
    pub fn neutral(symbol: &str, score: u32, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            bias: Bias::Neutral,
            setup_score: score.min(100),
            reason: reason.into(),
            entry: None,
            stop: None,
            target_1r: None,
            target_2r: None,
            last_price: None,
            timestamp: None,
            session: Session::Off,
        }
    }

    pub fn at_bar(mut self, last_price: f64, timestamp: NaiveDateTime, session: Session) -> Self {
        self.last_price = Some(last_price);
        self.timestamp = Some(timestamp);
        self.session = session;
        self
    }
}

/// Split free-form watchlist text on commas and newlines into upper-case tickers.
/// Empty entries are dropped and the first occurrence of a duplicate wins.
pub fn parse_watchlist(text: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for raw in text.split([',', '\n', '\r']) {
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() || symbols.contains(&symbol) {
            continue;
        }
        symbols.push(symbol);
    }
    symbols
}
