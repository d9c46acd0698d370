use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{parse_watchlist, Interval, SignalMode};
use crate::session::TimeFilter;

pub const COOLDOWN_MINUTES: RangeInclusive<u32> = 1..=30;
pub const ALERT_THRESHOLD: RangeInclusive<u32> = 60..=100;
pub const MAX_ALERTS_KEPT: RangeInclusive<usize> = 10..=300;
pub const SECONDS_BETWEEN_CALLS: RangeInclusive<f64> = 0.5..=5.0;
pub const REFRESH_SECONDS: RangeInclusive<u64> = 10..=180;
pub const MAX_WATCHLIST: usize = 25;

pub const DEFAULT_WATCHLIST: [&str; 5] = ["AAPL", "NVDA", "TSLA", "SPY", "QQQ"];

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: String,
        max: String,
        value: String,
    },
    #[error("watchlist holds {0} tickers; keep it to {MAX_WATCHLIST} or fewer")]
    WatchlistTooLong(usize),
}

fn check<T>(field: &'static str, range: &RangeInclusive<T>, value: T) -> Result<T, SettingsError>
where
    T: PartialOrd + ToString,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(SettingsError::OutOfRange {
            field,
            min: range.start().to_string(),
            max: range.end().to_string(),
            value: value.to_string(),
        })
    }
}

/// Every user-facing scanner control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSettings {
    pub watchlist: Vec<String>,
    pub interval: Interval,
    pub mode: SignalMode,
    pub time_filter: TimeFilter,
    pub cooldown_minutes: u32,
    /// `None` follows the mode's minimum actionable score.
    pub alert_threshold: Option<u32>,
    pub capture_alerts: bool,
    pub max_alerts_kept: usize,
    pub min_seconds_between_calls: f64,
    pub auto_refresh: bool,
    pub refresh_seconds: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            watchlist: DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect(),
            interval: Interval::OneMinute,
            mode: SignalMode::CleanerSignals,
            time_filter: TimeFilter::default(),
            cooldown_minutes: 7,
            alert_threshold: None,
            capture_alerts: true,
            max_alerts_kept: 60,
            min_seconds_between_calls: 1.0,
            auto_refresh: false,
            refresh_seconds: 30,
        }
    }
}

impl ScanSettings {
    pub fn effective_threshold(&self) -> u32 {
        self.alert_threshold
            .unwrap_or(self.mode.preset().min_actionable_score)
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_seconds)
    }

    pub fn min_call_gap(&self) -> Duration {
        Duration::from_secs_f64(self.min_seconds_between_calls)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.watchlist.len() > MAX_WATCHLIST {
            return Err(SettingsError::WatchlistTooLong(self.watchlist.len()));
        }
        check("cooldown_minutes", &COOLDOWN_MINUTES, self.cooldown_minutes)?;
        if let Some(threshold) = self.alert_threshold {
            check("alert_threshold", &ALERT_THRESHOLD, threshold)?;
        }
        check("max_alerts_kept", &MAX_ALERTS_KEPT, self.max_alerts_kept)?;
        check(
            "min_seconds_between_calls",
            &SECONDS_BETWEEN_CALLS,
            self.min_seconds_between_calls,
        )?;
        check("refresh_seconds", &REFRESH_SECONDS, self.refresh_seconds)?;
        Ok(())
    }

    /// Apply a partial update. Nothing changes unless the merged result is valid.
    pub fn apply(&self, update: SettingsUpdate) -> Result<ScanSettings, SettingsError> {
        let mut next = self.clone();
        if let Some(text) = update.watchlist {
            next.watchlist = parse_watchlist(&text);
        }
        if let Some(interval) = update.interval {
            next.interval = interval;
        }
        if let Some(mode) = update.mode {
            next.mode = mode;
        }
        if let Some(filter) = update.time_filter {
            next.time_filter = filter;
        }
        if let Some(minutes) = update.cooldown_minutes {
            next.cooldown_minutes = minutes;
        }
        if let Some(threshold) = update.alert_threshold {
            next.alert_threshold = threshold;
        }
        if let Some(capture) = update.capture_alerts {
            next.capture_alerts = capture;
        }
        if let Some(kept) = update.max_alerts_kept {
            next.max_alerts_kept = kept;
        }
        if let Some(seconds) = update.min_seconds_between_calls {
            next.min_seconds_between_calls = seconds;
        }
        if let Some(auto_refresh) = update.auto_refresh {
            next.auto_refresh = auto_refresh;
        }
        if let Some(seconds) = update.refresh_seconds {
            next.refresh_seconds = seconds;
        }
        next.validate()?;
        Ok(next)
    }
}

/// Partial settings patch sent by the dashboard. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsUpdate {
    /// Free-form text, split on commas and newlines.
    pub watchlist: Option<String>,
    pub interval: Option<Interval>,
    pub mode: Option<SignalMode>,
    pub time_filter: Option<TimeFilter>,
    pub cooldown_minutes: Option<u32>,
    /// `Some(None)` resets to the mode default.
    #[serde(with = "double_option")]
    pub alert_threshold: Option<Option<u32>>,
    pub capture_alerts: Option<bool>,
    pub max_alerts_kept: Option<usize>,
    pub min_seconds_between_calls: Option<f64>,
    pub auto_refresh: Option<bool>,
    pub refresh_seconds: Option<u64>,
}

// Distinguishes an absent field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Option<u32>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<u32>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<u32>::deserialize(deserializer).map(Some)
    }
}
