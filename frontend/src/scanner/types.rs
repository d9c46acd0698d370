use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1min")]
    OneMinute,
    #[serde(rename = "5min")]
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

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|interval| interval.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalMode {
    FastScalp,
    CleanerSignals,
}

impl SignalMode {
    pub const ALL: [SignalMode; 2] = [SignalMode::FastScalp, SignalMode::CleanerSignals];

    pub fn as_str(self) -> &'static str {
        match self {
            SignalMode::FastScalp => "fast_scalp",
            SignalMode::CleanerSignals => "cleaner_signals",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SignalMode::FastScalp => "Fast scalp",
            SignalMode::CleanerSignals => "Cleaner signals",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == value)
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
    pub fn as_str(self) -> &'static str {
        match self {
            Bias::Long => "LONG",
            Bias::Short => "SHORT",
            Bias::Neutral => "NEUTRAL",
        }
    }
}

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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFilter {
    pub opening: bool,
    pub midday: bool,
    pub power: bool,
}

/// Scanner controls as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSettings {
    pub watchlist: Vec<String>,
    pub interval: Interval,
    pub mode: SignalMode,
    pub time_filter: TimeFilter,
    pub cooldown_minutes: u32,
    pub alert_threshold: Option<u32>,
    pub capture_alerts: bool,
    pub max_alerts_kept: usize,
    pub min_seconds_between_calls: f64,
    pub auto_refresh: bool,
    pub refresh_seconds: u64,
}

/// Partial update; only the fields that are set get sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watchlist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SignalMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_filter: Option<TimeFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_minutes: Option<u32>,
    /// `Some(None)` sends an explicit `null` to follow the mode default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_threshold: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_alerts: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_alerts_kept: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_seconds_between_calls: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_refresh: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub symbol: String,
    pub bias: Bias,
    pub setup_score: u32,
    pub reason: String,
    pub entry: Option<f64>,
    pub stop: Option<f64>,
    pub target_1r: Option<f64>,
    pub target_2r: Option<f64>,
    pub last_price: Option<f64>,
    pub timestamp: Option<String>,
    pub session: Session,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolError {
    pub symbol: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub results: Vec<SignalResult>,
    pub errors: Vec<SymbolError>,
    pub started_at: String,
    pub duration_ms: u64,
    pub mode: SignalMode,
    pub interval: Interval,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub captured_at_ms: i64,
    pub time: String,
    pub symbol: String,
    pub bias: Bias,
    pub score: u32,
    pub session: Session,
    pub last: Option<f64>,
    pub entry: Option<f64>,
    pub stop: Option<f64>,
    pub t1: Option<f64>,
    pub t2: Option<f64>,
    pub why: String,
    pub as_of: Option<String>,
    pub mode: SignalMode,
    pub interval: Interval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartBar {
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub vwap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDetail {
    pub symbol: String,
    pub interval: Interval,
    pub bars: Vec<ChartBar>,
    pub signal: SignalResult,
    pub quote: Option<f64>,
}

/// Full dashboard state pushed over the websocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub version: u32,
    pub feed: String,
    pub now: String,
    pub settings: ScanSettings,
    pub effective_threshold: u32,
    pub scanning: bool,
    pub report: Option<ScanReport>,
    pub alerts: Vec<Alert>,
}
