pub const GATEWAY_PORT: u16 = 9001;
pub const GATEWAY_BIND_ADDR: &str = "127.0.0.1:9001";
pub const ALPHAVANTAGE_BASE_URL: &str = "https://www.alphavantage.co/query";
pub const API_KEY_ENV: &str = "ALPHAVANTAGE_API_KEY";
pub const HTTP_TIMEOUT_SECS: u64 = 15;
pub const RESPONSE_CACHE_TTL_SECS: u64 = 20;
pub const SCHEDULER_TICK_MS: u64 = 500;
pub const METRICS_INTERVAL_SECS: u64 = 60;
pub const SNAPSHOT_VERSION: u32 = 1;
pub const SNAPSHOT_CHANNEL_CAPACITY: usize = 32;
pub const DETAIL_CHART_BARS: usize = 220;
pub const ALERT_VIEW_LIMIT: usize = 30;
pub const ALERT_VIEW_MIN_SCORE: u32 = 80;
pub const DEMO_SEED: u64 = 0x5CA1_AB1E;
