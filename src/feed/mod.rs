mod alphavantage;
mod demo;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};

use serde_json::json;

use crate::logging;
use crate::model::{Bar, Interval};

pub use alphavantage::{parse_global_quote, parse_intraday, AlphaVantageClient, AlphaVantageConfig};
pub use demo::DemoFeed;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("ALPHAVANTAGE_API_KEY is not set")]
    MissingApiKey,
    #[error("rate limited by vendor: {0}")]
    RateLimited(String),
    #[error("invalid symbol or request: {0}")]
    InvalidSymbol(String),
    #[error("vendor returned an error: {0}")]
    Vendor(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed vendor payload: {0}")]
    Decode(String),
    #[error("no bars returned for {0}")]
    Empty(String),
}

/// Source of intraday bars and last-trade quotes.
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    fn name(&self) -> &'static str;

    /// Bars for `symbol`, oldest first.
    async fn intraday(&self, symbol: &str, interval: Interval) -> Result<Vec<Bar>, FeedError>;

    /// Latest traded price, if the vendor knows the symbol.
    async fn quote(&self, symbol: &str) -> Result<Option<f64>, FeedError>;

    /// Adjust the minimum spacing between vendor calls.
    fn set_min_call_gap(&self, _gap: Duration) {}
}

/// Pick the vendor client when a key is available, otherwise the demo feed.
pub fn build_feed(
    api_key: Option<String>,
    demo: bool,
    demo_seed: u64,
    min_call_gap: Duration,
) -> Result<Arc<dyn MarketDataFeed>, FeedError> {
    let api_key = api_key.filter(|key| !key.trim().is_empty());
    match api_key {
        Some(api_key) if !demo => {
            let client = AlphaVantageClient::new(AlphaVantageConfig {
                api_key: Some(api_key),
                min_call_gap,
                ..AlphaVantageConfig::default()
            })?;
            Ok(Arc::new(client))
        }
        missing => {
            if missing.is_none() && !demo {
                logging::warn(
                    "feed.demo_fallback",
                    "No Alpha Vantage key configured, serving synthetic bars",
                    json!({ "seed": demo_seed }),
                );
            }
            Ok(Arc::new(DemoFeed::new(demo_seed)))
        }
    }
}

/// Spaces outgoing calls at least `min_gap` apart. Callers queue on the lock.
pub struct Pacer {
    min_gap_ms: AtomicU64,
    last_call: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap_ms: AtomicU64::new(min_gap.as_millis() as u64),
            last_call: Mutex::new(None),
        }
    }

    pub fn set_min_gap(&self, gap: Duration) {
        self.min_gap_ms
            .store(gap.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn min_gap(&self) -> Duration {
        Duration::from_millis(self.min_gap_ms.load(Ordering::Relaxed))
    }

    pub async fn wait_turn(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            time::sleep_until(previous + self.min_gap()).await;
        }
        *last_call = Some(Instant::now());
    }
}
