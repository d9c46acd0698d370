use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::constants::{
    ALPHAVANTAGE_BASE_URL, API_KEY_ENV, HTTP_TIMEOUT_SECS, RESPONSE_CACHE_TTL_SECS,
};
use crate::logging;
use crate::model::{Bar, Interval};

use super::{FeedError, MarketDataFeed, Pacer};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct AlphaVantageConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub min_call_gap: Duration,
    pub cache_ttl: Duration,
    pub timeout: Duration,
}

impl Default for AlphaVantageConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty()),
            base_url: ALPHAVANTAGE_BASE_URL.to_string(),
            min_call_gap: Duration::from_secs(1),
            cache_ttl: Duration::from_secs(RESPONSE_CACHE_TTL_SECS),
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
        }
    }
}

type CacheKey = (String, Interval);

/// Alpha Vantage REST client with call pacing and a short-lived bar cache.
pub struct AlphaVantageClient {
    config: AlphaVantageConfig,
    http: reqwest::Client,
    pacer: Pacer,
    cache: Mutex<HashMap<CacheKey, (Instant, Arc<Vec<Bar>>)>>,
}

impl AlphaVantageClient {
    pub fn new(config: AlphaVantageConfig) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("scalp-scanner/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            pacer: Pacer::new(config.min_call_gap),
            config,
            http,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn api_key(&self) -> Result<&str, FeedError> {
        self.config
            .api_key
            .as_deref()
            .ok_or(FeedError::MissingApiKey)
    }

    async fn call(&self, params: &[(&str, &str)]) -> Result<String, FeedError> {
        let api_key = self.api_key()?;
        self.pacer.wait_turn().await;

        let response = self
            .http
            .get(&self.config.base_url)
            .query(params)
            .query(&[("apikey", api_key)])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    async fn cached(&self, key: &CacheKey) -> Option<Arc<Vec<Bar>>> {
        let cache = self.cache.lock().await;
        cache
            .get(key)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.config.cache_ttl)
            .map(|(_, bars)| Arc::clone(bars))
    }
}

#[async_trait]
impl MarketDataFeed for AlphaVantageClient {
    fn name(&self) -> &'static str {
        "alphavantage"
    }

    async fn intraday(&self, symbol: &str, interval: Interval) -> Result<Vec<Bar>, FeedError> {
        let key = (symbol.to_string(), interval);
        if let Some(bars) = self.cached(&key).await {
            return Ok(bars.as_ref().clone());
        }

        let body = self
            .call(&[
                ("function", "TIME_SERIES_INTRADAY"),
                ("symbol", symbol),
                ("interval", interval.as_str()),
                ("outputsize", "compact"),
                ("datatype", "json"),
            ])
            .await?;
        let bars = parse_intraday(symbol, &body)?;

        logging::info(
            "feed.intraday",
            "Fetched intraday bars",
            json!({ "symbol": symbol, "interval": interval.as_str(), "bars": bars.len() }),
        );

        self.cache
            .lock()
            .await
            .insert(key, (Instant::now(), Arc::new(bars.clone())));
        Ok(bars)
    }

    async fn quote(&self, symbol: &str) -> Result<Option<f64>, FeedError> {
        let body = self
            .call(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        parse_global_quote(&body)
    }

    fn set_min_call_gap(&self, gap: Duration) {
        self.pacer.set_min_gap(gap);
    }
}

#[derive(Deserialize)]
struct RawBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

fn vendor_message(payload: &Value) -> Option<FeedError> {
    let text = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_string);
    if let Some(message) = text("Error Message") {
        return Some(FeedError::InvalidSymbol(message));
    }
    text("Note")
        .or_else(|| text("Information"))
        .map(FeedError::RateLimited)
}

fn number(field: &str, raw: &str) -> Result<f64, FeedError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|err| FeedError::Decode(format!("{field}={raw:?}: {err}")))
}

/// Decode a `TIME_SERIES_INTRADAY` JSON body into bars, oldest first.
pub fn parse_intraday(symbol: &str, body: &str) -> Result<Vec<Bar>, FeedError> {
    let payload: Value =
        serde_json::from_str(body).map_err(|err| FeedError::Decode(err.to_string()))?;
    if let Some(err) = vendor_message(&payload) {
        return Err(err);
    }

    let series = payload
        .as_object()
        .and_then(|object| {
            object
                .iter()
                .find(|(key, _)| key.starts_with("Time Series"))
                .map(|(_, value)| value.clone())
        })
        .ok_or_else(|| FeedError::Vendor(format!("no time series in response for {symbol}")))?;

    let raw: BTreeMap<String, RawBar> =
        serde_json::from_value(series).map_err(|err| FeedError::Decode(err.to_string()))?;

    let mut bars = raw
        .into_iter()
        .map(|(stamp, raw)| {
            let timestamp = NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT)
                .map_err(|err| FeedError::Decode(format!("timestamp {stamp:?}: {err}")))?;
            Ok(Bar {
                timestamp,
                open: number("open", &raw.open)?,
                high: number("high", &raw.high)?,
                low: number("low", &raw.low)?,
                close: number("close", &raw.close)?,
                volume: number("volume", &raw.volume)?,
            })
        })
        .collect::<Result<Vec<Bar>, FeedError>>()?;

    if bars.is_empty() {
        return Err(FeedError::Empty(symbol.to_string()));
    }
    bars.sort_by_key(|bar| bar.timestamp);
    Ok(bars)
}

/// Decode a `GLOBAL_QUOTE` body. Unknown symbols come back as an empty quote.
pub fn parse_global_quote(body: &str) -> Result<Option<f64>, FeedError> {
    let payload: Value =
        serde_json::from_str(body).map_err(|err| FeedError::Decode(err.to_string()))?;
    if let Some(err) = vendor_message(&payload) {
        return Err(err);
    }

    match payload
        .get("Global Quote")
        .and_then(|quote| quote.get("05. price"))
        .and_then(Value::as_str)
    {
        Some(price) => number("price", price).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTRADAY: &str = r#"{
        "Meta Data": {
            "1. Information": "Intraday (1min) open, high, low, close prices and volume",
            "2. Symbol": "IBM",
            "3. Last Refreshed": "2024-06-03 10:02:00",
            "4. Interval": "1min",
            "5. Output Size": "Compact",
            "6. Time Zone": "US/Eastern"
        },
        "Time Series (1min)": {
            "2024-06-03 10:02:00": {
                "1. open": "166.1000", "2. high": "166.3000", "3. low": "166.0500",
                "4. close": "166.2500", "5. volume": "1200"
            },
            "2024-06-03 10:01:00": {
                "1. open": "166.0000", "2. high": "166.1500", "3. low": "165.9000",
                "4. close": "166.1000", "5. volume": "900"
            }
        }
    }"#;

    #[test]
    fn intraday_bars_are_sorted_oldest_first() {
        let bars = parse_intraday("IBM", INTRADAY).expect("parse bars");
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
        assert_eq!(bars[0].close, 166.10);
        assert_eq!(bars[1].volume, 1200.0);
    }

    #[test]
    fn vendor_error_messages_are_classified() {
        let invalid = r#"{"Error Message": "Invalid API call. Please retry or visit the documentation."}"#;
        assert!(matches!(
            parse_intraday("NOPE", invalid),
            Err(FeedError::InvalidSymbol(_))
        ));

        let note = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#;
        assert!(matches!(
            parse_intraday("IBM", note),
            Err(FeedError::RateLimited(_))
        ));

        let info = r#"{"Information": "We have detected your API key and our standard API rate limit is 25 requests per day."}"#;
        assert!(matches!(
            parse_global_quote(info),
            Err(FeedError::RateLimited(_))
        ));
    }

    #[test]
    fn missing_series_and_bad_numbers_are_errors() {
        assert!(matches!(
            parse_intraday("IBM", r#"{"Meta Data": {}}"#),
            Err(FeedError::Vendor(_))
        ));
        assert!(matches!(
            parse_intraday("IBM", r#"{"Time Series (1min)": {}}"#),
            Err(FeedError::Empty(_))
        ));

        let bad = r#"{"Time Series (5min)": {"2024-06-03 10:00:00": {
            "1. open": "x", "2. high": "1", "3. low": "1", "4. close": "1", "5. volume": "1"}}}"#;
        assert!(matches!(parse_intraday("IBM", bad), Err(FeedError::Decode(_))));
    }

    #[test]
    fn global_quote_price_is_optional() {
        let quote = r#"{"Global Quote": {"01. symbol": "IBM", "05. price": "166.2500"}}"#;
        assert_eq!(parse_global_quote(quote).expect("quote"), Some(166.25));
        assert_eq!(parse_global_quote(r#"{"Global Quote": {}}"#).expect("quote"), None);
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let client = AlphaVantageClient::new(AlphaVantageConfig {
            api_key: None,
            ..AlphaVantageConfig::default()
        })
        .expect("client");
        let err = client
            .intraday("IBM", Interval::OneMinute)
            .await
            .expect_err("no key configured");
        assert!(matches!(err, FeedError::MissingApiKey));
    }
}
