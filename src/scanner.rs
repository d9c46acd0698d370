use std::cmp::Ordering;
use std::time::Instant;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::constants::DETAIL_CHART_BARS;
use crate::feed::{FeedError, MarketDataFeed};
use crate::indicators;
use crate::logging;
use crate::model::{Bar, Interval, SignalMode, SignalResult};
use crate::session::{utc_label, TimeFilter};
use crate::signal::compute_scalp_signal;

pub const EMPTY_WATCHLIST_WARNING: &str = "Add at least one ticker to your watchlist.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolError {
    pub symbol: String,
    pub message: String,
}

/// Outcome of one pass over the watchlist, best setups first.
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

impl ScanReport {
    pub fn top(&self) -> Option<&SignalResult> {
        self.results.first()
    }

    pub fn actionable(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.bias.is_actionable())
            .count()
    }

    /// Plain-text ranked table for terminals.
    pub fn render_table(&self) -> String {
        if let Some(warning) = &self.warning {
            return format!("{warning}\n");
        }

        let price = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
        let mut out = format!(
            "{:<7} {:<8} {:>5} {:<8} {:>11} {:>11} {:>11} {:>11} {:>11}  Why\n",
            "Symbol", "Bias", "Score", "Session", "Last", "Entry", "Stop", "1R", "2R"
        );
        for result in &self.results {
            out.push_str(&format!(
                "{:<7} {:<8} {:>5} {:<8} {:>11} {:>11} {:>11} {:>11} {:>11}  {}\n",
                result.symbol,
                result.bias,
                result.setup_score,
                result.session,
                price(result.last_price),
                price(result.entry),
                price(result.stop),
                price(result.target_1r),
                price(result.target_2r),
                result.reason,
            ));
        }
        if let Some(top) = self.top() {
            out.push_str(&format!(
                "\nTop setup: {} {} (score {}, {}) | mode={} interval={} | {} ms\n",
                top.symbol,
                top.bias,
                top.setup_score,
                top.session,
                self.mode,
                self.interval,
                self.duration_ms
            ));
        }
        out
    }
}

/// Actionable before neutral, then higher score, then symbol.
pub fn compare_results(a: &SignalResult, b: &SignalResult) -> Ordering {
    b.bias
        .is_actionable()
        .cmp(&a.bias.is_actionable())
        .then_with(|| b.setup_score.cmp(&a.setup_score))
        .then_with(|| a.symbol.cmp(&b.symbol))
}

pub fn rank(results: &mut [SignalResult]) {
    results.sort_by(compare_results);
}

/// Fetch every symbol in turn, score the batch and rank it. Symbols that fail
/// to fetch still get a row.
pub async fn scan_watchlist(
    feed: &dyn MarketDataFeed,
    symbols: &[String],
    interval: Interval,
    mode: SignalMode,
    filter: TimeFilter,
) -> ScanReport {
    let started = Instant::now();
    let started_at = utc_label(chrono::Utc::now());

    if symbols.is_empty() {
        return ScanReport {
            results: Vec::new(),
            errors: Vec::new(),
            started_at,
            duration_ms: 0,
            mode,
            interval,
            warning: Some(EMPTY_WATCHLIST_WARNING.to_string()),
        };
    }

    let mut fetched: Vec<(String, Result<Vec<Bar>, FeedError>)> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let bars = feed.intraday(symbol, interval).await;
        fetched.push((symbol.clone(), bars));
    }

    let mut errors = Vec::new();
    for (symbol, outcome) in &fetched {
        if let Err(err) = outcome {
            logging::warn(
                "scan.symbol_error",
                "Failed to fetch bars",
                json!({ "symbol": symbol, "feed": feed.name(), "error": err.to_string() }),
            );
            errors.push(SymbolError {
                symbol: symbol.clone(),
                message: err.to_string(),
            });
        }
    }

    let mut results: Vec<SignalResult> = fetched
        .par_iter()
        .map(|(symbol, outcome)| match outcome {
            Ok(bars) => compute_scalp_signal(symbol, bars, mode, filter),
            Err(err) => SignalResult::neutral(symbol, 0, format!("Error: {err}")),
        })
        .collect();
    rank(&mut results);

    let report = ScanReport {
        results,
        errors,
        started_at,
        duration_ms: started.elapsed().as_millis() as u64,
        mode,
        interval,
        warning: None,
    };

    logging::info(
        "scan.complete",
        "Watchlist scanned",
        json!({
            "symbols": symbols.len(),
            "actionable": report.actionable(),
            "errors": report.errors.len(),
            "duration_ms": report.duration_ms,
            "mode": mode,
            "interval": interval,
        }),
    );
    report
}

/// One chart point for the drill-down view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartBar {
    pub timestamp: NaiveDateTime,
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

impl SymbolDetail {
    /// Vendor quote when known, otherwise the last close.
    pub fn last_price(&self) -> Option<f64> {
        self.quote.or(self.signal.last_price)
    }
}

/// Bars, VWAP and the current signal for a single ticker.
pub async fn fetch_detail(
    feed: &dyn MarketDataFeed,
    symbol: &str,
    interval: Interval,
    mode: SignalMode,
    filter: TimeFilter,
) -> Result<SymbolDetail, FeedError> {
    let bars = feed.intraday(symbol, interval).await?;
    let quote = match feed.quote(symbol).await {
        Ok(quote) => quote,
        Err(err) => {
            logging::warn(
                "detail.quote_error",
                "Quote unavailable, falling back to last close",
                json!({ "symbol": symbol, "error": err.to_string() }),
            );
            None
        }
    };

    let signal = compute_scalp_signal(symbol, &bars, mode, filter);
    let vwap = indicators::vwap(&bars);
    let start = bars.len().saturating_sub(DETAIL_CHART_BARS);
    let chart = bars[start..]
        .iter()
        .zip(&vwap[start..])
        .map(|(bar, vwap)| ChartBar {
            timestamp: bar.timestamp,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            vwap: vwap.is_finite().then_some(*vwap),
        })
        .collect();

    Ok(SymbolDetail {
        symbol: symbol.to_string(),
        interval,
        bars: chart,
        signal,
        quote,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::DemoFeed;
    use crate::model::Bias;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn row(symbol: &str, bias: Bias, score: u32) -> SignalResult {
        let mut result = SignalResult::neutral(symbol, score, "");
        result.bias = bias;
        result
    }

    #[test]
    fn ranking_puts_actionable_first() {
        let mut results = vec![
            row("SPY", Bias::Neutral, 95),
            row("TSLA", Bias::Short, 80),
            row("AAPL", Bias::Long, 80),
            row("NVDA", Bias::Long, 100),
            row("AMD", Bias::Neutral, 95),
        ];
        rank(&mut results);
        let order: Vec<_> = results.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["NVDA", "AAPL", "TSLA", "AMD", "SPY"]);
    }

    struct FailingFeed;

    #[async_trait]
    impl MarketDataFeed for FailingFeed {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn intraday(&self, symbol: &str, _interval: Interval) -> Result<Vec<Bar>, FeedError> {
            Err(FeedError::InvalidSymbol(format!("unknown {symbol}")))
        }

        async fn quote(&self, _symbol: &str) -> Result<Option<f64>, FeedError> {
            Err(FeedError::RateLimited("slow down".into()))
        }
    }

    #[tokio::test]
    async fn fetch_failures_become_neutral_rows() {
        crate::logging::set_silent(true);
        let symbols = vec!["ZZZZ".to_string()];
        let report = scan_watchlist(
            &FailingFeed,
            &symbols,
            Interval::OneMinute,
            SignalMode::CleanerSignals,
            TimeFilter::default(),
        )
        .await;
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].bias, Bias::Neutral);
        assert_eq!(report.results[0].setup_score, 0);
        assert!(report.results[0].reason.starts_with("Error: "));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].symbol, "ZZZZ");
    }

    #[test]
    fn table_lists_rows_in_rank_order() {
        let report = ScanReport {
            results: vec![row("NVDA", Bias::Long, 90), row("SPY", Bias::Neutral, 40)],
            errors: Vec::new(),
            started_at: "2024-06-03 14:00:00 UTC".into(),
            duration_ms: 12,
            mode: SignalMode::FastScalp,
            interval: Interval::OneMinute,
            warning: None,
        };
        let table = report.render_table();
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("Symbol"));
        assert!(lines[1].starts_with("NVDA"));
        assert!(lines[2].starts_with("SPY"));
        assert!(table.contains("Top setup: NVDA LONG (score 90, OFF)"));
    }

    #[tokio::test]
    async fn empty_watchlist_warns_without_fetching() {
        let report = scan_watchlist(
            &FailingFeed,
            &[],
            Interval::OneMinute,
            SignalMode::FastScalp,
            TimeFilter::default(),
        )
        .await;
        assert!(report.results.is_empty());
        assert_eq!(report.warning.as_deref(), Some(EMPTY_WATCHLIST_WARNING));
    }

    #[tokio::test]
    async fn demo_scan_scores_every_symbol() {
        crate::logging::set_silent(true);
        let anchor = NaiveDate::from_ymd_opt(2024, 6, 3)
            .and_then(|date| date.and_hms_opt(10, 20, 0))
            .expect("anchor");
        let feed = DemoFeed::new(42).with_anchor(anchor);
        let symbols: Vec<String> = ["AAPL", "NVDA", "TSLA", "SPY", "QQQ"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let report = scan_watchlist(
            &feed,
            &symbols,
            Interval::OneMinute,
            SignalMode::FastScalp,
            TimeFilter::ALL_SESSIONS,
        )
        .await;
        assert_eq!(report.results.len(), symbols.len());
        assert!(report.errors.is_empty());
        for pair in report.results.windows(2) {
            assert_ne!(compare_results(&pair[0], &pair[1]), Ordering::Greater);
        }
        for result in &report.results {
            assert!(result.setup_score <= 100);
            assert!(result.last_price.is_some());
        }
    }

    #[tokio::test]
    async fn detail_trims_bars_and_tolerates_quote_errors() {
        crate::logging::set_silent(true);
        struct QuietQuote(DemoFeed);

        #[async_trait]
        impl MarketDataFeed for QuietQuote {
            fn name(&self) -> &'static str {
                "quiet"
            }

            async fn intraday(&self, symbol: &str, interval: Interval) -> Result<Vec<Bar>, FeedError> {
                self.0.intraday(symbol, interval).await
            }

            async fn quote(&self, _symbol: &str) -> Result<Option<f64>, FeedError> {
                Err(FeedError::RateLimited("busy".into()))
            }
        }

        let feed = QuietQuote(DemoFeed::new(3));
        let detail = fetch_detail(
            &feed,
            "AAPL",
            Interval::FiveMinutes,
            SignalMode::CleanerSignals,
            TimeFilter::default(),
        )
        .await
        .expect("detail");
        assert!(detail.bars.len() <= DETAIL_CHART_BARS);
        assert!(!detail.bars.is_empty());
        assert!(detail.bars.iter().all(|bar| bar.vwap.is_some()));
        assert_eq!(detail.quote, None);
        assert_eq!(detail.last_price(), detail.signal.last_price);
    }
}
