use anyhow::{Context, Result};
use clap::Args;
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;

use crate::alerts::Alert;
use crate::constants::GATEWAY_BIND_ADDR;
use crate::service::DashboardSnapshot;

#[derive(Debug, Args, Clone)]
pub struct TailArgs {
    /// Gateway address of a running `serve`
    #[arg(long, env = "SCANNER_ADDR", default_value = GATEWAY_BIND_ADDR)]
    pub addr: String,

    /// Only print alerts for this ticker
    #[arg(short, long)]
    pub symbol: Option<String>,

    /// Only print alerts at or above this score
    #[arg(long, default_value_t = 0)]
    pub min_score: u32,

    /// Stop after printing this many alerts
    #[arg(short, long)]
    pub limit: Option<usize>,
}

impl TailArgs {
    fn wants(&self, alert: &Alert) -> bool {
        let symbol_ok = self
            .symbol
            .as_ref()
            .map_or(true, |symbol| symbol.eq_ignore_ascii_case(&alert.symbol));
        symbol_ok && alert.score >= self.min_score
    }
}

/// Alerts in `snapshot` newer than `last_seen`, oldest first.
fn unseen(snapshot: &DashboardSnapshot, last_seen: u64) -> Vec<&Alert> {
    let mut fresh: Vec<&Alert> = snapshot
        .alerts
        .iter()
        .filter(|alert| alert.id > last_seen)
        .collect();
    fresh.sort_by_key(|alert| alert.id);
    fresh
}

fn format_alert(alert: &Alert) -> String {
    let price = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
    format!(
        "{} | {:<6} | {:<5} | {:>3} | {:<7} | last {} entry {} stop {} 1R {} 2R {} | {}",
        alert.time,
        alert.symbol,
        alert.bias,
        alert.score,
        alert.session,
        price(alert.last),
        price(alert.entry),
        price(alert.stop),
        price(alert.t1),
        price(alert.t2),
        alert.why
    )
}

pub async fn run(args: TailArgs) -> Result<()> {
    let url = format!("ws://{}/ws", args.addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {url}; run `scalp-scanner serve` first"))?;

    println!("Connected to {url}; waiting for alerts...");

    let mut last_seen = 0u64;
    let mut printed = 0usize;
    while let Some(message) = ws.next().await {
        let payload = match message.context("websocket stream failed")? {
            Message::Text(payload) => payload,
            Message::Close(_) => break,
            _ => continue,
        };
        let snapshot: DashboardSnapshot =
            serde_json::from_str(&payload).context("malformed dashboard snapshot")?;

        let fresh = unseen(&snapshot, last_seen);
        if let Some(newest) = fresh.last() {
            last_seen = newest.id;
        }
        for alert in fresh.into_iter().filter(|alert| args.wants(alert)) {
            println!("{}", format_alert(alert));
            printed += 1;
            if args.limit.is_some_and(|limit| printed >= limit) {
                return Ok(());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertBook;
    use crate::model::{Interval, SignalMode};
    use crate::settings::ScanSettings;
    use chrono::{TimeZone, Utc};

    fn snapshot_with(book: &AlertBook) -> DashboardSnapshot {
        let settings = ScanSettings::default();
        DashboardSnapshot {
            version: 1,
            feed: "demo".into(),
            now: String::new(),
            effective_threshold: settings.effective_threshold(),
            settings,
            scanning: false,
            report: None,
            alerts: book.iter().cloned().collect(),
        }
    }

    #[test]
    fn only_new_alerts_are_reported_oldest_first() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap();
        let mut book = AlertBook::new(10);
        for _ in 0..3 {
            book.push_test_alert(SignalMode::FastScalp, Interval::OneMinute, now);
        }
        let snapshot = snapshot_with(&book);
        let ids: Vec<u64> = unseen(&snapshot, 1).iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(unseen(&snapshot, 3).is_empty());
    }

    #[test]
    fn filters_by_symbol_and_score() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap();
        let mut book = AlertBook::new(10);
        let alert = book.push_test_alert(SignalMode::FastScalp, Interval::OneMinute, now);

        let args = TailArgs {
            addr: GATEWAY_BIND_ADDR.into(),
            symbol: Some("test".into()),
            min_score: 90,
            limit: None,
        };
        assert!(args.wants(&alert));
        assert!(!TailArgs { min_score: 96, ..args.clone() }.wants(&alert));
        assert!(!TailArgs { symbol: Some("AAPL".into()), ..args }.wants(&alert));
        assert!(format_alert(&alert).contains("TEST"));
    }
}
