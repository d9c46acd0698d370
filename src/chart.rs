use anyhow::{bail, Context, Result};
use clap::Args;
use textplots::{Chart, Plot, Shape};

use crate::cli::FeedArgs;
use crate::feed::build_feed;
use crate::model::{Interval, SignalMode};
use crate::scanner::{fetch_detail, SymbolDetail};
use crate::session::TimeFilter;
use crate::settings::ScanSettings;

#[derive(Debug, Args, Clone)]
pub struct ChartArgs {
    /// Ticker to plot (e.g. AAPL)
    pub symbol: String,

    #[command(flatten)]
    pub feed: FeedArgs,

    /// Bar size requested from the vendor
    #[arg(short, long, value_enum, default_value_t = Interval::OneMinute)]
    pub interval: Interval,

    /// Signal preset used for the trade plan
    #[arg(short, long, value_enum, default_value_t = SignalMode::CleanerSignals)]
    pub mode: SignalMode,

    /// Chart width in characters
    #[arg(long, default_value_t = 120)]
    pub width: u32,

    /// Chart height in characters
    #[arg(long, default_value_t = 30)]
    pub height: u32,
}

pub async fn run(args: ChartArgs) -> Result<()> {
    let settings = ScanSettings::default();
    let feed = build_feed(
        args.feed.api_key.clone(),
        args.feed.demo,
        args.feed.seed,
        settings.min_call_gap(),
    )
    .context("failed to build market data feed")?;

    let symbol = args.symbol.trim().to_uppercase();
    let detail = fetch_detail(
        feed.as_ref(),
        &symbol,
        args.interval,
        args.mode,
        TimeFilter::ALL_SESSIONS,
    )
    .await
    .with_context(|| format!("failed to load bars for {symbol}"))?;

    if detail.bars.len() < 2 {
        bail!("not enough bars to render a chart for {symbol}");
    }

    render_chart(&detail, args.width, args.height);
    print!("{}", trade_plan(&detail));
    Ok(())
}

fn series(detail: &SymbolDetail) -> (Vec<(f32, f32)>, Vec<(f32, f32)>) {
    let closes = detail
        .bars
        .iter()
        .enumerate()
        .map(|(idx, bar)| (idx as f32, bar.close as f32))
        .collect();
    let vwap = detail
        .bars
        .iter()
        .enumerate()
        .filter_map(|(idx, bar)| bar.vwap.map(|v| (idx as f32, v as f32)))
        .collect();
    (closes, vwap)
}

fn render_chart(detail: &SymbolDetail, width: u32, height: u32) {
    let (closes, vwap) = series(detail);
    let first = detail.bars.first().map(|bar| bar.timestamp);
    let last = detail.bars.last().map(|bar| bar.timestamp);
    if let (Some(first), Some(last)) = (first, last) {
        println!(
            "{} {} bars, {} -> {} (close and VWAP)",
            detail.symbol,
            detail.bars.len(),
            first.format("%m-%d %H:%M"),
            last.format("%m-%d %H:%M"),
        );
    }

    let min_price = closes.iter().map(|(_, p)| *p).fold(f32::INFINITY, f32::min);
    let max_price = closes.iter().map(|(_, p)| *p).fold(f32::NEG_INFINITY, f32::max);
    println!("Price range: {:.4} .. {:.4}", min_price, max_price);

    Chart::new(width.max(40), height.max(10), 0.0, (closes.len() - 1) as f32)
        .lineplot(&Shape::Lines(&closes))
        .lineplot(&Shape::Lines(&vwap))
        .display();
    println!();
}

fn trade_plan(detail: &SymbolDetail) -> String {
    let signal = &detail.signal;
    let last = detail
        .last_price()
        .map_or_else(|| "N/A".to_string(), |price| format!("{price:.4}"));
    let mut out = format!(
        "Bias: {}  Score: {}  Session: {}  Last: {}\nReasoning: {}\n",
        signal.bias, signal.setup_score, signal.session, last, signal.reason
    );

    match (signal.bias.is_actionable(), signal.entry, signal.stop) {
        (true, Some(entry), Some(stop)) => {
            out.push_str(&format!("Entry: {entry:.4}\nStop: {stop:.4} (invalidation)\n"));
            if let (Some(t1), Some(t2)) = (signal.target_1r, signal.target_2r) {
                out.push_str(&format!("Scale out: 1R = {t1:.4}, 2R = {t2:.4}\n"));
            }
            out.push_str(
                "Fail-safe exit: if price loses VWAP and the MACD histogram turns against you, flatten the rest.\n",
            );
        }
        _ => out.push_str("No clean confluence signal right now (or time-of-day filter blocking).\n"),
    }
    out
}
