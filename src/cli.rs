use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::chart::ChartArgs;
use crate::constants::{DEMO_SEED, GATEWAY_BIND_ADDR};
use crate::feed::build_feed;
use crate::model::{parse_watchlist, Interval, SignalMode};
use crate::scanner::scan_watchlist;
use crate::service::ServiceConfig;
use crate::session::TimeFilter;
use crate::settings::ScanSettings;
use crate::tail::TailArgs;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Intraday reversal scalp scanner with in-session alerts"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(self) -> Command {
        self.command
            .unwrap_or_else(|| Command::Serve(ServeArgs::parse_from(["serve"])))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the scan loop and the dashboard gateway (default)
    Serve(ServeArgs),
    /// Scan a watchlist once and print the ranked setups
    Scan(ScanArgs),
    /// Fetch bars for one ticker and render an ASCII price chart
    Chart(ChartArgs),
    /// Follow a running server and print alerts as they are captured
    Tail(TailArgs),
}

/// Where bars come from.
#[derive(Debug, Args, Clone)]
pub struct FeedArgs {
    /// Alpha Vantage API key
    #[arg(long, env = "ALPHAVANTAGE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Use synthetic bars even when an API key is configured
    #[arg(long)]
    pub demo: bool,

    /// Seed for the synthetic feed
    #[arg(long, default_value_t = DEMO_SEED)]
    pub seed: u64,
}

/// Scoring controls shared by `serve` and `scan`.
#[derive(Debug, Args, Clone)]
pub struct ScoringArgs {
    /// Comma separated tickers (default: AAPL,NVDA,TSLA,SPY,QQQ)
    #[arg(short, long)]
    pub watchlist: Option<String>,

    /// Bar size requested from the vendor
    #[arg(short, long, value_enum, default_value_t = Interval::OneMinute)]
    pub interval: Interval,

    /// Signal preset
    #[arg(short, long, value_enum, default_value_t = SignalMode::CleanerSignals)]
    pub mode: SignalMode,

    /// Allow setups in every session, midday included
    #[arg(long)]
    pub all_sessions: bool,
}

impl ScoringArgs {
    fn apply_to(&self, settings: &mut ScanSettings) {
        if let Some(text) = &self.watchlist {
            settings.watchlist = parse_watchlist(text);
        }
        settings.interval = self.interval;
        settings.mode = self.mode;
        if self.all_sessions {
            settings.time_filter = TimeFilter::ALL_SESSIONS;
        }
    }

    pub fn settings(&self) -> ScanSettings {
        let mut settings = ScanSettings::default();
        self.apply_to(&mut settings);
        settings
    }
}

#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// Address the gateway binds to
    #[arg(long, env = "SCANNER_ADDR", default_value = GATEWAY_BIND_ADDR)]
    pub addr: SocketAddr,

    #[command(flatten)]
    pub feed: FeedArgs,

    #[command(flatten)]
    pub scoring: ScoringArgs,

    /// Rescan automatically every `--refresh-seconds`
    #[arg(long)]
    pub auto_refresh: bool,

    /// Auto-refresh period in seconds
    #[arg(long, default_value_t = 30)]
    pub refresh_seconds: u64,

    /// Run one scan as soon as the server is up
    #[arg(long)]
    pub scan_on_start: bool,
}

impl ServeArgs {
    pub fn into_config(self) -> Result<ServiceConfig> {
        let mut settings = self.scoring.settings();
        settings.auto_refresh = self.auto_refresh;
        settings.refresh_seconds = self.refresh_seconds;
        settings.validate().context("invalid scanner options")?;

        Ok(ServiceConfig {
            gateway_addr: self.addr,
            api_key: self.feed.api_key,
            demo: self.feed.demo,
            demo_seed: self.feed.seed,
            scan_on_start: self.scan_on_start,
            settings,
            ..ServiceConfig::default()
        })
    }
}

#[derive(Debug, Args, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub feed: FeedArgs,

    #[command(flatten)]
    pub scoring: ScoringArgs,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub async fn run_scan(args: ScanArgs) -> Result<()> {
    let settings = args.scoring.settings();
    settings.validate().context("invalid scanner options")?;
    let feed = build_feed(
        args.feed.api_key,
        args.feed.demo,
        args.feed.seed,
        settings.min_call_gap(),
    )
    .context("failed to build market data feed")?;

    let report = scan_watchlist(
        feed.as_ref(),
        &settings.watchlist,
        settings.interval,
        settings.mode,
        settings.time_filter,
    )
    .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_table());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        <Cli as CommandFactory>::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::parse_from(["scalp-scanner"]);
        assert!(matches!(cli.command(), Command::Serve(_)));
    }

    #[test]
    fn serve_flags_build_a_config() {
        let cli = Cli::parse_from([
            "scalp-scanner",
            "serve",
            "--addr",
            "127.0.0.1:9555",
            "--demo",
            "--watchlist",
            "amd, msft",
            "--mode",
            "fast-scalp",
            "--interval",
            "5min",
            "--auto-refresh",
            "--refresh-seconds",
            "45",
        ]);
        let Command::Serve(args) = cli.command() else {
            panic!("expected serve");
        };
        let config = args.into_config().expect("config");
        assert_eq!(config.gateway_addr.port(), 9555);
        assert!(config.demo);
        assert_eq!(config.settings.watchlist, vec!["AMD", "MSFT"]);
        assert_eq!(config.settings.mode, SignalMode::FastScalp);
        assert_eq!(config.settings.interval, Interval::FiveMinutes);
        assert!(config.settings.auto_refresh);
        assert_eq!(config.settings.refresh_seconds, 45);
    }

    #[test]
    fn out_of_range_refresh_is_rejected() {
        let cli = Cli::parse_from(["scalp-scanner", "serve", "--refresh-seconds", "2"]);
        let Command::Serve(args) = cli.command() else {
            panic!("expected serve");
        };
        assert!(args.into_config().is_err());
    }
}
