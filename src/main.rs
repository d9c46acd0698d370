use anyhow::Result;
use clap::Parser;
use scalp_scanner::chart;
use scalp_scanner::cli::{self, Cli};
use scalp_scanner::logging;
use scalp_scanner::service;
use scalp_scanner::tail;

#[tokio::main]
async fn main() -> Result<()> {
    let command = Cli::parse().command();
    if !matches!(command, cli::Command::Serve(_)) {
        logging::set_stderr_only(true);
    }

    match command {
        cli::Command::Serve(args) => service::run_with_config(args.into_config()?).await,
        cli::Command::Scan(args) => cli::run_scan(args).await,
        cli::Command::Chart(args) => chart::run(args).await,
        cli::Command::Tail(args) => tail::run(args).await,
    }
}
