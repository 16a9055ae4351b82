mod cli;
mod report;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use common::logger::init_logger;
use market::binance::{BinanceRestClient, BinanceWsClient};
use market::config::MonitorConfig;
use market::monitor::MarketMonitor;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger("marketwatch", cli.json_logs);

    let mut cfg = MonitorConfig::from_env();
    cli.apply(&mut cfg);

    let rest = Arc::new(BinanceRestClient::new(&cfg.exchange).context("failed to build http client")?);
    let live = Arc::new(BinanceWsClient::new(cfg.exchange.ws_url.clone()));

    let monitor = MarketMonitor::start(cfg, rest, live);

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("ctrl-c received; shutting down");
    };
    tokio::pin!(shutdown);

    run(&monitor, &cli, &mut shutdown).await;

    monitor.shutdown().await;
    Ok(())
}

/// Scan and report until `shutdown` completes.
async fn run(monitor: &MarketMonitor, cli: &Cli, shutdown: &mut (impl Future<Output = ()> + Unpin)) {
    let symbol = cli.symbol();

    if cli.scan {
        let Some(scan) = until_shutdown(monitor.scan_watchlist(), shutdown).await else {
            return;
        };
        report::log_scan(&scan);
    }

    let mut ticker = interval(Duration::from_secs(cli.report_every.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if until_shutdown(ticker.tick(), shutdown).await.is_none() {
            return;
        }

        // Seeding may fail on a flaky network; keep trying each report.
        if monitor.chart().active_symbol().await.is_none() {
            match until_shutdown(monitor.chart().select(symbol.clone()), shutdown).await {
                None => return,
                Some(Err(e)) => warn!(symbol = %symbol, error = %e, "could not start chart"),
                Some(Ok(_)) => {}
            }
        }
        report::log_status(monitor).await;
    }
}

/// `work`'s output, or `None` when `shutdown` completes first.
async fn until_shutdown<F: Future>(
    work: F,
    shutdown: &mut (impl Future<Output = ()> + Unpin),
) -> Option<F::Output> {
    tokio::select! {
        _ = shutdown => None,
        out = work => Some(out),
    }
}
