//! MarketMonitor
//!
//! Top-level service wiring the exchange clients to every live component:
//!   • chart controller (one watch context at a time)
//!   • movers refresher
//!   • watchlist ticker feed
//!   • proximity scanner over the watchlist

pub mod chart;
pub mod watchlist;

use std::sync::Arc;

use tracing::info;

use crate::analysis::{ProximityReport, ProximityScanner};
use crate::binance::{LiveStreamApi, MarketDataApi};
use crate::config::MonitorConfig;
use crate::refresher::{MoversStore, RefresherHandle, SnapshotRefresher};

pub use chart::ChartController;
pub use watchlist::{WatchlistEntry, WatchlistFeed, WatchlistStore};

pub struct MarketMonitor {
    cfg: MonitorConfig,
    chart: ChartController,
    movers: MoversStore,
    refresher: RefresherHandle,
    watchlist: WatchlistStore,
    feed: WatchlistFeed,
    scanner: ProximityScanner,
}

impl MarketMonitor {
    /// Start the background refresher and watchlist feed. No instrument is
    /// charted until [`ChartController::select`] is called.
    pub fn start(
        cfg: MonitorConfig,
        rest: Arc<dyn MarketDataApi>,
        live: Arc<dyn LiveStreamApi>,
    ) -> Self {
        let movers = MoversStore::new();
        let refresher = SnapshotRefresher::spawn(rest.clone(), cfg.refresher.clone(), movers.clone());

        let watchlist = WatchlistStore::new(&cfg.watchlist);
        let feed = WatchlistFeed::spawn(live.clone(), watchlist.clone(), &cfg.stream);

        let scanner = ProximityScanner::new(rest.clone(), cfg.analysis.clone());
        let chart = ChartController::new(cfg.clone(), rest, live);

        info!(
            watchlist = cfg.watchlist.len(),
            interval = %cfg.series.interval,
            capacity = cfg.series.capacity,
            "market monitor started"
        );

        Self {
            cfg,
            chart,
            movers,
            refresher,
            watchlist,
            feed,
            scanner,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.cfg
    }

    pub fn chart(&self) -> &ChartController {
        &self.chart
    }

    pub fn movers(&self) -> &MoversStore {
        &self.movers
    }

    pub fn watchlist(&self) -> &WatchlistStore {
        &self.watchlist
    }

    pub fn watchlist_feed(&self) -> &WatchlistFeed {
        &self.feed
    }

    /// Proximity analysis over the configured watchlist.
    pub async fn scan_watchlist(&self) -> ProximityReport {
        self.scanner.scan(self.watchlist.symbols()).await
    }

    /// Stop every background task and wait for them to finish.
    pub async fn shutdown(self) {
        self.chart.stop().await;
        self.feed.stop().await;
        self.refresher.stop().await;
        info!("market monitor stopped");
    }
}
