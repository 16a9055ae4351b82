use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug};

use common::logger::task_span;

use crate::binance::LiveStreamApi;
use crate::config::StreamConfig;
use crate::stream::{AdapterHandle, Backoff, LinkStatus, TickerSource, spawn_adapter};
use crate::time::now_ms;
use crate::types::{Symbol, Ticker};

/// Last known price of one watchlist instrument. Prices stay `None` until the
/// first ticker arrives.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WatchlistEntry {
    pub symbol: Symbol,
    pub last_price: Option<f64>,
    pub price_change_pct: Option<f64>,
    pub updated_at_ms: Option<u64>,
}

impl WatchlistEntry {
    fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            last_price: None,
            price_change_pct: None,
            updated_at_ms: None,
        }
    }
}

/// Fixed set of instruments with their latest ticker values.
#[derive(Clone)]
pub struct WatchlistStore {
    order: Arc<[Symbol]>,
    entries: Arc<RwLock<HashMap<Symbol, WatchlistEntry>>>,
}

impl WatchlistStore {
    pub fn new(symbols: &[Symbol]) -> Self {
        let mut order: Vec<Symbol> = Vec::with_capacity(symbols.len());
        for s in symbols {
            if !order.contains(s) {
                order.push(s.clone());
            }
        }

        let entries = order
            .iter()
            .map(|s| (s.clone(), WatchlistEntry::empty(s.clone())))
            .collect();

        Self {
            order: order.into(),
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.order
    }

    /// Record `ticker`; tickers for instruments outside the list are ignored.
    pub fn apply(&self, ticker: &Ticker, now_ms: u64) -> bool {
        let mut g = self.entries.write();
        let Some(entry) = g.get_mut(&ticker.symbol) else {
            debug!(symbol = %ticker.symbol, "ticker outside watchlist ignored");
            return false;
        };

        entry.last_price = Some(ticker.last_price);
        entry.price_change_pct = Some(ticker.price_change_pct);
        entry.updated_at_ms = Some(now_ms);
        true
    }

    pub fn get(&self, symbol: &Symbol) -> Option<WatchlistEntry> {
        self.entries.read().get(symbol).cloned()
    }

    /// All entries in watchlist order.
    pub fn entries(&self) -> Vec<WatchlistEntry> {
        let g = self.entries.read();
        self.order.iter().filter_map(|s| g.get(s).cloned()).collect()
    }
}

/// Live ticker stream for the whole watchlist feeding a [`WatchlistStore`].
pub struct WatchlistFeed {
    adapter: AdapterHandle,
    consumer: JoinHandle<()>,
}

impl WatchlistFeed {
    pub fn spawn(live: Arc<dyn LiveStreamApi>, store: WatchlistStore, cfg: &StreamConfig) -> Self {
        let (tx, mut rx) = mpsc::channel::<Ticker>(cfg.queue_capacity.max(1));

        let adapter = spawn_adapter(
            TickerSource::new(live, store.symbols().to_vec()),
            Backoff::new(cfg.backoff_base, cfg.backoff_max),
            tx,
            task_span("ticker_stream", "watchlist"),
        );

        let consumer = tokio::spawn(
            async move {
                while let Some(ticker) = rx.recv().await {
                    store.apply(&ticker, now_ms());
                }
            }
            .instrument(task_span("watchlist", "watchlist")),
        );

        Self { adapter, consumer }
    }

    pub fn status(&self) -> LinkStatus {
        self.adapter.status()
    }

    pub async fn stop(self) {
        self.adapter.stop().await;
        self.consumer.abort();
        let _ = self.consumer.await;
    }
}
