#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use parking_lot::Mutex;
use tokio::sync::watch;

use market::binance::{FetchError, LiveStreamApi, MarketDataApi};
use market::stream::{ItemStream, StreamError};
use market::{Bar, BarUpdate, Interval, Symbol, Ticker};

pub fn bar(ts_ms: u64, close: f64, volume: f64) -> Bar {
    Bar {
        ts_ms,
        open: close,
        high: close,
        low: close,
        close,
        volume,
    }
}

/// `count` one-minute bars starting at zero, all closing at `close`.
pub fn flat_bars(count: u64, close: f64) -> Vec<Bar> {
    (0..count).map(|i| bar(i * 60_000, close, 10.0)).collect()
}

pub fn update(symbol: &str, bar: Bar, is_final: bool) -> BarUpdate {
    BarUpdate {
        symbol: Symbol::new(symbol),
        bar,
        is_final,
    }
}

/// In-memory REST side. Kline responses are per symbol and can be swapped
/// between calls; symbols marked failing return an HTTP-like error.
#[derive(Default)]
pub struct MockRest {
    klines: Mutex<HashMap<Symbol, Vec<Bar>>>,
    failing: Mutex<HashSet<Symbol>>,
    tickers: Mutex<Option<Result<Vec<Ticker>, String>>>,
    kline_calls: Mutex<Vec<(Symbol, String, usize)>>,
}

impl MockRest {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_klines(&self, symbol: &str, bars: Vec<Bar>) {
        self.klines.lock().insert(Symbol::new(symbol), bars);
    }

    pub fn fail(&self, symbol: &str) {
        self.failing.lock().insert(Symbol::new(symbol));
    }

    pub fn set_tickers(&self, tickers: Result<Vec<Ticker>, String>) {
        *self.tickers.lock() = Some(tickers);
    }

    pub fn kline_calls(&self) -> Vec<(Symbol, String, usize)> {
        self.kline_calls.lock().clone()
    }
}

#[async_trait]
impl MarketDataApi for MockRest {
    async fn fetch_klines(
        &self,
        symbol: &Symbol,
        interval: &Interval,
        limit: usize,
    ) -> Result<Vec<Bar>, FetchError> {
        self.kline_calls
            .lock()
            .push((symbol.clone(), interval.code().to_string(), limit));

        if self.failing.lock().contains(symbol) {
            return Err(FetchError::InvalidResponse("503 Service Unavailable".into()));
        }

        let bars = self.klines.lock().get(symbol).cloned().unwrap_or_default();
        let skip = bars.len().saturating_sub(limit);
        Ok(bars[skip..].to_vec())
    }

    async fn fetch_tickers(&self) -> Result<Vec<Ticker>, FetchError> {
        match self.tickers.lock().clone() {
            Some(Ok(tickers)) => Ok(tickers),
            Some(Err(reason)) => Err(FetchError::InvalidResponse(reason)),
            None => Ok(Vec::new()),
        }
    }
}

pub type Link<T> = UnboundedSender<Result<T, StreamError>>;

/// In-memory stream side. Every connect opens a channel whose sending half
/// is kept so the test can push messages, end the connection, or check that
/// the consumer dropped it.
pub struct MockLive {
    klines: Mutex<Vec<(Symbol, Link<BarUpdate>)>>,
    tickers: Mutex<Vec<Link<Ticker>>>,
    connects: watch::Sender<usize>,
}

impl MockLive {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            klines: Mutex::new(Vec::new()),
            tickers: Mutex::new(Vec::new()),
            connects: watch::Sender::new(0),
        })
    }

    pub fn kline_links(&self, symbol: &str) -> Vec<Link<BarUpdate>> {
        let symbol = Symbol::new(symbol);
        self.klines
            .lock()
            .iter()
            .filter(|(s, _)| *s == symbol)
            .map(|(_, l)| l.clone())
            .collect()
    }

    pub fn ticker_links(&self) -> Vec<Link<Ticker>> {
        self.tickers.lock().clone()
    }

    pub fn connect_count(&self) -> usize {
        *self.connects.borrow()
    }

    /// Wait until at least `n` connections have been opened in total.
    pub async fn wait_for_connects(&self, n: usize) {
        let mut rx = self.connects.subscribe();
        tokio::time::timeout(Duration::from_secs(300), rx.wait_for(|c| *c >= n))
            .await
            .expect("timed out waiting for connect")
            .expect("mock dropped");
    }
}

#[async_trait]
impl LiveStreamApi for MockLive {
    async fn connect_klines(
        &self,
        symbol: &Symbol,
        _interval: &Interval,
    ) -> Result<ItemStream<BarUpdate>, StreamError> {
        let (tx, rx) = unbounded();
        self.klines.lock().push((symbol.clone(), tx));
        self.connects.send_modify(|c| *c += 1);
        Ok(rx.boxed())
    }

    async fn connect_tickers(&self, _symbols: &[Symbol]) -> Result<ItemStream<Ticker>, StreamError> {
        let (tx, rx) = unbounded();
        self.tickers.lock().push(tx);
        self.connects.send_modify(|c| *c += 1);
        Ok(rx.boxed())
    }
}

/// Wait until the watched value satisfies `pred`.
pub async fn wait_until<T>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) {
    tokio::time::timeout(Duration::from_secs(300), rx.wait_for(pred))
        .await
        .expect("timed out waiting for view")
        .expect("publisher dropped");
}
