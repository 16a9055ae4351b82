//! Live stream ingestion.
//!
//! A [`StreamSource`] opens one connection and yields decoded items; the
//! [`adapter`] owns the reconnect loop around it and forwards items, in
//! arrival order, into a bounded queue.

pub mod adapter;
pub mod backoff;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::binance::{DecodeError, LiveStreamApi};
use crate::types::{BarUpdate, Interval, Symbol, Ticker};

pub use adapter::{AdapterHandle, spawn_adapter};
pub use backoff::Backoff;

/// Decoded items of one connection.
pub type ItemStream<T> = BoxStream<'static, Result<T, StreamError>>;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("connect failed: {0}")]
    Connect(Box<tungstenite::Error>),

    #[error("transport error: {0}")]
    Transport(Box<tungstenite::Error>),

    #[error("connection closed: {0}")]
    Closed(String),

    #[error("undecodable message: {0}")]
    Decode(#[from] DecodeError),
}

impl StreamError {
    /// A bad message does not poison the connection it arrived on.
    pub fn is_message_local(&self) -> bool {
        matches!(self, StreamError::Decode(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Streaming,
}

/// Observable state of a stream adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub state: ConnectionState,
    /// Successful connects so far; more than one means at least one reconnect.
    pub connects: u64,
    pub last_change_ms: u64,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            connects: 0,
            last_change_ms: 0,
        }
    }
}

#[async_trait]
pub trait StreamSource: Send + Sync + 'static {
    type Item: Send + 'static;

    /// Short name for logs, e.g. `btcusdt@kline_1m`.
    fn describe(&self) -> String;

    async fn connect(&self) -> Result<ItemStream<Self::Item>, StreamError>;
}

/// Bar updates of one instrument at one interval.
pub struct KlineSource {
    api: Arc<dyn LiveStreamApi>,
    symbol: Symbol,
    interval: Interval,
}

impl KlineSource {
    pub fn new(api: Arc<dyn LiveStreamApi>, symbol: Symbol, interval: Interval) -> Self {
        Self {
            api,
            symbol,
            interval,
        }
    }
}

#[async_trait]
impl StreamSource for KlineSource {
    type Item = BarUpdate;

    fn describe(&self) -> String {
        format!("{}@kline_{}", self.symbol.stream_name(), self.interval)
    }

    async fn connect(&self) -> Result<ItemStream<BarUpdate>, StreamError> {
        self.api.connect_klines(&self.symbol, &self.interval).await
    }
}

/// 24h ticker updates for a fixed set of instruments.
pub struct TickerSource {
    api: Arc<dyn LiveStreamApi>,
    symbols: Vec<Symbol>,
}

impl TickerSource {
    pub fn new(api: Arc<dyn LiveStreamApi>, symbols: Vec<Symbol>) -> Self {
        Self { api, symbols }
    }
}

#[async_trait]
impl StreamSource for TickerSource {
    type Item = Ticker;

    fn describe(&self) -> String {
        format!("ticker[{}]", self.symbols.len())
    }

    async fn connect(&self) -> Result<ItemStream<Ticker>, StreamError> {
        self.api.connect_tickers(&self.symbols).await
    }
}
