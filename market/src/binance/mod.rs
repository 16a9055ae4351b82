pub mod client;
pub mod errors;
pub mod parser;
pub mod types;
pub mod ws;

use async_trait::async_trait;

use crate::stream::ItemStream;
use crate::types::{Bar, BarUpdate, Interval, Symbol, Ticker};

pub use client::BinanceRestClient;
pub use errors::{DecodeError, FetchError};
pub use ws::BinanceWsClient;

/// Request/response market data (historical bars, 24h tickers).
#[async_trait]
pub trait MarketDataApi: Send + Sync + 'static {
    /// Most recent `limit` bars, oldest first.
    async fn fetch_klines(
        &self,
        symbol: &Symbol,
        interval: &Interval,
        limit: usize,
    ) -> Result<Vec<Bar>, FetchError>;

    /// 24h statistics for every listed instrument.
    async fn fetch_tickers(&self) -> Result<Vec<Ticker>, FetchError>;
}

/// Push market data. Each call opens one connection; reconnecting is the
/// caller's job.
#[async_trait]
pub trait LiveStreamApi: Send + Sync + 'static {
    async fn connect_klines(
        &self,
        symbol: &Symbol,
        interval: &Interval,
    ) -> Result<ItemStream<BarUpdate>, crate::stream::StreamError>;

    async fn connect_tickers(
        &self,
        symbols: &[Symbol],
    ) -> Result<ItemStream<Ticker>, crate::stream::StreamError>;
}
