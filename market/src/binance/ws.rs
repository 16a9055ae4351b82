use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, trace};

use super::LiveStreamApi;
use super::errors::DecodeError;
use super::parser::{parse_kline_message, parse_ticker_message};
use crate::stream::{ItemStream, StreamError};
use crate::types::{BarUpdate, Interval, Symbol, Ticker};

/// WebSocket implementation of [`LiveStreamApi`].
pub struct BinanceWsClient {
    pub ws_url: String,
}

impl BinanceWsClient {
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }

    pub fn kline_url(&self, symbol: &Symbol, interval: &Interval) -> String {
        format!("{}/ws/{}@kline_{}", self.ws_url, symbol.stream_name(), interval)
    }

    pub fn ticker_url(&self, symbols: &[Symbol]) -> String {
        let streams: Vec<String> = symbols
            .iter()
            .map(|s| format!("{}@ticker", s.stream_name()))
            .collect();
        format!("{}/stream?streams={}", self.ws_url, streams.join("/"))
    }

    /// Opens `url` and maps frames through `parse`. Keep-alives and
    /// non-actionable messages are dropped; a close frame ends the stream
    /// with [`StreamError::Closed`].
    async fn open<T, F>(url: String, parse: F) -> Result<ItemStream<T>, StreamError>
    where
        T: Send + 'static,
        F: Fn(&str) -> Result<Option<T>, DecodeError> + Send + Sync + 'static,
    {
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| StreamError::Connect(Box::new(e)))?;
        info!(url = %url, "websocket connection established");

        let items = ws.filter_map(move |msg| {
            let out = match msg {
                Ok(Message::Text(text)) => {
                    trace!(raw_event = %text.as_str(), "received raw websocket message");
                    parse(text.as_str()).map_err(StreamError::from).transpose()
                }
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_string())
                        .unwrap_or_else(|| "no reason".to_string());
                    Some(Err(StreamError::Closed(reason)))
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    debug!("received keep-alive message");
                    None
                }
                Ok(other) => {
                    debug!(msg_type = ?other, "ignoring non-text websocket message");
                    None
                }
                Err(e) => Some(Err(StreamError::Transport(Box::new(e)))),
            };
            futures::future::ready(out)
        });

        Ok(items.boxed())
    }
}

#[async_trait]
impl LiveStreamApi for BinanceWsClient {
    #[instrument(skip(self), fields(symbol = %symbol, interval = %interval))]
    async fn connect_klines(
        &self,
        symbol: &Symbol,
        interval: &Interval,
    ) -> Result<ItemStream<BarUpdate>, StreamError> {
        Self::open(self.kline_url(symbol, interval), parse_kline_message).await
    }

    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    async fn connect_tickers(&self, symbols: &[Symbol]) -> Result<ItemStream<Ticker>, StreamError> {
        Self::open(self.ticker_url(symbols), parse_ticker_message).await
    }
}
