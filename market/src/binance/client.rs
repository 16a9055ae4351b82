use std::time::Duration;

use async_trait::async_trait;
use common::logger::warn_if_slow;
use reqwest::{Client, Response};
use tracing::{debug, instrument};

use super::errors::FetchError;
use super::parser::{parse_kline_rows, parse_ticker_row};
use super::types::{ApiErrorBody, Ticker24hRow};
use super::MarketDataApi;
use crate::config::ExchangeConfig;
use crate::types::{Bar, Interval, Symbol, Ticker};

/// Upper bound the exchange accepts for `limit` on `/api/v3/klines`.
pub const MAX_KLINES: usize = 1000;

#[derive(Clone)]
pub struct BinanceRestClient {
    http: Client,
    url: String,
    cfg: ExchangeConfig,
}

impl BinanceRestClient {
    pub fn new(cfg: &ExchangeConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(cfg.http_timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url: cfg.rest_url.clone(),
            cfg: cfg.clone(),
        })
    }

    /// Turns non-2xx responses into errors, keeping the exchange's message.
    async fn checked(resp: Response) -> Result<String, FetchError> {
        let status = resp.status();
        let body = resp.text().await?;
        if status.is_success() {
            return Ok(body);
        }

        let reason = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(err) => format!("{status}: {} ({})", err.msg, err.code),
            Err(_) => format!("{status}: {body}"),
        };
        Err(FetchError::InvalidResponse(reason))
    }
}

#[async_trait]
impl MarketDataApi for BinanceRestClient {
    #[instrument(skip(self), fields(symbol = %symbol, interval = %interval), level = "debug")]
    async fn fetch_klines(
        &self,
        symbol: &Symbol,
        interval: &Interval,
        limit: usize,
    ) -> Result<Vec<Bar>, FetchError> {
        let url = format!("{}/api/v3/klines", self.url);
        let limit = limit.clamp(1, MAX_KLINES).to_string();

        let request = self.http.get(&url).query(&[
            ("symbol", symbol.as_str()),
            ("interval", interval.code()),
            ("limit", limit.as_str()),
        ]);

        let body = warn_if_slow("fetch_klines", self.cfg.slow_fetch, async {
            let resp = request.send().await?;
            Self::checked(resp).await
        })
        .await?;

        let bars = parse_kline_rows(&body)?;
        debug!(bars = bars.len(), "klines fetched");
        Ok(bars)
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_tickers(&self) -> Result<Vec<Ticker>, FetchError> {
        let url = format!("{}/api/v3/ticker/24hr", self.url);
        let request = self.http.get(&url);

        let body = warn_if_slow("fetch_tickers", self.cfg.slow_fetch, async {
            let resp = request.send().await?;
            Self::checked(resp).await
        })
        .await?;

        let rows: Vec<Ticker24hRow> = serde_json::from_str(&body)
            .map_err(|e| FetchError::Decode(e.into()))?;

        let tickers = rows
            .iter()
            .map(parse_ticker_row)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(tickers = tickers.len(), "24h tickers fetched");
        Ok(tickers)
    }
}
