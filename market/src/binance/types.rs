use serde::Deserialize;

/// `<symbol>@kline_<interval>` event.
#[derive(Debug, Clone, Deserialize)]
pub struct KlineEvent {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: KlinePayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KlinePayload {
    /// Interval open time (ms).
    #[serde(rename = "t")]
    pub open_time: u64,
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "v")]
    pub volume: String,
    /// Interval closed.
    #[serde(rename = "x")]
    pub is_final: bool,
}

/// `<symbol>@ticker` event (rolling 24h window).
#[derive(Debug, Clone, Deserialize)]
pub struct TickerEvent {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub last_price: String,
    #[serde(rename = "P")]
    pub price_change_percent: String,
}

/// Row of `GET /api/v3/ticker/24hr`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24hRow {
    pub symbol: String,
    pub price_change_percent: String,
    pub last_price: String,
}

/// Error body returned by the REST API (`{"code":-1121,"msg":"Invalid symbol."}`).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}
