use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::types::{Interval, Symbol};

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub exchange: ExchangeConfig,
    pub series: SeriesConfig,
    pub indicators: IndicatorConfig,
    pub signals: SignalConfig,
    pub stream: StreamConfig,
    pub refresher: RefresherConfig,
    pub analysis: AnalysisConfig,

    /// Instruments continuously monitored through the ticker stream and
    /// scanned by the proximity analysis.
    pub watchlist: Vec<Symbol>,
}

#[derive(Clone, Debug)]
pub struct ExchangeConfig {
    /// REST base, e.g. `https://api.binance.com`.
    pub rest_url: String,
    /// Stream base, e.g. `wss://stream.binance.com:9443`.
    pub ws_url: String,
    pub http_timeout: Duration,
    /// Fetches slower than this are reported on the `performance` target.
    pub slow_fetch: Duration,
}

#[derive(Clone, Debug)]
pub struct SeriesConfig {
    /// Maximum number of bars kept per instrument (N).
    pub capacity: usize,
    /// Bar interval for the chart series and its live stream.
    pub interval: Interval,
}

#[derive(Clone, Debug)]
pub struct IndicatorConfig {
    /// EMA spans computed for every series. The largest is the "long" EMA.
    pub ema_spans: Vec<usize>,
    /// Lookback of the bounded oscillator (RSI).
    pub oscillator_lookback: usize,
    pub momentum: MomentumConfig,
}

#[derive(Clone, Copy, Debug)]
pub struct MomentumConfig {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

#[derive(Clone, Debug)]
pub struct SignalConfig {
    /// Absolute close-to-close move (percent) that fires a price alert (`>=`).
    pub price_move_pct: f64,
    /// Volume / trailing mean ratio that fires a volume alert (strict `>`).
    pub volume_ratio: f64,
    /// Number of preceding bars averaged for the volume ratio.
    pub volume_lookback: usize,
    /// How long an alert stays active after generation.
    pub alert_ttl: Duration,
}

#[derive(Clone, Debug)]
pub struct StreamConfig {
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Capacity of the per-instrument writer queue.
    pub queue_capacity: usize,
    /// Bars re-fetched after a reconnect to fill the gap.
    pub backfill_bars: usize,
}

#[derive(Clone, Debug)]
pub struct RefresherConfig {
    pub period: Duration,
    /// Only tickers whose symbol ends with this suffix are ranked.
    pub quote_suffix: String,
    pub top_n: usize,
}

#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    pub interval: Interval,
    pub bars: usize,
    pub ema_span: usize,
    /// A bar "touches" the EMA when `|close - ema| / close * 100` is below this.
    pub touch_threshold_pct: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig {
                rest_url: "https://api.binance.com".to_string(),
                ws_url: "wss://stream.binance.com:9443".to_string(),
                http_timeout: Duration::from_secs(10),
                slow_fetch: Duration::from_secs(2),
            },
            series: SeriesConfig {
                capacity: 100,
                interval: Interval::known("1m", 60_000),
            },
            indicators: IndicatorConfig {
                ema_spans: vec![9, 50],
                oscillator_lookback: 14,
                momentum: MomentumConfig {
                    fast: 12,
                    slow: 26,
                    signal: 9,
                },
            },
            signals: SignalConfig {
                price_move_pct: 3.0,
                volume_ratio: 2.0,
                volume_lookback: 99,
                alert_ttl: Duration::from_secs(7),
            },
            stream: StreamConfig {
                backoff_base: Duration::from_millis(500),
                backoff_max: Duration::from_secs(30),
                queue_capacity: 256,
                backfill_bars: 20,
            },
            refresher: RefresherConfig {
                period: Duration::from_secs(300),
                quote_suffix: "USDT".to_string(),
                top_n: 5,
            },
            analysis: AnalysisConfig {
                interval: Interval::known("1h", 3_600_000),
                bars: 200,
                ema_span: 50,
                touch_threshold_pct: 1.0,
            },
            watchlist: ["BTCUSDT", "ETHUSDT", "BNBUSDT"]
                .into_iter()
                .map(Symbol::new)
                .collect(),
        }
    }
}

impl MonitorConfig {
    /// Defaults overridden by `MARKETWATCH_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`MonitorConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(url) = lookup("MARKETWATCH_REST_URL") {
            cfg.exchange.rest_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup("MARKETWATCH_WS_URL") {
            cfg.exchange.ws_url = url.trim_end_matches('/').to_string();
        }

        cfg.series.capacity = parse_or(
            &lookup,
            "MARKETWATCH_SERIES_CAPACITY",
            cfg.series.capacity,
        )
        .max(2);
        cfg.series.interval = parse_or(
            &lookup,
            "MARKETWATCH_INTERVAL",
            cfg.series.interval.clone(),
        );

        let refresh_secs = parse_or(
            &lookup,
            "MARKETWATCH_REFRESH_SECS",
            cfg.refresher.period.as_secs(),
        );
        cfg.refresher.period = Duration::from_secs(refresh_secs.max(1));

        if let Some(suffix) = lookup("MARKETWATCH_QUOTE_SUFFIX") {
            cfg.refresher.quote_suffix = suffix.trim().to_uppercase();
        }

        if let Some(list) = lookup("MARKETWATCH_WATCHLIST") {
            let symbols: Vec<Symbol> = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(Symbol::new)
                .collect();
            if symbols.is_empty() {
                warn!(value = %list, "empty watchlist override ignored");
            } else {
                cfg.watchlist = symbols;
            }
        }

        cfg.signals.volume_lookback = cfg.series.capacity - 1;

        cfg
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(key, value = %raw, "unparsable config value; using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_behavior() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.series.capacity, 100);
        assert_eq!(cfg.series.interval.code(), "1m");
        assert_eq!(cfg.indicators.ema_spans, vec![9, 50]);
        assert_eq!(cfg.signals.alert_ttl, Duration::from_secs(7));
        assert_eq!(cfg.refresher.period, Duration::from_secs(300));
        assert_eq!(cfg.watchlist.len(), 3);
    }

    #[test]
    fn env_overrides_are_applied() {
        let cfg = MonitorConfig::from_lookup(lookup(&[
            ("MARKETWATCH_SERIES_CAPACITY", "250"),
            ("MARKETWATCH_INTERVAL", "5m"),
            ("MARKETWATCH_REFRESH_SECS", "60"),
            ("MARKETWATCH_WATCHLIST", "solusdt, xrpusdt"),
            ("MARKETWATCH_REST_URL", "http://localhost:8080/"),
        ]));

        assert_eq!(cfg.series.capacity, 250);
        assert_eq!(cfg.signals.volume_lookback, 249);
        assert_eq!(cfg.series.interval.duration_ms(), 300_000);
        assert_eq!(cfg.refresher.period, Duration::from_secs(60));
        assert_eq!(cfg.watchlist, vec![Symbol::new("SOLUSDT"), Symbol::new("XRPUSDT")]);
        assert_eq!(cfg.exchange.rest_url, "http://localhost:8080");
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let cfg = MonitorConfig::from_lookup(lookup(&[
            ("MARKETWATCH_SERIES_CAPACITY", "lots"),
            ("MARKETWATCH_INTERVAL", "7y"),
            ("MARKETWATCH_WATCHLIST", " , "),
        ]));

        assert_eq!(cfg.series.capacity, 100);
        assert_eq!(cfg.series.interval.code(), "1m");
        assert_eq!(cfg.watchlist.len(), 3);
    }
}
