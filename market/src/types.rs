use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ValidationError;

/// Exchange instrument identifier, normalized to upper case (e.g. `BTCUSDT`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case form used in stream topic names.
    pub fn stream_name(&self) -> String {
        self.0.to_lowercase()
    }

    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.0.ends_with(&suffix.to_uppercase())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported interval `{0}`")]
pub struct ParseIntervalError(pub String);

/// Bar interval in exchange notation (`1m`, `15m`, `1h`, `1d`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    code: String,
    duration_ms: u64,
}

impl Interval {
    pub(crate) fn known(code: &'static str, duration_ms: u64) -> Self {
        Self {
            code: code.to_string(),
            duration_ms,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

impl FromStr for Interval {
    type Err = ParseIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseIntervalError(s.to_string());

        let split = s.find(|c: char| !c.is_ascii_digit()).ok_or_else(err)?;
        let (count, unit) = s.split_at(split);
        let count: u64 = count.parse().map_err(|_| err())?;
        if count == 0 {
            return Err(err());
        }

        // `M` (month) is approximated as 30 days.
        let unit_ms = match unit {
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            "w" => 7 * 86_400_000,
            "M" => 30 * 86_400_000,
            _ => return Err(err()),
        };

        Ok(Self {
            code: s.to_string(),
            duration_ms: count * unit_ms,
        })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// One OHLCV bar keyed by its interval open time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Interval open time (ms since epoch); unique within a series.
    pub ts_ms: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ts_ms as i64)
    }

    /// Rejects non-finite values, non-positive prices, negative volume and
    /// a high/low pair that does not bracket open and close.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];

        for (field, value) in prices.into_iter().chain([("volume", self.volume)]) {
            if !value.is_finite() {
                return Err(ValidationError::NonFinite { field });
            }
        }

        for (field, value) in prices {
            if value <= 0.0 {
                return Err(ValidationError::NonPositivePrice { field, value });
            }
        }

        if self.volume < 0.0 {
            return Err(ValidationError::NegativeVolume(self.volume));
        }

        if self.high < self.low
            || self.high < self.open.max(self.close)
            || self.low > self.open.min(self.close)
        {
            return Err(ValidationError::InconsistentRange {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        Ok(())
    }
}

/// A decoded live update for one instrument.
///
/// `is_final` marks a closed interval; otherwise the bar is the in-progress
/// interval and replaces the current bar in place.
#[derive(Debug, Clone, PartialEq)]
pub struct BarUpdate {
    pub symbol: Symbol,
    pub bar: Bar,
    pub is_final: bool,
}

/// 24h cross-sectional ticker row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticker {
    pub symbol: Symbol,
    pub price_change_pct: f64,
    pub last_price: f64,
}
