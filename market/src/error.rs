use thiserror::Error;

use crate::binance::FetchError;
use crate::stream::StreamError;

/// Why a bar was refused by the series.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} is not finite")]
    NonFinite { field: &'static str },

    #[error("{field} must be positive, got {value}")]
    NonPositivePrice { field: &'static str, value: f64 },

    #[error("volume must be non-negative, got {0}")]
    NegativeVolume(f64),

    #[error("high {high} / low {low} do not bracket open {open} and close {close}")]
    InconsistentRange {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// Error taxonomy of the market core. Every variant is recoverable at the
/// instrument or connection level.
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("fetch failed: {0}")]
    TransientFetch(#[from] FetchError),

    #[error("stream failed: {0}")]
    Stream(#[from] StreamError),

    #[error("invalid bar: {0}")]
    DataValidation(#[from] ValidationError),

    #[error("{indicator} unavailable: needs {needed} bars, have {available}")]
    ComputationUnavailable {
        indicator: &'static str,
        needed: usize,
        available: usize,
    },
}
