//! Live market-data window maintenance and signal detection.
//!
//! Data flow:
//! REST seed / live stream → `WatchContext` writer → `BarSeries`
//!   → `IndicatorEngine` → `SignalDetector` → `WatchView` (consumed by rendering)
//!
//! The snapshot refresher, watchlist feed and proximity scanner run beside the
//! per-instrument contexts and publish their own result sets.

pub mod analysis;
pub mod binance;
pub mod config;
pub mod context;
pub mod error;
pub mod indicators;
pub mod monitor;
pub mod refresher;
pub mod series;
pub mod signals;
pub mod stream;
pub mod time;
pub mod types;

pub use error::{MarketError, ValidationError};
pub use types::{Bar, BarUpdate, Interval, Symbol, Ticker};
