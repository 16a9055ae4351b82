//! Signal detector.
//!
//! Stateless evaluation of the newest bar against its predecessor and the
//! trailing volume mean:
//! - `price_change_pct = (close[t] - close[t-1]) / close[t-1] * 100`,
//!   fires when `|price_change_pct| >= price_move_pct`
//! - `volume_ratio = volume[t] / mean(volume[t-k..t-1])`,
//!   fires when `volume_ratio > volume_ratio_threshold`; undefined (no alert)
//!   when the trailing mean is zero

pub mod alert;

use std::time::Duration;

use crate::config::SignalConfig;
use crate::types::{Bar, Symbol};
pub use alert::{Alert, AlertBoard, AlertKind, display_text};

/// Slack for the percent threshold; `(c - p) * 100 / p` rounds below an
/// exact move on most price bases.
const PCT_EPSILON: f64 = 1e-9;

#[derive(Clone, Debug)]
pub struct SignalDetector {
    cfg: SignalConfig,
}

impl SignalDetector {
    pub fn new(cfg: SignalConfig) -> Self {
        Self { cfg }
    }

    pub fn alert_ttl(&self) -> Duration {
        self.cfg.alert_ttl
    }

    /// Alerts for the newest bar of `bars`. Multiple conditions yield
    /// multiple alerts.
    pub fn evaluate(&self, symbol: &Symbol, bars: &[Bar], now_ms: u64) -> Vec<Alert> {
        let expires_at_ms = now_ms.saturating_add(self.cfg.alert_ttl.as_millis() as u64);
        let mk = |kind, magnitude| Alert {
            kind,
            symbol: symbol.clone(),
            magnitude,
            generated_at_ms: now_ms,
            expires_at_ms,
        };

        let mut alerts = Vec::new();

        if let Some(pct) = price_change_pct(bars) {
            if pct.abs() >= self.cfg.price_move_pct - PCT_EPSILON {
                alerts.push(mk(AlertKind::PriceMove, pct));
            }
        }

        if let Some(ratio) = volume_ratio(bars, self.cfg.volume_lookback) {
            if ratio > self.cfg.volume_ratio {
                alerts.push(mk(AlertKind::VolumeSpike, ratio));
            }
        }

        alerts
    }
}

/// Close-to-close percent change of the newest bar; `None` with fewer than
/// two bars.
pub fn price_change_pct(bars: &[Bar]) -> Option<f64> {
    let [.., prev, last] = bars else {
        return None;
    };
    Some((last.close - prev.close) * 100.0 / prev.close)
}

/// Newest volume over the mean of up to `lookback` preceding volumes.
pub fn volume_ratio(bars: &[Bar], lookback: usize) -> Option<f64> {
    let (last, prior) = bars.split_last()?;
    let trailing = &prior[prior.len().saturating_sub(lookback.max(1))..];
    if trailing.is_empty() {
        return None;
    }

    let mean = trailing.iter().map(|b| b.volume).sum::<f64>() / trailing.len() as f64;
    if mean <= 0.0 {
        return None;
    }
    Some(last.volume / mean)
}
