//! Distance of price from its long EMA, and the most recent "touch".
//!
//! - proximity: `(last_close - ema_long) / last_close * 100`
//! - touch: a prior bar whose `|close - ema| / close * 100` is below the
//!   threshold. The scan runs backward from the bar before the current one.
//! - move since touch: percent change from the touch close to the current close.
//!
//! Ranking orders by ascending absolute proximity (closest first), ties by
//! symbol ascending.

use serde::Serialize;

use super::ema::ema_series;
use crate::error::MarketError;
use crate::types::{Bar, Symbol};

const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum TouchOutcome {
    Touched {
        /// Index of the touch bar within the window.
        index: usize,
        hours_since: f64,
        move_since_pct: f64,
    },
    NotFound,
}

impl TouchOutcome {
    /// Hours since the touch, or the `-1` sentinel when there was none.
    pub fn hours_since(&self) -> f64 {
        match self {
            TouchOutcome::Touched { hours_since, .. } => *hours_since,
            TouchOutcome::NotFound => -1.0,
        }
    }

    /// Percent move since the touch, or `0` when there was none.
    pub fn move_since_pct(&self) -> f64 {
        match self {
            TouchOutcome::Touched { move_since_pct, .. } => *move_since_pct,
            TouchOutcome::NotFound => 0.0,
        }
    }
}

pub fn proximity_pct(last_close: f64, ema_long: f64) -> f64 {
    (last_close - ema_long) / last_close * 100.0
}

/// Index of the most recent bar before the last one whose close lies within
/// `threshold_pct` of the EMA.
pub fn find_last_touch(closes: &[f64], ema: &[f64], threshold_pct: f64) -> Option<usize> {
    let n = closes.len().min(ema.len());
    (0..n.saturating_sub(1))
        .rev()
        .find(|&i| (closes[i] - ema[i]).abs() / closes[i] * 100.0 < threshold_pct)
}

/// Touch metrics for a window of bars and its aligned EMA values.
pub fn touch_outcome(bars: &[Bar], ema: &[f64], threshold_pct: f64) -> TouchOutcome {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let (Some(index), Some(last)) = (find_last_touch(&closes, ema, threshold_pct), bars.last())
    else {
        return TouchOutcome::NotFound;
    };

    let touch = bars[index];
    TouchOutcome::Touched {
        index,
        hours_since: last.ts_ms.saturating_sub(touch.ts_ms) as f64 / MS_PER_HOUR,
        move_since_pct: (last.close - touch.close) / touch.close * 100.0,
    }
}

/// Per-instrument proximity analysis before ranking.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProximityMetrics {
    pub symbol: Symbol,
    pub proximity_pct: f64,
    pub touch: TouchOutcome,
}

/// A ranked row as shown by the analysis view (rank 1 = closest to the EMA).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProximityRow {
    pub rank: usize,
    pub symbol: Symbol,
    pub proximity_pct: f64,
    pub hours_since_touch: f64,
    pub move_since_touch_pct: f64,
}

pub fn proximity_metrics(
    symbol: Symbol,
    bars: &[Bar],
    ema_span: usize,
    touch_threshold_pct: f64,
) -> Result<ProximityMetrics, MarketError> {
    let Some(last) = bars.last() else {
        return Err(MarketError::ComputationUnavailable {
            indicator: "proximity",
            needed: 1,
            available: 0,
        });
    };

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema = ema_series(&closes, ema_span);
    let ema_long = ema[ema.len() - 1];

    Ok(ProximityMetrics {
        symbol,
        proximity_pct: proximity_pct(last.close, ema_long),
        touch: touch_outcome(bars, &ema, touch_threshold_pct),
    })
}

pub fn rank_by_proximity(mut metrics: Vec<ProximityMetrics>) -> Vec<ProximityRow> {
    metrics.sort_by(|a, b| {
        a.proximity_pct
            .abs()
            .total_cmp(&b.proximity_pct.abs())
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    metrics
        .into_iter()
        .enumerate()
        .map(|(i, m)| ProximityRow {
            rank: i + 1,
            symbol: m.symbol,
            proximity_pct: m.proximity_pct,
            hours_since_touch: m.touch.hours_since(),
            move_since_touch_pct: m.touch.move_since_pct(),
        })
        .collect()
}
