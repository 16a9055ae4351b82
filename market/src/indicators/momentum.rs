//! Dual moving-average momentum (MACD): `fast EMA - slow EMA`, a signal line
//! (EMA of that difference) and the histogram between them.

use super::ema::{ema_of_available, ema_series};
use crate::config::MomentumConfig;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MomentumSeries {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// `macd` is available once `slow` bars exist; `signal` once `signal` macd
/// values exist.
pub fn momentum_series(closes: &[f64], cfg: MomentumConfig) -> MomentumSeries {
    let fast = ema_series(closes, cfg.fast);
    let slow = ema_series(closes, cfg.slow);
    let warmup = cfg.slow.max(1) - 1;

    let macd: Vec<Option<f64>> = fast
        .iter()
        .zip(&slow)
        .enumerate()
        .map(|(i, (f, s))| (i >= warmup).then(|| f - s))
        .collect();

    let signal_warmup = warmup + cfg.signal.max(1) - 1;
    let signal: Vec<Option<f64>> = ema_of_available(&macd, cfg.signal)
        .into_iter()
        .enumerate()
        .map(|(i, v)| if i >= signal_warmup { v } else { None })
        .collect();

    let histogram = macd
        .iter()
        .zip(&signal)
        .map(|(m, s)| Some((*m)? - (*s)?))
        .collect();

    MomentumSeries {
        macd,
        signal,
        histogram,
    }
}
