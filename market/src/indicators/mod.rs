//! Indicator engine.
//!
//! Derived state is a pure function of the current series contents: every
//! call recomputes from a snapshot and nothing is carried between calls.
//! Values that need more history than the window holds are `None`.

pub mod ema;
pub mod momentum;
pub mod oscillator;
pub mod proximity;

use serde::Serialize;

use crate::config::IndicatorConfig;
use crate::types::Bar;
use momentum::MomentumSeries;

/// EMA values at one span, aligned with the series bars.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EmaLine {
    pub span: usize,
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndicatorState {
    /// Timestamp of the newest bar the state was computed from.
    pub as_of_ts: Option<u64>,
    pub emas: Vec<EmaLine>,
    pub oscillator: Vec<Option<f64>>,
    pub momentum: MomentumSeries,
}

/// Latest value of every indicator.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IndicatorReading {
    pub emas: Vec<(usize, Option<f64>)>,
    pub oscillator: Option<f64>,
    pub macd: Option<f64>,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

impl IndicatorState {
    pub fn ema(&self, span: usize) -> Option<&[f64]> {
        self.emas
            .iter()
            .find(|l| l.span == span)
            .map(|l| l.values.as_slice())
    }

    pub fn latest(&self) -> IndicatorReading {
        fn last(v: &[Option<f64>]) -> Option<f64> {
            v.last().copied().flatten()
        }

        IndicatorReading {
            emas: self
                .emas
                .iter()
                .map(|l| (l.span, l.values.last().copied()))
                .collect(),
            oscillator: last(&self.oscillator),
            macd: last(&self.momentum.macd),
            signal: last(&self.momentum.signal),
            histogram: last(&self.momentum.histogram),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IndicatorEngine {
    cfg: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(cfg: IndicatorConfig) -> Self {
        Self { cfg }
    }

    pub fn compute(&self, bars: &[Bar]) -> IndicatorState {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        IndicatorState {
            as_of_ts: bars.last().map(|b| b.ts_ms),
            emas: self
                .cfg
                .ema_spans
                .iter()
                .map(|&span| EmaLine {
                    span,
                    values: ema::ema_series(&closes, span),
                })
                .collect(),
            oscillator: oscillator::rsi_series(&closes, self.cfg.oscillator_lookback),
            momentum: momentum::momentum_series(&closes, self.cfg.momentum),
        }
    }
}

/// Assert two f64 values are approximately equal.
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, epsilon={epsilon}"
    );
}
