//! Exponential Moving Average (EMA).
//!
//! Recursive: `EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1]`, with
//! `alpha = 2 / (span + 1)`, seeded by the first value (`EMA[0] = x[0]`).
//!
//! The whole visible window is recomputed on every call, so the seed moves
//! with the window front when old bars are evicted. Window sizes are a few
//! hundred bars at most.

/// Smoothing factor for a span.
pub fn alpha(span: usize) -> f64 {
    2.0 / (span.max(1) as f64 + 1.0)
}

/// EMA of `values`, one output per input. Empty input yields an empty series.
pub fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    let a = alpha(span);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;

    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => a * v + (1.0 - a) * p,
        };
        out.push(next);
        prev = Some(next);
    }

    out
}

/// EMA over the defined entries of a partially available series.
///
/// Leading `None`s stay `None`; the EMA is seeded by the first defined value.
/// A `None` after that point leaves a gap without resetting the recursion.
pub fn ema_of_available(values: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    let a = alpha(span);
    let mut prev: Option<f64> = None;

    values
        .iter()
        .map(|v| {
            let v = (*v)?;
            let next = match prev {
                None => v,
                Some(p) => a * v + (1.0 - a) * p,
            };
            prev = Some(next);
            Some(next)
        })
        .collect()
}
