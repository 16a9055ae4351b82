//! Relative Strength Index (bounded oscillator, range 0..=100).
//!
//! Average gains and losses are seeded with a simple mean over the first
//! `lookback` close-to-close changes, then smoothed with Wilder's factor
//! `1 / lookback`. `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`.
//!
//! The first `lookback` bars have no value (`None`), never zero.

pub fn rsi_series(closes: &[f64], lookback: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let lookback = lookback.max(1);
    let mut out = vec![None; n];

    if n <= lookback {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for w in closes[..=lookback].windows(2) {
        let change = w[1] - w[0];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= lookback as f64;
    avg_loss /= lookback as f64;
    out[lookback] = Some(rsi(avg_gain, avg_loss));

    let k = 1.0 / lookback as f64;
    for i in (lookback + 1)..n {
        let change = closes[i] - closes[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        avg_gain = k * gain + (1.0 - k) * avg_gain;
        avg_loss = k * loss + (1.0 - k) * avg_loss;
        out[i] = Some(rsi(avg_gain, avg_loss));
    }

    out
}

fn rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // flat
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
