//! Periodic status lines: what a renderer would draw, as structured logs.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use market::analysis::ProximityReport;
use market::monitor::MarketMonitor;
use market::time::now_ms;

fn fmt_ts(ts_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts_ms as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts_ms.to_string())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.4}")).unwrap_or_else(|| "n/a".to_string())
}

pub async fn log_status(monitor: &MarketMonitor) {
    let now = now_ms();

    match monitor.chart().view() {
        Some(view) => {
            let reading = view.reading();
            let emas: Vec<String> = reading
                .emas
                .iter()
                .map(|(span, v)| format!("ema{span}={}", fmt_opt(*v)))
                .collect();
            let link = monitor.chart().link_status().await;

            if let Some(bar) = view.latest() {
                let open_time = bar
                    .open_time()
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_default();
                info!(
                    symbol = %view.symbol,
                    interval = %view.interval,
                    open_time = %open_time,
                    close = bar.close,
                    volume = bar.volume,
                    bars = view.bars.len(),
                    link = ?link.map(|l| l.state),
                    "chart"
                );
            }

            info!(
                emas = %emas.join(" "),
                rsi = %fmt_opt(reading.oscillator),
                macd = %fmt_opt(reading.macd),
                signal = %fmt_opt(reading.signal),
                histogram = %fmt_opt(reading.histogram),
                "indicators"
            );

            let alerts = view.alert_text(now);
            if !alerts.is_empty() {
                warn!(symbol = %view.symbol, alerts = %alerts, "active alerts");
            }
        }
        None => warn!("no instrument charted"),
    }

    let movers = monitor.movers().get().await;
    let gainers: Vec<String> = movers
        .gainers
        .iter()
        .map(|t| format!("{} {:+.2}%", t.symbol, t.price_change_pct))
        .collect();
    let losers: Vec<String> = movers
        .losers
        .iter()
        .map(|t| format!("{} {:+.2}%", t.symbol, t.price_change_pct))
        .collect();
    info!(
        gainers = %gainers.join(", "),
        losers = %losers.join(", "),
        refreshed_at = %movers.refreshed_at_ms.map(fmt_ts).unwrap_or_else(|| "never".into()),
        last_error = movers.last_error.as_deref().unwrap_or("-"),
        "movers"
    );

    let watchlist: Vec<String> = monitor
        .watchlist()
        .entries()
        .iter()
        .map(|e| match e.last_price {
            Some(price) => format!("{} {price}", e.symbol),
            None => format!("{} --", e.symbol),
        })
        .collect();
    info!(
        prices = %watchlist.join(", "),
        link = ?monitor.watchlist_feed().status().state,
        "watchlist"
    );
}

pub fn log_scan(report: &ProximityReport) {
    for row in &report.rows {
        info!(
            rank = row.rank,
            symbol = %row.symbol,
            proximity_pct = %format!("{:+.2}", row.proximity_pct),
            hours_since_touch = row.hours_since_touch,
            move_since_touch_pct = %format!("{:+.2}", row.move_since_touch_pct),
            "proximity"
        );
    }
    for failure in &report.failures {
        warn!(symbol = %failure.symbol, error = %failure.error, "proximity unavailable");
    }
}
