mod support;

use std::time::Duration;

use market::config::MonitorConfig;
use market::context::WatchContext;
use market::error::MarketError;
use market::monitor::ChartController;
use market::stream::{ConnectionState, StreamError};
use market::{Bar, Symbol};

use support::{MockLive, MockRest, bar, flat_bars, update, wait_until};

fn config() -> MonitorConfig {
    let mut cfg = MonitorConfig::default();
    cfg.series.capacity = 20;
    cfg.signals.volume_lookback = 19;
    cfg
}

fn timestamps(bars: &[Bar]) -> Vec<u64> {
    bars.iter().map(|b| b.ts_ms).collect()
}

#[tokio::test(start_paused = true)]
async fn seeds_history_then_applies_stream_updates() {
    let rest = MockRest::new();
    let live = MockLive::new();
    rest.set_klines("BTCUSDT", flat_bars(30, 100.0));

    let ctx = WatchContext::start(Symbol::new("btcusdt"), &config(), rest.clone(), live.clone())
        .await
        .unwrap();

    // Seed is fetched at the series capacity, before any stream exists.
    assert_eq!(rest.kline_calls()[0].2, 20);
    let seeded = ctx.view();
    assert_eq!(seeded.bars.len(), 20);
    assert_eq!(seeded.bars[0].ts_ms, 10 * 60_000);

    live.wait_for_connects(1).await;
    let link = live.kline_links("BTCUSDT")[0].clone();

    let mut views = ctx.subscribe();
    link.unbounded_send(Ok(update("BTCUSDT", bar(30 * 60_000, 101.0, 10.0), false)))
        .unwrap();
    wait_until(&mut views, |v| v.bars.len() == 20 && v.latest().unwrap().close == 101.0).await;

    // In-progress ticks replace the open bar in place.
    link.unbounded_send(Ok(update("BTCUSDT", bar(30 * 60_000, 102.0, 12.0), false)))
        .unwrap();
    wait_until(&mut views, |v| v.latest().unwrap().close == 102.0).await;

    let view = ctx.view();
    assert_eq!(view.bars.iter().filter(|b| b.ts_ms == 30 * 60_000).count(), 1);
    assert_eq!(view.bars[0].ts_ms, 11 * 60_000);
    assert_eq!(ctx.link_status().state, ConnectionState::Streaming);

    ctx.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn closed_bar_with_large_move_raises_alert() {
    let rest = MockRest::new();
    let live = MockLive::new();
    rest.set_klines("ETHUSDT", flat_bars(20, 100.0));

    let ctx = WatchContext::start(Symbol::new("ETHUSDT"), &config(), rest, live.clone())
        .await
        .unwrap();
    live.wait_for_connects(1).await;

    let mut views = ctx.subscribe();
    live.kline_links("ETHUSDT")[0]
        .unbounded_send(Ok(update("ETHUSDT", bar(20 * 60_000, 96.0, 10.0), true)))
        .unwrap();
    wait_until(&mut views, |v| !v.alerts.is_empty()).await;

    let view = ctx.view();
    let generated = view.alerts[0].generated_at_ms;
    assert_eq!(view.alert_text(generated), "Price Alert: -4.00%");
    assert_eq!(view.alert_text(generated + 7_000), "");

    ctx.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn malformed_bar_is_rejected_without_touching_series() {
    let rest = MockRest::new();
    let live = MockLive::new();
    rest.set_klines("BTCUSDT", flat_bars(20, 100.0));

    let ctx = WatchContext::start(Symbol::new("BTCUSDT"), &config(), rest, live.clone())
        .await
        .unwrap();
    live.wait_for_connects(1).await;
    let link = live.kline_links("BTCUSDT")[0].clone();
    let before = ctx.view().bars.clone();

    let mut broken = bar(20 * 60_000, 100.0, 10.0);
    broken.high = 90.0;
    link.unbounded_send(Ok(update("BTCUSDT", broken, true))).unwrap();
    link.unbounded_send(Ok(update("BTCUSDT", bar(20 * 60_000, 100.5, 10.0), false)))
        .unwrap();

    let mut views = ctx.subscribe();
    wait_until(&mut views, |v| v.bars.len() == 20 && v.latest().unwrap().close == 100.5).await;

    let view = ctx.view();
    assert_eq!(view.rejected_updates, 1);
    assert_eq!(&view.bars[..19], &before[1..]);

    ctx.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reconnect_backfills_gap_without_duplicates() {
    let rest = MockRest::new();
    let live = MockLive::new();
    rest.set_klines("BTCUSDT", flat_bars(20, 100.0));

    let ctx = WatchContext::start(Symbol::new("BTCUSDT"), &config(), rest.clone(), live.clone())
        .await
        .unwrap();
    live.wait_for_connects(1).await;

    let first = live.kline_links("BTCUSDT")[0].clone();
    let mut views = ctx.subscribe();
    first
        .unbounded_send(Ok(update("BTCUSDT", bar(20 * 60_000, 105.0, 10.0), false)))
        .unwrap();
    wait_until(&mut views, |v| v.latest().unwrap().ts_ms == 20 * 60_000).await;

    // While disconnected the exchange closed two more bars. Its copy of the
    // bar the stream was updating must not overwrite the streamed value.
    let mut history = flat_bars(20, 100.0);
    history.push(bar(20 * 60_000, 104.0, 10.0));
    history.push(bar(21 * 60_000, 106.0, 10.0));
    history.push(bar(22 * 60_000, 107.0, 10.0));
    rest.set_klines("BTCUSDT", history);

    first
        .unbounded_send(Err(StreamError::Closed("server restart".into())))
        .unwrap();

    live.wait_for_connects(2).await;
    wait_until(&mut views, |v| v.latest().unwrap().ts_ms == 22 * 60_000).await;

    let view = ctx.view();
    let ts = timestamps(&view.bars);
    assert!(ts.windows(2).all(|w| w[0] < w[1]), "timestamps not strictly increasing: {ts:?}");
    assert_eq!(view.bars.len(), 20);
    assert_eq!(ctx.link_status().connects, 2);

    let live_bar = view.bars.iter().find(|b| b.ts_ms == 20 * 60_000).unwrap();
    assert_eq!(live_bar.close, 105.0);

    // Backfill asked for the configured gap window, not a full reseed.
    let calls = rest.kline_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].2, config().stream.backfill_bars);

    // Stream keeps flowing on the new connection.
    live.kline_links("BTCUSDT")[1]
        .unbounded_send(Ok(update("BTCUSDT", bar(23 * 60_000, 108.0, 10.0), false)))
        .unwrap();
    wait_until(&mut views, |v| v.latest().unwrap().ts_ms == 23 * 60_000).await;

    ctx.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn seed_failure_is_reported_and_nothing_streams() {
    let rest = MockRest::new();
    let live = MockLive::new();
    rest.fail("BTCUSDT");

    let chart = ChartController::new(config(), rest, live.clone());
    let err = chart.select(Symbol::new("BTCUSDT")).await.unwrap_err();

    assert!(matches!(err, MarketError::TransientFetch(_)));
    assert!(chart.view().is_none());
    assert!(chart.active_symbol().await.is_none());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(live.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn switching_instrument_tears_down_previous_stream() {
    let rest = MockRest::new();
    let live = MockLive::new();
    rest.set_klines("BTCUSDT", flat_bars(20, 100.0));
    rest.set_klines("ETHUSDT", flat_bars(20, 2000.0));

    let chart = ChartController::new(config(), rest, live.clone());

    chart.select(Symbol::new("BTCUSDT")).await.unwrap();
    live.wait_for_connects(1).await;
    let btc = live.kline_links("BTCUSDT")[0].clone();
    assert!(!btc.is_closed());

    let view = chart.select(Symbol::new("ETHUSDT")).await.unwrap();
    assert_eq!(view.symbol, Symbol::new("ETHUSDT"));

    // The old connection is released before select returns.
    assert!(btc.is_closed());
    assert!(btc
        .unbounded_send(Ok(update("BTCUSDT", bar(20 * 60_000, 1.0, 1.0), true)))
        .is_err());

    live.wait_for_connects(2).await;
    let eth = live.kline_links("ETHUSDT")[0].clone();
    let mut views = chart.subscribe().unwrap();
    eth.unbounded_send(Ok(update("ETHUSDT", bar(20 * 60_000, 2010.0, 10.0), false)))
        .unwrap();
    wait_until(&mut views, |v| v.latest().unwrap().close == 2010.0).await;

    let current = chart.view().unwrap();
    assert_eq!(current.symbol, Symbol::new("ETHUSDT"));
    assert!(current.bars.iter().all(|b| b.close >= 2000.0));

    // Re-selecting the active instrument keeps the running context.
    chart.select(Symbol::new("ETHUSDT")).await.unwrap();
    assert!(!eth.is_closed());

    chart.stop().await;
    assert!(eth.is_closed());
    assert!(chart.view().is_none());
}

#[tokio::test(start_paused = true)]
async fn manual_refresh_goes_through_the_writer() {
    let rest = MockRest::new();
    let live = MockLive::new();
    rest.set_klines("BTCUSDT", flat_bars(20, 100.0));

    let chart = ChartController::new(config(), rest.clone(), live.clone());
    assert_eq!(chart.refresh().await.unwrap(), None);

    chart.select(Symbol::new("BTCUSDT")).await.unwrap();
    let mut views = chart.subscribe().unwrap();

    let mut history = flat_bars(20, 100.0);
    history.push(bar(20 * 60_000, 103.0, 10.0));
    rest.set_klines("BTCUSDT", history);

    assert_eq!(chart.refresh().await.unwrap(), Some(20));
    wait_until(&mut views, |v| v.latest().unwrap().close == 103.0).await;
    assert_eq!(chart.view().unwrap().bars.len(), 20);

    chart.stop().await;
}
