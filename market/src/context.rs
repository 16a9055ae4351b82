//! WatchContext
//!
//! Live state for one monitored instrument.
//! Responsibilities:
//!   • Seed the bar series from a historical fetch before streaming starts
//!   • Run the kline stream adapter for the instrument
//!   • Apply stream updates and history merges through a single writer task
//!   • Recompute indicators and evaluate signals after every change
//!   • Publish an immutable `WatchView` for rendering
//!   • Re-fetch recent history after every reconnect to close the gap
//!
//! The writer task is the only owner of the series; everything else talks to
//! it through a bounded command queue, so stream updates and manual refreshes
//! are applied strictly one after another.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};

use common::logger::task_span;

use crate::binance::{LiveStreamApi, MarketDataApi};
use crate::config::MonitorConfig;
use crate::error::MarketError;
use crate::indicators::{IndicatorEngine, IndicatorReading, IndicatorState};
use crate::series::{BarSeries, SeriesSnapshot};
use crate::signals::{Alert, AlertBoard, SignalDetector, display_text};
use crate::stream::{AdapterHandle, Backoff, KlineSource, LinkStatus, spawn_adapter};
use crate::time::now_ms;
use crate::types::{Bar, BarUpdate, Interval, Symbol};

/// Mutation requests handled by the writer task.
#[derive(Clone, Debug)]
pub enum SeriesCommand {
    /// Live tick from the stream.
    Update(BarUpdate),
    /// Historical bars from a refresh or gap backfill.
    History(Vec<Bar>),
}

impl From<BarUpdate> for SeriesCommand {
    fn from(update: BarUpdate) -> Self {
        SeriesCommand::Update(update)
    }
}

/// Everything rendering needs for one instrument, immutable once published.
#[derive(Clone, Debug)]
pub struct WatchView {
    pub symbol: Symbol,
    pub interval: Interval,
    pub bars: SeriesSnapshot,
    pub indicators: Arc<IndicatorState>,
    /// Alerts alive when the view was built; filter with `active_alerts`.
    pub alerts: Vec<Alert>,
    pub updated_at_ms: u64,
    /// Updates refused by validation since the context started.
    pub rejected_updates: u64,
}

impl WatchView {
    pub fn latest(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn reading(&self) -> IndicatorReading {
        self.indicators.latest()
    }

    pub fn active_alerts(&self, now_ms: u64) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|a| a.is_active(now_ms))
            .cloned()
            .collect()
    }

    pub fn alert_text(&self, now_ms: u64) -> String {
        display_text(&self.alerts, now_ms)
    }
}

/// Series, indicators and alerts of one instrument. Owned by the writer task.
pub struct WriterState {
    symbol: Symbol,
    interval: Interval,
    series: BarSeries,
    engine: IndicatorEngine,
    detector: SignalDetector,
    board: AlertBoard,
    rejected: u64,
    /// Newest timestamp the stream has delivered as closed.
    closed_through: Option<u64>,
}

impl WriterState {
    pub fn new(symbol: Symbol, cfg: &MonitorConfig) -> Self {
        Self {
            symbol,
            interval: cfg.series.interval.clone(),
            series: BarSeries::new(cfg.series.capacity),
            engine: IndicatorEngine::new(cfg.indicators.clone()),
            detector: SignalDetector::new(cfg.signals.clone()),
            board: AlertBoard::new(),
            rejected: 0,
            closed_through: None,
        }
    }

    /// Replace the series with `bars`; returns how many were refused.
    pub fn seed(&mut self, bars: Vec<Bar>) -> usize {
        let rejected = self.series.seed(bars);
        for (ts_ms, err) in &rejected {
            warn!(symbol = %self.symbol, ts_ms, error = %err, "seed bar rejected");
        }
        self.rejected += rejected.len() as u64;
        rejected.len()
    }

    /// Apply one command. Returns the new view when the series changed.
    pub fn apply(&mut self, cmd: SeriesCommand, now_ms: u64) -> Option<WatchView> {
        match cmd {
            SeriesCommand::Update(update) => self.apply_update(update, now_ms),
            SeriesCommand::History(bars) => self.apply_history(bars, now_ms),
        }
    }

    fn apply_update(&mut self, update: BarUpdate, now_ms: u64) -> Option<WatchView> {
        if update.symbol != self.symbol {
            warn!(
                expected = %self.symbol,
                got = %update.symbol,
                "update for another instrument dropped"
            );
            return None;
        }

        let outcome = match self.series.upsert(update.bar) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.rejected += 1;
                warn!(
                    symbol = %self.symbol,
                    ts_ms = update.bar.ts_ms,
                    error = %err,
                    "bar update rejected"
                );
                return None;
            }
        };

        if !outcome.changed() {
            debug!(ts_ms = update.bar.ts_ms, "update older than the window skipped");
            return None;
        }
        if update.is_final {
            self.closed_through = self.closed_through.max(Some(update.bar.ts_ms));
        }

        let bars = self.series.snapshot();

        let is_newest = bars.last().map(|b| b.ts_ms) == Some(update.bar.ts_ms);
        if update.is_final && is_newest {
            let fired = self.detector.evaluate(&self.symbol, &bars, now_ms);
            for alert in &fired {
                info!(symbol = %self.symbol, alert = %alert, "signal fired");
            }
            self.board.extend(fired);
        }

        Some(self.render(bars, now_ms))
    }

    fn apply_history(&mut self, bars: Vec<Bar>, now_ms: u64) -> Option<WatchView> {
        let report = self.series.merge_history(bars, self.closed_through);
        for (ts_ms, err) in &report.rejected {
            warn!(symbol = %self.symbol, ts_ms, error = %err, "history bar rejected");
        }
        self.rejected += report.rejected.len() as u64;

        info!(
            symbol = %self.symbol,
            inserted = report.inserted,
            replaced = report.replaced,
            kept_live = report.kept_live,
            "history merged"
        );

        report
            .changed()
            .then(|| self.render(self.series.snapshot(), now_ms))
    }

    pub fn view(&mut self, now_ms: u64) -> WatchView {
        self.render(self.series.snapshot(), now_ms)
    }

    fn render(&mut self, bars: SeriesSnapshot, now_ms: u64) -> WatchView {
        self.board.prune(now_ms);

        WatchView {
            symbol: self.symbol.clone(),
            interval: self.interval.clone(),
            indicators: Arc::new(self.engine.compute(&bars)),
            bars,
            alerts: self.board.active(now_ms),
            updated_at_ms: now_ms,
            rejected_updates: self.rejected,
        }
    }
}

async fn run_writer(
    mut state: WriterState,
    mut commands: mpsc::Receiver<SeriesCommand>,
    views: watch::Sender<Arc<WatchView>>,
) {
    while let Some(cmd) = commands.recv().await {
        if let Some(view) = state.apply(cmd, now_ms()) {
            views.send_replace(Arc::new(view));
        }
    }
    debug!("command queue closed; writer stopped");
}

/// Fetch recent history whenever the adapter has connected again.
async fn backfill_on_reconnect(
    mut status: watch::Receiver<LinkStatus>,
    rest: Arc<dyn MarketDataApi>,
    symbol: Symbol,
    interval: Interval,
    bars: usize,
    commands: mpsc::Sender<SeriesCommand>,
) {
    // The first connect follows the seed fetch.
    let mut seen = 1;

    while status.changed().await.is_ok() {
        let connects = status.borrow_and_update().connects;
        if connects <= seen {
            continue;
        }
        seen = connects;

        match rest.fetch_klines(&symbol, &interval, bars).await {
            Ok(history) => {
                debug!(bars = history.len(), connects, "gap backfill fetched");
                if commands.send(SeriesCommand::History(history)).await.is_err() {
                    return;
                }
            }
            Err(err) => warn!(error = %err, connects, "gap backfill failed"),
        }
    }
}

/// Running state of one instrument: writer, stream and backfill tasks.
pub struct WatchContext {
    symbol: Symbol,
    interval: Interval,
    history_bars: usize,
    rest: Arc<dyn MarketDataApi>,
    commands: mpsc::Sender<SeriesCommand>,
    views: watch::Receiver<Arc<WatchView>>,
    stream: AdapterHandle,
    backfill: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WatchContext {
    /// Seed the series and start streaming. Fails when the seed fetch
    /// fails; nothing is left running in that case.
    pub async fn start(
        symbol: Symbol,
        cfg: &MonitorConfig,
        rest: Arc<dyn MarketDataApi>,
        live: Arc<dyn LiveStreamApi>,
    ) -> Result<Self, MarketError> {
        let interval = cfg.series.interval.clone();
        let history_bars = cfg.series.capacity;

        let seed = rest.fetch_klines(&symbol, &interval, history_bars).await?;
        let mut state = WriterState::new(symbol.clone(), cfg);
        let rejected = state.seed(seed);

        let initial = state.view(now_ms());
        info!(
            symbol = %symbol,
            interval = %interval,
            bars = initial.bars.len(),
            rejected,
            "series seeded"
        );

        let (view_tx, views) = watch::channel(Arc::new(initial));
        let (commands, command_rx) = mpsc::channel(cfg.stream.queue_capacity.max(1));

        let writer = tokio::spawn(
            run_writer(state, command_rx, view_tx).instrument(task_span("writer", symbol.as_str())),
        );

        let stream = spawn_adapter(
            KlineSource::new(live, symbol.clone(), interval.clone()),
            Backoff::new(cfg.stream.backoff_base, cfg.stream.backoff_max),
            commands.clone(),
            task_span("kline_stream", symbol.as_str()),
        );

        let backfill = tokio::spawn(
            backfill_on_reconnect(
                stream.subscribe(),
                rest.clone(),
                symbol.clone(),
                interval.clone(),
                cfg.stream.backfill_bars,
                commands.clone(),
            )
            .instrument(task_span("gap_backfill", symbol.as_str())),
        );

        Ok(Self {
            symbol,
            interval,
            history_bars,
            rest,
            commands,
            views,
            stream,
            backfill,
            writer,
        })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    pub fn view(&self) -> Arc<WatchView> {
        self.views.borrow().clone()
    }

    /// Receiver notified on every published view.
    pub fn subscribe(&self) -> watch::Receiver<Arc<WatchView>> {
        self.views.clone()
    }

    pub fn link_status(&self) -> LinkStatus {
        self.stream.status()
    }

    /// Re-fetch a full window of history and merge it through the writer.
    /// Returns the number of bars fetched. On failure the series is left
    /// as it was.
    pub async fn refresh(&self) -> Result<usize, MarketError> {
        let bars = self
            .rest
            .fetch_klines(&self.symbol, &self.interval, self.history_bars)
            .await?;
        let fetched = bars.len();

        if self.commands.send(SeriesCommand::History(bars)).await.is_err() {
            warn!(symbol = %self.symbol, "writer gone; refresh dropped");
        }
        Ok(fetched)
    }

    /// Cancel the stream and backfill tasks, drain the writer and wait for
    /// all of them. No update is applied once this returns.
    pub async fn shutdown(self) {
        let Self {
            symbol,
            commands,
            stream,
            backfill,
            writer,
            ..
        } = self;

        stream.stop().await;
        backfill.abort();
        let _ = backfill.await;

        drop(commands);
        let _ = writer.await;

        info!(symbol = %symbol, "watch context stopped");
    }
}
