use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use crate::binance::{LiveStreamApi, MarketDataApi};
use crate::config::MonitorConfig;
use crate::context::{WatchContext, WatchView};
use crate::error::MarketError;
use crate::stream::LinkStatus;
use crate::types::Symbol;

/// Owns the single active [`WatchContext`] of the chart.
///
/// Switching instruments is serialized: the previous context is shut down
/// completely (stream cancelled, writer drained) before the next one is
/// seeded, so two contexts never run at once.
pub struct ChartController {
    cfg: MonitorConfig,
    rest: Arc<dyn MarketDataApi>,
    live: Arc<dyn LiveStreamApi>,
    active: Mutex<Option<WatchContext>>,
    /// Published view of the active context, readable without waiting for a
    /// switch in progress.
    current: RwLock<Option<watch::Receiver<Arc<WatchView>>>>,
}

impl ChartController {
    pub fn new(
        cfg: MonitorConfig,
        rest: Arc<dyn MarketDataApi>,
        live: Arc<dyn LiveStreamApi>,
    ) -> Self {
        Self {
            cfg,
            rest,
            live,
            active: Mutex::new(None),
            current: RwLock::new(None),
        }
    }

    /// Make `symbol` the charted instrument and return its first view.
    /// Selecting the active instrument again is a no-op. When seeding the
    /// new instrument fails nothing is charted.
    pub async fn select(&self, symbol: Symbol) -> Result<Arc<WatchView>, MarketError> {
        let mut active = self.active.lock().await;

        if let Some(ctx) = active.as_ref() {
            if ctx.symbol() == &symbol {
                debug!(symbol = %symbol, "instrument already selected");
                return Ok(ctx.view());
            }
        }

        if let Some(old) = active.take() {
            *self.current.write() = None;
            info!(from = %old.symbol(), to = %symbol, "switching instrument");
            old.shutdown().await;
        }

        let ctx = WatchContext::start(symbol, &self.cfg, self.rest.clone(), self.live.clone()).await?;
        let view = ctx.view();
        *self.current.write() = Some(ctx.subscribe());
        *active = Some(ctx);

        Ok(view)
    }

    /// Stop charting. Returns once the context's tasks have ended.
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        *self.current.write() = None;
        if let Some(ctx) = active.take() {
            ctx.shutdown().await;
        }
    }

    /// Re-fetch history for the active instrument. `None` when nothing is
    /// charted.
    pub async fn refresh(&self) -> Result<Option<usize>, MarketError> {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(ctx) => ctx.refresh().await.map(Some),
            None => Ok(None),
        }
    }

    pub fn view(&self) -> Option<Arc<WatchView>> {
        self.current.read().as_ref().map(|rx| rx.borrow().clone())
    }

    /// Receiver of the active context's views; `None` when nothing is charted.
    pub fn subscribe(&self) -> Option<watch::Receiver<Arc<WatchView>>> {
        self.current.read().clone()
    }

    pub async fn active_symbol(&self) -> Option<Symbol> {
        self.active.lock().await.as_ref().map(|c| c.symbol().clone())
    }

    pub async fn link_status(&self) -> Option<LinkStatus> {
        self.active.lock().await.as_ref().map(|c| c.link_status())
    }
}
