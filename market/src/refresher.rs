//! Snapshot refresher
//!
//! Periodically fetches 24h tickers, ranks the top movers and publishes the
//! result into a `MoversStore`.
//!
//! Data flow:
//! Exchange → Refresher → rank_movers → MoversStore
//!
//! A failed fetch never clears the published set: the previous movers stay
//! visible and the error is recorded next to them until the next success.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{Instrument, info, warn};

use common::logger::task_span;

use crate::binance::MarketDataApi;
use crate::config::RefresherConfig;
use crate::error::MarketError;
use crate::time::now_ms;
use crate::types::Ticker;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Movers {
    /// Highest 24h change first.
    pub gainers: Vec<Ticker>,
    /// Lowest 24h change first.
    pub losers: Vec<Ticker>,
    /// Time of the last successful refresh; `None` before the first one.
    pub refreshed_at_ms: Option<u64>,
    /// Error of the most recent attempt, cleared by the next success.
    pub last_error: Option<String>,
}

/// Latest movers, shared between the refresher task and readers.
#[derive(Clone, Default)]
pub struct MoversStore {
    inner: Arc<RwLock<Movers>>,
}

impl MoversStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Movers {
        self.inner.read().await.clone()
    }

    async fn publish(&self, gainers: Vec<Ticker>, losers: Vec<Ticker>, at_ms: u64) {
        let mut g = self.inner.write().await;
        *g = Movers {
            gainers,
            losers,
            refreshed_at_ms: Some(at_ms),
            last_error: None,
        };
    }

    async fn record_error(&self, error: String) {
        self.inner.write().await.last_error = Some(error);
    }
}

fn by_change_desc(a: &Ticker, b: &Ticker) -> Ordering {
    b.price_change_pct
        .total_cmp(&a.price_change_pct)
        .then_with(|| a.symbol.cmp(&b.symbol))
}

fn by_change_asc(a: &Ticker, b: &Ticker) -> Ordering {
    a.price_change_pct
        .total_cmp(&b.price_change_pct)
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Top `top_n` gainers and losers among tickers quoted in `quote_suffix`.
/// Ties are broken by symbol so the ranking is deterministic. Tickers with a
/// non-finite change are left out.
pub fn rank_movers(tickers: &[Ticker], quote_suffix: &str, top_n: usize) -> (Vec<Ticker>, Vec<Ticker>) {
    let mut eligible: Vec<Ticker> = tickers
        .iter()
        .filter(|t| t.symbol.has_suffix(quote_suffix) && t.price_change_pct.is_finite())
        .cloned()
        .collect();

    eligible.sort_by(by_change_desc);
    let gainers: Vec<Ticker> = eligible.iter().take(top_n).cloned().collect();

    eligible.sort_by(by_change_asc);
    eligible.truncate(top_n);

    (gainers, eligible)
}

/// One refresh cycle. On failure the store keeps its previous movers.
pub async fn refresh_once(
    api: &dyn MarketDataApi,
    cfg: &RefresherConfig,
    store: &MoversStore,
) -> Result<(), MarketError> {
    match api.fetch_tickers().await {
        Ok(tickers) => {
            let (gainers, losers) = rank_movers(&tickers, &cfg.quote_suffix, cfg.top_n);
            info!(
                tickers = tickers.len(),
                top_gainer = gainers.first().map(|t| t.symbol.as_str()).unwrap_or("-"),
                top_loser = losers.first().map(|t| t.symbol.as_str()).unwrap_or("-"),
                "movers refreshed"
            );
            store.publish(gainers, losers, now_ms()).await;
            Ok(())
        }
        Err(err) => {
            warn!(error = %err, "movers refresh failed; keeping previous set");
            store.record_error(err.to_string()).await;
            Err(err.into())
        }
    }
}

/// Handle of a running refresher task.
pub struct RefresherHandle {
    task: JoinHandle<()>,
}

impl RefresherHandle {
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

pub struct SnapshotRefresher;

impl SnapshotRefresher {
    /// Refresh immediately, then every `cfg.period`. Late ticks are skipped,
    /// never bunched.
    pub fn spawn(
        api: Arc<dyn MarketDataApi>,
        cfg: RefresherConfig,
        store: MoversStore,
    ) -> RefresherHandle {
        let period = cfg.period.max(Duration::from_millis(1));
        let span = task_span("movers_refresher", &cfg.quote_suffix);

        let task = tokio::spawn(
            async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                info!(
                    every_ms = period.as_millis() as u64,
                    suffix = %cfg.quote_suffix,
                    top_n = cfg.top_n,
                    "movers refresher started"
                );

                loop {
                    ticker.tick().await;
                    let _ = refresh_once(api.as_ref(), &cfg, &store).await;
                }
            }
            .instrument(span),
        );

        RefresherHandle { task }
    }
}
