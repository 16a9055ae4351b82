//! Watchlist proximity scan.
//!
//! For every watchlist instrument: fetch the analysis window, compute its
//! distance from the long EMA and the last touch, then rank the results.
//! Instruments whose data could not be obtained are reported separately so a
//! failed fetch is never mistaken for "no touch".

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::binance::MarketDataApi;
use crate::config::AnalysisConfig;
use crate::error::MarketError;
use crate::indicators::proximity::{
    ProximityMetrics, ProximityRow, proximity_metrics, rank_by_proximity,
};
use crate::series::BarSeries;
use crate::types::Symbol;

#[derive(Debug)]
pub struct ScanFailure {
    pub symbol: Symbol,
    pub error: MarketError,
}

#[derive(Debug, Default)]
pub struct ProximityReport {
    /// Ranked, closest to the EMA first.
    pub rows: Vec<ProximityRow>,
    pub failures: Vec<ScanFailure>,
}

pub struct ProximityScanner {
    api: Arc<dyn MarketDataApi>,
    cfg: AnalysisConfig,
}

impl ProximityScanner {
    pub fn new(api: Arc<dyn MarketDataApi>, cfg: AnalysisConfig) -> Self {
        Self { api, cfg }
    }

    /// Fetches all instruments concurrently; one failure never affects the
    /// others.
    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    pub async fn scan(&self, symbols: &[Symbol]) -> ProximityReport {
        let results = join_all(symbols.iter().map(|s| self.analyse(s))).await;

        let mut metrics = Vec::with_capacity(results.len());
        let mut failures = Vec::new();

        for (symbol, result) in symbols.iter().zip(results) {
            match result {
                Ok(m) => metrics.push(m),
                Err(error) => {
                    warn!(symbol = %symbol, error = %error, "proximity scan failed");
                    failures.push(ScanFailure {
                        symbol: symbol.clone(),
                        error,
                    });
                }
            }
        }

        let rows = rank_by_proximity(metrics);
        info!(ranked = rows.len(), failed = failures.len(), "proximity scan complete");

        ProximityReport { rows, failures }
    }

    async fn analyse(&self, symbol: &Symbol) -> Result<ProximityMetrics, MarketError> {
        let bars = self
            .api
            .fetch_klines(symbol, &self.cfg.interval, self.cfg.bars)
            .await?;

        // Ordered and deduplicated by timestamp before the touch scan.
        let mut series = BarSeries::new(bars.len());
        if let Some((_, err)) = series.seed(bars).into_iter().next() {
            return Err(err.into());
        }

        proximity_metrics(
            symbol.clone(),
            &series.snapshot(),
            self.cfg.ema_span,
            self.cfg.touch_threshold_pct,
        )
    }
}
