use clap::Parser;

use market::config::MonitorConfig;
use market::{Interval, Symbol};

#[derive(Debug, Parser)]
#[clap(name = "marketwatch", version)]
pub struct Cli {
    /// Instrument to chart
    #[clap(long, default_value = "BTCUSDT")]
    pub symbol: String,

    /// Bar interval of the chart (overrides MARKETWATCH_INTERVAL)
    #[clap(long)]
    pub interval: Option<Interval>,

    /// Number of bars kept in the chart window
    #[clap(long)]
    pub capacity: Option<usize>,

    /// Comma-separated watchlist (overrides MARKETWATCH_WATCHLIST)
    #[clap(long, value_delimiter = ',')]
    pub watchlist: Vec<String>,

    /// Seconds between status reports
    #[clap(long, default_value_t = 10)]
    pub report_every: u64,

    /// Run the watchlist proximity scan once at startup
    #[clap(long)]
    pub scan: bool,

    /// Emit JSON logs
    #[clap(long, env = "MARKETWATCH_JSON_LOGS")]
    pub json_logs: bool,
}

impl Cli {
    pub fn symbol(&self) -> Symbol {
        Symbol::new(&self.symbol)
    }

    /// Command-line flags win over environment configuration.
    pub fn apply(&self, cfg: &mut MonitorConfig) {
        if let Some(interval) = &self.interval {
            cfg.series.interval = interval.clone();
        }
        if let Some(capacity) = self.capacity {
            cfg.series.capacity = capacity.max(2);
            cfg.signals.volume_lookback = cfg.series.capacity - 1;
        }

        let watchlist: Vec<Symbol> = self
            .watchlist
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(Symbol::new)
            .collect();
        if !watchlist.is_empty() {
            cfg.watchlist = watchlist;
        }
    }
}
