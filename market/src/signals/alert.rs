use std::fmt;

use serde::Serialize;

use crate::types::Symbol;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum AlertKind {
    PriceMove,
    VolumeSpike,
}

/// Immutable alert with a fixed lifetime.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub symbol: Symbol,
    /// Percent change for price moves, volume ratio for spikes.
    pub magnitude: f64,
    pub generated_at_ms: u64,
    pub expires_at_ms: u64,
}

impl Alert {
    pub fn is_active(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AlertKind::PriceMove => write!(f, "Price Alert: {:+.2}%", self.magnitude),
            AlertKind::VolumeSpike => write!(f, "Volume Spike: {:.1}x avg", self.magnitude),
        }
    }
}

/// Set of currently displayed alerts. Each alert expires on its own clock;
/// a newer alert never replaces an older one of a different kind.
#[derive(Clone, Debug, Default)]
pub struct AlertBoard {
    alerts: Vec<Alert>,
}

impl AlertBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, alerts: impl IntoIterator<Item = Alert>) {
        self.alerts.extend(alerts);
    }

    /// Drop expired alerts; returns how many were removed.
    pub fn prune(&mut self, now_ms: u64) -> usize {
        let before = self.alerts.len();
        self.alerts.retain(|a| a.is_active(now_ms));
        before - self.alerts.len()
    }

    pub fn active(&self, now_ms: u64) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|a| a.is_active(now_ms))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

/// Combined display line for a set of alerts; empty when none are active.
pub fn display_text(alerts: &[Alert], now_ms: u64) -> String {
    alerts
        .iter()
        .filter(|a| a.is_active(now_ms))
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(kind: AlertKind, magnitude: f64, at: u64, ttl: u64) -> Alert {
        Alert {
            kind,
            symbol: Symbol::new("BTCUSDT"),
            magnitude,
            generated_at_ms: at,
            expires_at_ms: at + ttl,
        }
    }

    #[test]
    fn messages_match_display_format() {
        assert_eq!(
            alert(AlertKind::PriceMove, 3.1234, 0, 1).to_string(),
            "Price Alert: +3.12%"
        );
        assert_eq!(
            alert(AlertKind::PriceMove, -4.0, 0, 1).to_string(),
            "Price Alert: -4.00%"
        );
        assert_eq!(
            alert(AlertKind::VolumeSpike, 2.44, 0, 1).to_string(),
            "Volume Spike: 2.4x avg"
        );
    }

    #[test]
    fn alerts_expire_independently() {
        let mut board = AlertBoard::new();
        board.extend([alert(AlertKind::PriceMove, 3.0, 1_000, 7_000)]);
        board.extend([alert(AlertKind::VolumeSpike, 2.5, 4_000, 7_000)]);

        assert_eq!(board.active(7_999).len(), 2);

        let at = 8_000 + 1;
        let active = board.active(at);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, AlertKind::VolumeSpike);

        assert_eq!(board.prune(11_001), 2);
        assert!(board.is_empty());
    }

    #[test]
    fn display_text_joins_and_clears() {
        let alerts = vec![
            alert(AlertKind::PriceMove, 3.5, 0, 7_000),
            alert(AlertKind::VolumeSpike, 2.1, 0, 7_000),
        ];
        assert_eq!(
            display_text(&alerts, 10),
            "Price Alert: +3.50% | Volume Spike: 2.1x avg"
        );
        assert_eq!(display_text(&alerts, 7_001), "");
    }
}
