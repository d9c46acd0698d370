use super::types::{Alert, Bias, DashboardSnapshot, ScanReport, SignalResult};

/// Alerts shown per page in the alerts tab.
pub const ALERT_CARDS_SHOWN: usize = 30;

/// Snapshot protocol version this client understands.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Client-side copy of the server session plus view-only alert filters.
#[derive(Clone, Debug, Default)]
pub struct DashboardStore {
    snapshot: Option<DashboardSnapshot>,
    updates: u64,
}

impl DashboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the local copy. Snapshots from an unknown protocol version are ignored.
    pub fn apply(&mut self, snapshot: DashboardSnapshot, expected_version: u32) -> bool {
        if snapshot.version != expected_version {
            log::warn!(
                "ignoring snapshot version {} (expected {expected_version})",
                snapshot.version
            );
            return false;
        }
        self.snapshot = Some(snapshot);
        self.updates = self.updates.saturating_add(1);
        true
    }

    pub fn snapshot(&self) -> Option<&DashboardSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn report(&self) -> Option<&ScanReport> {
        self.snapshot.as_ref().and_then(|snapshot| snapshot.report.as_ref())
    }

    pub fn results(&self) -> Vec<SignalResult> {
        self.report()
            .map(|report| report.results.clone())
            .unwrap_or_default()
    }

    pub fn top(&self) -> Option<&SignalResult> {
        self.report().and_then(|report| report.results.first())
    }

    pub fn scanning(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|snapshot| snapshot.scanning)
    }

    pub fn alert_count(&self) -> usize {
        self.snapshot
            .as_ref()
            .map_or(0, |snapshot| snapshot.alerts.len())
    }

    /// View filter over stored alerts; capture is unaffected.
    pub fn visible_alerts(&self, biases: &[Bias], min_score: u32) -> Vec<Alert> {
        self.snapshot
            .as_ref()
            .map(|snapshot| {
                snapshot
                    .alerts
                    .iter()
                    .filter(|alert| biases.contains(&alert.bias) && alert.score >= min_score)
                    .take(ALERT_CARDS_SHOWN)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::types::{Interval, ScanSettings, Session, SignalMode, TimeFilter};

    fn settings() -> ScanSettings {
        ScanSettings {
            watchlist: vec!["AAPL".into()],
            interval: Interval::OneMinute,
            mode: SignalMode::CleanerSignals,
            time_filter: TimeFilter {
                opening: true,
                midday: false,
                power: true,
            },
            cooldown_minutes: 7,
            alert_threshold: None,
            capture_alerts: true,
            max_alerts_kept: 60,
            min_seconds_between_calls: 1.0,
            auto_refresh: false,
            refresh_seconds: 30,
        }
    }

    fn alert(id: u64, symbol: &str, bias: Bias, score: u32) -> Alert {
        Alert {
            id,
            captured_at_ms: 0,
            time: "2024-06-03 14:00:00 UTC".into(),
            symbol: symbol.into(),
            bias,
            score,
            session: Session::Opening,
            last: Some(1.0),
            entry: Some(1.0),
            stop: Some(0.9),
            t1: Some(1.1),
            t2: Some(1.2),
            why: "setup".into(),
            as_of: None,
            mode: SignalMode::CleanerSignals,
            interval: Interval::OneMinute,
        }
    }

    fn snapshot(version: u32, alerts: Vec<Alert>) -> DashboardSnapshot {
        DashboardSnapshot {
            version,
            feed: "demo".into(),
            now: String::new(),
            settings: settings(),
            effective_threshold: 80,
            scanning: false,
            report: None,
            alerts,
        }
    }

    #[test]
    fn rejects_unknown_versions() {
        let mut store = DashboardStore::new();
        assert!(!store.apply(snapshot(2, Vec::new()), 1));
        assert!(store.snapshot().is_none());
        assert!(store.apply(snapshot(1, Vec::new()), 1));
        assert_eq!(store.updates(), 1);
    }

    #[test]
    fn alert_view_filters_without_dropping() {
        let mut store = DashboardStore::new();
        store.apply(
            snapshot(
                1,
                vec![
                    alert(3, "TSLA", Bias::Short, 92),
                    alert(2, "AAPL", Bias::Long, 75),
                    alert(1, "NVDA", Bias::Long, 88),
                ],
            ),
            1,
        );

        let longs = store.visible_alerts(&[Bias::Long], 80);
        assert_eq!(longs.len(), 1);
        assert_eq!(longs[0].symbol, "NVDA");
        assert_eq!(store.visible_alerts(&[Bias::Long, Bias::Short], 0).len(), 3);
        assert_eq!(store.alert_count(), 3);
    }

    #[test]
    fn visible_alerts_are_capped() {
        let mut store = DashboardStore::new();
        let alerts = (0..45).map(|id| alert(id, "SPY", Bias::Long, 90)).collect();
        store.apply(snapshot(1, alerts), 1);
        assert_eq!(
            store.visible_alerts(&[Bias::Long], 0).len(),
            ALERT_CARDS_SHOWN
        );
    }
}
