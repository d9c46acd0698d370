mod gateway;
pub mod metrics;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{broadcast, watch, Notify, RwLock};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::alerts::{Alert, AlertBook, CaptureContext};
use crate::constants::{
    API_KEY_ENV, DEMO_SEED, GATEWAY_PORT, METRICS_INTERVAL_SECS, SCHEDULER_TICK_MS,
    SNAPSHOT_CHANNEL_CAPACITY, SNAPSHOT_VERSION,
};
use crate::feed::{build_feed, FeedError, MarketDataFeed};
use crate::logging;
use crate::model::Bias;
use crate::scanner::{fetch_detail, scan_watchlist, ScanReport, SymbolDetail};
use crate::session::utc_label;
use crate::settings::{ScanSettings, SettingsError, SettingsUpdate};

use metrics::{MetricsEvent, MetricsTx};

pub use gateway::router;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub gateway_addr: SocketAddr,
    pub scheduler_tick: Duration,
    pub metrics_interval: Duration,
    pub api_key: Option<String>,
    pub demo: bool,
    pub demo_seed: u64,
    pub scan_on_start: bool,
    pub settings: ScanSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            gateway_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, GATEWAY_PORT)),
            scheduler_tick: Duration::from_millis(SCHEDULER_TICK_MS),
            metrics_interval: Duration::from_secs(METRICS_INTERVAL_SECS),
            api_key: std::env::var(API_KEY_ENV).ok(),
            demo: false,
            demo_seed: DEMO_SEED,
            scan_on_start: false,
            settings: ScanSettings::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ShutdownSignal {
    None,
    Graceful,
    Immediate,
}

/// Everything a dashboard needs to render, pushed after every state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub version: u32,
    pub feed: String,
    pub now: String,
    pub settings: ScanSettings,
    pub effective_threshold: u32,
    pub scanning: bool,
    pub report: Option<ScanReport>,
    pub alerts: Vec<Alert>,
}

/// The single in-memory session shared by every connected dashboard.
pub struct SessionState {
    pub settings: ScanSettings,
    pub report: Option<ScanReport>,
    pub alerts: AlertBook,
    pub scanning: bool,
    last_scan: Option<Instant>,
}

impl SessionState {
    pub fn new(settings: ScanSettings) -> Self {
        Self {
            alerts: AlertBook::new(settings.max_alerts_kept),
            settings,
            report: None,
            scanning: false,
            last_scan: None,
        }
    }

    fn auto_refresh_due(&self) -> bool {
        if !self.settings.auto_refresh || self.scanning {
            return false;
        }
        self.last_scan
            .map_or(true, |at| at.elapsed() >= self.settings.refresh_period())
    }

    fn snapshot(&self, feed: &str) -> DashboardSnapshot {
        DashboardSnapshot {
            version: SNAPSHOT_VERSION,
            feed: feed.to_string(),
            now: utc_label(Utc::now()),
            settings: self.settings.clone(),
            effective_threshold: self.settings.effective_threshold(),
            scanning: self.scanning,
            report: self.report.clone(),
            alerts: self.alerts.iter().cloned().collect(),
        }
    }
}

/// Cheap handle onto the session, the feed and the snapshot fan-out.
#[derive(Clone)]
pub struct ServiceState {
    session: Arc<RwLock<SessionState>>,
    feed: Arc<dyn MarketDataFeed>,
    snapshots: broadcast::Sender<DashboardSnapshot>,
    scan_requests: Arc<Notify>,
    metrics: MetricsTx,
}

impl ServiceState {
    pub fn new(feed: Arc<dyn MarketDataFeed>, settings: ScanSettings, metrics: MetricsTx) -> Self {
        feed.set_min_call_gap(settings.min_call_gap());
        let (snapshots, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            session: Arc::new(RwLock::new(SessionState::new(settings))),
            feed,
            snapshots,
            scan_requests: Arc::new(Notify::new()),
            metrics,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardSnapshot> {
        self.snapshots.subscribe()
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.session.read().await.snapshot(self.feed.name())
    }

    async fn publish(&self) {
        let snapshot = self.snapshot().await;
        let _ = self.snapshots.send(snapshot);
    }

    /// Queue a scan. Requests made while one is pending collapse into one.
    pub fn request_scan(&self) {
        self.scan_requests.notify_one();
    }

    pub async fn settings(&self) -> ScanSettings {
        self.session.read().await.settings.clone()
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<ScanSettings, SettingsError> {
        let next = {
            let mut session = self.session.write().await;
            let next = session.settings.apply(update)?;
            session.alerts.set_max_kept(next.max_alerts_kept);
            session.settings = next.clone();
            next
        };
        self.feed.set_min_call_gap(next.min_call_gap());
        logging::info(
            "settings.updated",
            "Scanner settings changed",
            json!({
                "watchlist": next.watchlist,
                "interval": next.interval,
                "mode": next.mode,
                "threshold": next.effective_threshold(),
                "auto_refresh": next.auto_refresh,
            }),
        );
        self.publish().await;
        Ok(next)
    }

    pub async fn clear_alerts(&self) {
        self.session.write().await.alerts.clear();
        logging::info_simple("alerts.cleared", "Alerts and cooldowns cleared");
        self.publish().await;
    }

    pub async fn push_test_alert(&self) -> Alert {
        let alert = {
            let mut session = self.session.write().await;
            let (mode, interval) = (session.settings.mode, session.settings.interval);
            session.alerts.push_test_alert(mode, interval, Utc::now())
        };
        self.publish().await;
        alert
    }

    pub async fn filtered_alerts(&self, biases: &[Bias], min_score: u32, limit: usize) -> Vec<Alert> {
        self.session
            .read()
            .await
            .alerts
            .filtered(biases, min_score, limit)
    }

    pub async fn detail(&self, symbol: &str) -> Result<SymbolDetail, FeedError> {
        let settings = self.settings().await;
        fetch_detail(
            self.feed.as_ref(),
            &symbol.trim().to_uppercase(),
            settings.interval,
            settings.mode,
            settings.time_filter,
        )
        .await
    }

    /// Scan the watchlist with the current settings, capture alerts and publish.
    pub async fn run_scan(&self) -> ScanReport {
        let settings = {
            let mut session = self.session.write().await;
            session.scanning = true;
            session.settings.clone()
        };
        self.publish().await;

        let report = scan_watchlist(
            self.feed.as_ref(),
            &settings.watchlist,
            settings.interval,
            settings.mode,
            settings.time_filter,
        )
        .await;

        self.metrics.report(MetricsEvent::Scan {
            symbols: report.results.len(),
            errors: report.errors.len(),
            actionable: report.actionable(),
            duration_ms: report.duration_ms,
        });

        {
            let mut session = self.session.write().await;
            if settings.capture_alerts && !report.results.is_empty() {
                let ctx = CaptureContext {
                    threshold: settings.effective_threshold(),
                    cooldown_minutes: settings.cooldown_minutes,
                    mode: settings.mode,
                    interval: settings.interval,
                };
                let outcome = session.alerts.capture(&report.results, ctx, Utc::now());
                for alert in &outcome.captured {
                    logging::info(
                        "alert.captured",
                        "Setup crossed the alert threshold",
                        json!({
                            "symbol": alert.symbol,
                            "bias": alert.bias,
                            "score": alert.score,
                            "session": alert.session,
                        }),
                    );
                }
                self.metrics.report(MetricsEvent::Alerts {
                    captured: outcome.captured.len(),
                    suppressed: outcome.suppressed,
                });
            }
            session.report = Some(report.clone());
            session.scanning = false;
            session.last_scan = Some(Instant::now());
        }

        self.publish().await;
        report
    }

    async fn auto_refresh_due(&self) -> bool {
        self.session.read().await.auto_refresh_due()
    }
}

pub async fn run_with_config(config: ServiceConfig) -> Result<()> {
    config
        .settings
        .validate()
        .context("invalid initial scanner settings")?;

    let feed = build_feed(
        config.api_key.clone(),
        config.demo,
        config.demo_seed,
        config.settings.min_call_gap(),
    )
    .context("failed to build market data feed")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownSignal::None);
    let (metrics_tx, metrics_task) = metrics::reporter(config.metrics_interval, shutdown_rx.clone());
    let state = ServiceState::new(feed, config.settings.clone(), metrics_tx);

    logging::info(
        "service.start",
        "Scalp scanner starting",
        json!({
            "addr": config.gateway_addr.to_string(),
            "feed": state.feed.name(),
            "watchlist": config.settings.watchlist,
        }),
    );

    if config.scan_on_start {
        state.request_scan();
    }

    let signals_task = tokio::spawn(handle_signals(shutdown_tx.clone(), state.clone()));

    let run_result = tokio::try_join!(
        gateway::run_gateway(config.gateway_addr, state.clone(), shutdown_rx.clone()),
        run_scan_loop(state.clone(), config.scheduler_tick, shutdown_rx),
        metrics_task,
    );

    signals_task.abort();
    let _ = signals_task.await;

    run_result?;
    logging::info_simple("service.stop", "Scalp scanner stopped");
    Ok(())
}

/// Unix signals the service reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ControlSignal {
    Terminate,
    Interrupt,
    Hangup,
}

/// Apply one signal. Returns false once no further signals should be handled.
fn on_signal(
    received: ControlSignal,
    shutdown_tx: &watch::Sender<ShutdownSignal>,
    state: &ServiceState,
) -> bool {
    match received {
        ControlSignal::Terminate => {
            logging::info(
                "signal.received",
                "SIGTERM received, finishing the current scan before exit",
                json!({ "signal": "SIGTERM" }),
            );
            shutdown_tx.send(ShutdownSignal::Graceful).is_ok()
        }
        ControlSignal::Interrupt => {
            logging::warn(
                "signal.received",
                "SIGINT received, stopping immediately",
                json!({ "signal": "SIGINT" }),
            );
            let _ = shutdown_tx.send(ShutdownSignal::Immediate);
            false
        }
        ControlSignal::Hangup => {
            logging::info(
                "signal.received",
                "SIGHUP received, scanning now",
                json!({ "signal": "SIGHUP" }),
            );
            state.request_scan();
            true
        }
    }
}

async fn handle_signals(shutdown_tx: watch::Sender<ShutdownSignal>, state: ServiceState) -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("failed to register SIGHUP handler")?;

    loop {
        let received = tokio::select! {
            _ = sigterm.recv() => ControlSignal::Terminate,
            _ = sigint.recv() => ControlSignal::Interrupt,
            _ = sighup.recv() => ControlSignal::Hangup,
        };
        if !on_signal(received, &shutdown_tx, &state) {
            break;
        }
    }

    Ok(())
}

async fn run_scan_loop(
    state: ServiceState,
    tick: Duration,
    mut shutdown: watch::Receiver<ShutdownSignal>,
) -> Result<()> {
    let mut ticker = time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = state.scan_requests.notified() => {}
            _ = ticker.tick() => {
                if !state.auto_refresh_due().await {
                    continue;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                match *shutdown.borrow() {
                    ShutdownSignal::None => continue,
                    _ => break,
                }
            }
        }

        // A graceful stop lets the scan in flight finish; an immediate one drops it.
        let scan = state.run_scan();
        tokio::pin!(scan);
        let aborted = loop {
            tokio::select! {
                _ = &mut scan => break false,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() == ShutdownSignal::Immediate {
                        break true;
                    }
                }
            }
        };
        if aborted {
            logging::warn_simple("scan.aborted", "Scan dropped by immediate shutdown");
            break;
        }
        if *shutdown.borrow() != ShutdownSignal::None {
            break;
        }
    }

    logging::info_simple("scan_loop.stop", "Scan loop stopped");
    Ok(())
}

pub mod testkit {
    use super::*;
    use crate::feed::DemoFeed;
    use chrono::NaiveDateTime;

    /// Session backed by a pinned demo feed, with no metrics or gateway.
    pub fn demo_state(seed: u64, anchor: NaiveDateTime, settings: ScanSettings) -> ServiceState {
        let feed = Arc::new(DemoFeed::new(seed).with_anchor(anchor));
        ServiceState::new(feed, settings, MetricsTx::noop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SignalMode;
    use crate::session::TimeFilter;
    use chrono::NaiveDate;

    fn anchor() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .and_then(|date| date.and_hms_opt(10, 5, 0))
            .expect("anchor")
    }

    fn loose_settings() -> ScanSettings {
        ScanSettings {
            mode: SignalMode::FastScalp,
            time_filter: TimeFilter::ALL_SESSIONS,
            alert_threshold: Some(60),
            ..ScanSettings::default()
        }
    }

    #[tokio::test]
    async fn scan_stores_report_and_publishes() {
        logging::set_silent(true);
        let state = testkit::demo_state(9, anchor(), loose_settings());
        let mut updates = state.subscribe();

        let report = state.run_scan().await;
        assert_eq!(report.results.len(), 5);

        let scanning = updates.recv().await.expect("scanning snapshot");
        assert!(scanning.scanning);
        let done = updates.recv().await.expect("final snapshot");
        assert!(!done.scanning);
        assert_eq!(done.report.as_ref(), Some(&report));
        assert_eq!(done.version, SNAPSHOT_VERSION);
        assert_eq!(done.feed, "demo");

        let expected = report
            .results
            .iter()
            .filter(|r| r.bias.is_actionable() && r.setup_score >= 60)
            .count();
        assert_eq!(done.alerts.len(), expected);
    }

    #[tokio::test]
    async fn repeated_scans_respect_cooldown() {
        logging::set_silent(true);
        let state = testkit::demo_state(21, anchor(), loose_settings());
        for _ in 0..6 {
            state.run_scan().await;
        }
        let snapshot = state.snapshot().await;
        let mut symbols: Vec<_> = snapshot.alerts.iter().map(|a| a.symbol.clone()).collect();
        let before = symbols.len();
        symbols.sort();
        symbols.dedup();
        assert_eq!(before, symbols.len(), "ticker alerted twice inside its cooldown");
    }

    #[tokio::test]
    async fn capture_can_be_switched_off() {
        logging::set_silent(true);
        let settings = ScanSettings {
            capture_alerts: false,
            ..loose_settings()
        };
        let state = testkit::demo_state(4, anchor(), settings);
        for _ in 0..4 {
            state.run_scan().await;
        }
        assert!(state.snapshot().await.alerts.is_empty());
    }

    #[tokio::test]
    async fn settings_update_resizes_alert_store() {
        logging::set_silent(true);
        let state = testkit::demo_state(1, anchor(), ScanSettings::default());
        for _ in 0..15 {
            state.push_test_alert().await;
        }
        let updated = state
            .update_settings(SettingsUpdate {
                max_alerts_kept: Some(10),
                ..SettingsUpdate::default()
            })
            .await
            .expect("valid update");
        assert_eq!(updated.max_alerts_kept, 10);
        assert_eq!(state.snapshot().await.alerts.len(), 10);

        let rejected = state
            .update_settings(SettingsUpdate {
                refresh_seconds: Some(1),
                ..SettingsUpdate::default()
            })
            .await;
        assert!(rejected.is_err());
        assert_eq!(state.settings().await.refresh_seconds, 30);

        state.clear_alerts().await;
        assert!(state.snapshot().await.alerts.is_empty());
    }

    #[tokio::test]
    async fn empty_watchlist_scan_warns() {
        logging::set_silent(true);
        let settings = ScanSettings {
            watchlist: Vec::new(),
            ..ScanSettings::default()
        };
        let state = testkit::demo_state(1, anchor(), settings);
        let report = state.run_scan().await;
        assert!(report.results.is_empty());
        assert!(report.warning.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_refresh_waits_for_period() {
        let settings = ScanSettings {
            auto_refresh: true,
            refresh_seconds: 10,
            ..ScanSettings::default()
        };
        let mut session = SessionState::new(settings);
        assert!(session.auto_refresh_due());

        session.last_scan = Some(Instant::now());
        assert!(!session.auto_refresh_due());
        time::advance(Duration::from_secs(10)).await;
        assert!(session.auto_refresh_due());

        session.settings.auto_refresh = false;
        assert!(!session.auto_refresh_due());
    }

    struct SlowFeed(crate::feed::DemoFeed);

    #[async_trait::async_trait]
    impl MarketDataFeed for SlowFeed {
        fn name(&self) -> &'static str {
            "slow-demo"
        }

        async fn intraday(
            &self,
            symbol: &str,
            interval: crate::model::Interval,
        ) -> Result<Vec<crate::model::Bar>, FeedError> {
            time::sleep(Duration::from_secs(2)).await;
            self.0.intraday(symbol, interval).await
        }

        async fn quote(&self, symbol: &str) -> Result<Option<f64>, FeedError> {
            self.0.quote(symbol).await
        }
    }

    fn slow_state() -> ServiceState {
        let feed = Arc::new(SlowFeed(crate::feed::DemoFeed::new(5).with_anchor(anchor())));
        let settings = ScanSettings {
            watchlist: vec!["AAPL".into(), "NVDA".into()],
            ..loose_settings()
        };
        ServiceState::new(feed, settings, MetricsTx::noop())
    }

    async fn wait_for_scan_start(updates: &mut broadcast::Receiver<DashboardSnapshot>) {
        loop {
            let snapshot = updates.recv().await.expect("snapshot");
            if snapshot.scanning {
                return;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hangup_triggers_a_scan() {
        logging::set_silent(true);
        let state = testkit::demo_state(3, anchor(), loose_settings());
        let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownSignal::None);
        let mut updates = state.subscribe();
        let scan_loop = tokio::spawn(run_scan_loop(
            state.clone(),
            Duration::from_millis(500),
            shutdown_rx,
        ));

        assert!(on_signal(ControlSignal::Hangup, &shutdown_tx, &state));
        let published = loop {
            let snapshot = updates.recv().await.expect("snapshot");
            if !snapshot.scanning && snapshot.report.is_some() {
                break snapshot;
            }
        };
        assert_eq!(published.report.map(|report| report.results.len()), Some(5));

        assert!(on_signal(ControlSignal::Terminate, &shutdown_tx, &state));
        scan_loop.await.expect("join").expect("scan loop");
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_shutdown_finishes_the_scan_in_flight() {
        logging::set_silent(true);
        let state = slow_state();
        let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownSignal::None);
        let mut updates = state.subscribe();
        let scan_loop = tokio::spawn(run_scan_loop(
            state.clone(),
            Duration::from_millis(500),
            shutdown_rx,
        ));

        state.request_scan();
        wait_for_scan_start(&mut updates).await;
        assert!(on_signal(ControlSignal::Terminate, &shutdown_tx, &state));
        scan_loop.await.expect("join").expect("scan loop");

        let last = updates.recv().await.expect("final snapshot");
        assert!(!last.scanning);
        assert_eq!(last.report.map(|report| report.results.len()), Some(2));
        assert!(state.snapshot().await.report.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_shutdown_drops_the_scan_in_flight() {
        logging::set_silent(true);
        let state = slow_state();
        let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownSignal::None);
        let mut updates = state.subscribe();
        let scan_loop = tokio::spawn(run_scan_loop(
            state.clone(),
            Duration::from_millis(500),
            shutdown_rx,
        ));

        state.request_scan();
        wait_for_scan_start(&mut updates).await;
        assert!(!on_signal(ControlSignal::Interrupt, &shutdown_tx, &state));
        scan_loop.await.expect("join").expect("scan loop");

        assert!(state.snapshot().await.report.is_none());
        assert!(matches!(
            updates.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
