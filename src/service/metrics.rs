use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tokio::{
    sync::{mpsc, watch},
    time::{interval, MissedTickBehavior},
};

use crate::logging;

use super::ShutdownSignal;

#[derive(Debug)]
pub enum MetricsEvent {
    Scan {
        symbols: usize,
        errors: usize,
        actionable: usize,
        duration_ms: u64,
    },
    Alerts {
        captured: usize,
        suppressed: usize,
    },
    ClientLag {
        skipped: u64,
    },
}

#[derive(Clone, Default)]
pub struct MetricsTx(Option<mpsc::UnboundedSender<MetricsEvent>>);

impl MetricsTx {
    pub fn report(&self, event: MetricsEvent) {
        if let Some(sender) = &self.0 {
            let _ = sender.send(event);
        }
    }

    pub fn noop() -> Self {
        Self(None)
    }
}

#[derive(Debug, Default, PartialEq)]
struct Window {
    scans: usize,
    symbols: usize,
    vendor_errors: usize,
    actionable: usize,
    slowest_scan_ms: u64,
    alerts_captured: usize,
    alerts_suppressed: usize,
    lag_events: usize,
    lag_skipped: u64,
}

impl Window {
    fn record(&mut self, event: MetricsEvent) {
        match event {
            MetricsEvent::Scan {
                symbols,
                errors,
                actionable,
                duration_ms,
            } => {
                self.scans = self.scans.saturating_add(1);
                self.symbols = self.symbols.saturating_add(symbols);
                self.vendor_errors = self.vendor_errors.saturating_add(errors);
                self.actionable = self.actionable.saturating_add(actionable);
                self.slowest_scan_ms = self.slowest_scan_ms.max(duration_ms);
            }
            MetricsEvent::Alerts {
                captured,
                suppressed,
            } => {
                self.alerts_captured = self.alerts_captured.saturating_add(captured);
                self.alerts_suppressed = self.alerts_suppressed.saturating_add(suppressed);
            }
            MetricsEvent::ClientLag { skipped } => {
                self.lag_events = self.lag_events.saturating_add(1);
                self.lag_skipped = self.lag_skipped.saturating_add(skipped);
            }
        }
    }

    fn is_idle(&self) -> bool {
        self == &Window::default()
    }
}

pub fn reporter(
    period: Duration,
    shutdown: watch::Receiver<ShutdownSignal>,
) -> (MetricsTx, impl std::future::Future<Output = Result<()>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MetricsTx(Some(tx)), process_events(rx, period, shutdown))
}

async fn process_events(
    mut rx: mpsc::UnboundedReceiver<MetricsEvent>,
    period: Duration,
    mut shutdown: watch::Receiver<ShutdownSignal>,
) -> Result<()> {
    let mut window = Window::default();

    let mut reporter = interval(period);
    reporter.set_missed_tick_behavior(MissedTickBehavior::Skip);
    reporter.reset();

    loop {
        tokio::select! {
            maybe_event = rx.recv() => {
                match maybe_event {
                    Some(event) => window.record(event),
                    None => break,
                }
            }
            _ = reporter.tick() => {
                if !window.is_idle() {
                    logging::info(
                        "metrics.summary",
                        "scanner activity summary",
                        json!({
                            "scans": window.scans,
                            "symbols_scored": window.symbols,
                            "vendor_errors": window.vendor_errors,
                            "actionable": window.actionable,
                            "slowest_scan_ms": window.slowest_scan_ms,
                            "alerts_captured": window.alerts_captured,
                            "alerts_suppressed": window.alerts_suppressed,
                            "client_lag_events": window.lag_events,
                            "client_lag_skipped": window.lag_skipped,
                        })
                    );
                }
                window = Window::default();
            }
            changed = shutdown.changed() => {
                if changed.is_ok() && !matches!(*shutdown.borrow(), ShutdownSignal::None) {
                    break;
                }
            }
        }
    }

    logging::info_simple("metrics.stop", "Metrics reporter stopped");
    Ok(())
}
