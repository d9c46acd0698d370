use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Bias, Interval, Session, SignalMode, SignalResult};
use crate::session::{to_eastern, utc_label};

/// In-session alert card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub captured_at_ms: i64,
    pub time: String,
    pub symbol: String,
    pub bias: Bias,
    pub score: u32,
    pub session: Session,
    pub last: Option<f64>,
    pub entry: Option<f64>,
    pub stop: Option<f64>,
    pub t1: Option<f64>,
    pub t2: Option<f64>,
    pub why: String,
    pub as_of: Option<NaiveDateTime>,
    pub mode: SignalMode,
    pub interval: Interval,
}

/// Scan parameters stamped onto captured alerts.
#[derive(Debug, Clone, Copy)]
pub struct CaptureContext {
    pub threshold: u32,
    pub cooldown_minutes: u32,
    pub mode: SignalMode,
    pub interval: Interval,
}

/// Bounded newest-first alert store with per-ticker cooldown.
#[derive(Debug, Clone)]
pub struct AlertBook {
    alerts: VecDeque<Alert>,
    last_alert: HashMap<String, DateTime<Utc>>,
    max_kept: usize,
    next_id: u64,
}

impl AlertBook {
    pub fn new(max_kept: usize) -> Self {
        Self {
            alerts: VecDeque::with_capacity(max_kept),
            last_alert: HashMap::new(),
            max_kept,
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn max_kept(&self) -> usize {
        self.max_kept
    }

    pub fn set_max_kept(&mut self, max_kept: usize) {
        self.max_kept = max_kept;
        self.alerts.truncate(max_kept);
    }

    /// A ticker may alert again once `cooldown_minutes` have fully elapsed.
    pub fn can_alert(&self, symbol: &str, now: DateTime<Utc>, cooldown_minutes: u32) -> bool {
        match self.last_alert.get(symbol) {
            None => true,
            Some(last) => now - *last >= chrono::Duration::minutes(i64::from(cooldown_minutes)),
        }
    }

    /// Capture every actionable result at or above the threshold whose ticker
    /// is out of cooldown. Returns the new alerts, in result order.
    pub fn capture(
        &mut self,
        results: &[SignalResult],
        ctx: CaptureContext,
        now: DateTime<Utc>,
    ) -> CaptureOutcome {
        let mut outcome = CaptureOutcome::default();
        for result in results {
            if !result.bias.is_actionable() || result.setup_score < ctx.threshold {
                continue;
            }
            if !self.can_alert(&result.symbol, now, ctx.cooldown_minutes) {
                outcome.suppressed += 1;
                continue;
            }
            let alert = self.alert_from(result, ctx, now);
            self.last_alert.insert(result.symbol.clone(), now);
            self.push(alert.clone());
            outcome.captured.push(alert);
        }
        outcome
    }

    fn alert_from(&mut self, result: &SignalResult, ctx: CaptureContext, now: DateTime<Utc>) -> Alert {
        let id = self.next_id;
        self.next_id += 1;
        Alert {
            id,
            captured_at_ms: now.timestamp_millis(),
            time: utc_label(now),
            symbol: result.symbol.clone(),
            bias: result.bias,
            score: result.setup_score,
            session: result.session,
            last: result.last_price,
            entry: result.entry,
            stop: result.stop,
            t1: result.target_1r,
            t2: result.target_2r,
            why: result.reason.clone(),
            as_of: result.timestamp,
            mode: ctx.mode,
            interval: ctx.interval,
        }
    }

    /// Insert at the front, dropping the oldest beyond `max_kept`.
    pub fn push(&mut self, alert: Alert) {
        self.alerts.push_front(alert);
        self.alerts.truncate(self.max_kept);
    }

    /// Placeholder card for checking the alerts view. Leaves cooldowns alone.
    pub fn push_test_alert(&mut self, mode: SignalMode, interval: Interval, now: DateTime<Utc>) -> Alert {
        let mut result = SignalResult::neutral("TEST", 95, "Test alert card");
        result.bias = Bias::Long;
        result.session = Session::Opening;
        result.last_price = Some(0.0);
        result.entry = Some(0.0);
        result.stop = Some(0.0);
        result.target_1r = Some(0.0);
        result.target_2r = Some(0.0);
        result.timestamp = Some(to_eastern(now));

        let ctx = CaptureContext {
            threshold: 0,
            cooldown_minutes: 0,
            mode,
            interval,
        };
        let alert = self.alert_from(&result, ctx, now);
        self.push(alert.clone());
        alert
    }

    /// Forget all alerts and every cooldown.
    pub fn clear(&mut self) {
        self.alerts.clear();
        self.last_alert.clear();
    }

    /// View-side filter; never affects what gets captured.
    pub fn filtered(&self, biases: &[Bias], min_score: u32, limit: usize) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|alert| biases.contains(&alert.bias) && alert.score >= min_score)
            .take(limit)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct CaptureOutcome {
    pub captured: Vec<Alert>,
    pub suppressed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ctx() -> CaptureContext {
        CaptureContext {
            threshold: 80,
            cooldown_minutes: 7,
            mode: SignalMode::CleanerSignals,
            interval: Interval::OneMinute,
        }
    }

    fn result(symbol: &str, bias: Bias, score: u32) -> SignalResult {
        let mut result = SignalResult::neutral(symbol, score, "setup");
        result.bias = bias;
        result.session = Session::Opening;
        result.entry = Some(10.0);
        result
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap()
    }

    #[test]
    fn threshold_and_bias_gate_capture() {
        let mut book = AlertBook::new(60);
        let outcome = book.capture(
            &[
                result("AAPL", Bias::Long, 85),
                result("NVDA", Bias::Short, 79),
                result("SPY", Bias::Neutral, 95),
                result("TSLA", Bias::Short, 80),
            ],
            ctx(),
            t0(),
        );
        let symbols: Vec<_> = outcome.captured.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "TSLA"]);
        assert_eq!(book.len(), 2);
        assert_eq!(book.iter().next().map(|a| a.symbol.as_str()), Some("TSLA"));
    }

    #[test]
    fn cooldown_suppresses_until_elapsed() {
        let mut book = AlertBook::new(60);
        let setup = [result("AAPL", Bias::Long, 90)];

        assert_eq!(book.capture(&setup, ctx(), t0()).captured.len(), 1);

        let early = t0() + Duration::minutes(6) + Duration::seconds(59);
        let outcome = book.capture(&setup, ctx(), early);
        assert!(outcome.captured.is_empty());
        assert_eq!(outcome.suppressed, 1);
        assert!(!book.can_alert("AAPL", early, 7));
        assert!(book.can_alert("NVDA", early, 7));

        let due = t0() + Duration::minutes(7);
        assert!(book.can_alert("AAPL", due, 7));
        assert_eq!(book.capture(&setup, ctx(), due).captured.len(), 1);
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn suppressed_capture_does_not_extend_cooldown() {
        let mut book = AlertBook::new(60);
        let setup = [result("QQQ", Bias::Short, 88)];
        book.capture(&setup, ctx(), t0());
        book.capture(&setup, ctx(), t0() + Duration::minutes(5));
        assert!(book.can_alert("QQQ", t0() + Duration::minutes(7), 7));
    }

    #[test]
    fn store_keeps_newest_within_bound() {
        let mut book = AlertBook::new(3);
        for minute in 0..5 {
            let symbol = format!("T{minute}");
            book.capture(
                &[result(&symbol, Bias::Long, 90)],
                ctx(),
                t0() + Duration::minutes(minute),
            );
        }
        let symbols: Vec<_> = book.iter().map(|a| a.symbol.clone()).collect();
        assert_eq!(symbols, vec!["T4", "T3", "T2"]);

        book.set_max_kept(1);
        assert_eq!(book.len(), 1);
        assert_eq!(book.max_kept(), 1);
    }

    #[test]
    fn clear_resets_alerts_and_cooldowns() {
        let mut book = AlertBook::new(10);
        book.capture(&[result("AAPL", Bias::Long, 90)], ctx(), t0());
        book.clear();
        assert!(book.is_empty());
        assert!(book.can_alert("AAPL", t0(), 7));
    }

    #[test]
    fn test_alert_skips_cooldown_bookkeeping() {
        let mut book = AlertBook::new(10);
        let alert = book.push_test_alert(SignalMode::FastScalp, Interval::FiveMinutes, t0());
        assert_eq!(alert.symbol, "TEST");
        assert_eq!(alert.bias, Bias::Long);
        assert_eq!(alert.score, 95);
        assert_eq!(alert.time, "2024-06-03 14:00:00 UTC");
        assert_eq!(
            alert.as_of.map(|as_of| as_of.format("%H:%M").to_string()),
            Some("10:00".to_string())
        );
        assert!(book.can_alert("TEST", t0(), 30));
    }

    #[test]
    fn filtered_view_applies_bias_and_score() {
        let mut book = AlertBook::new(10);
        let mut loose = ctx();
        loose.threshold = 60;
        book.capture(
            &[
                result("AAPL", Bias::Long, 70),
                result("NVDA", Bias::Short, 92),
                result("TSLA", Bias::Long, 85),
            ],
            loose,
            t0(),
        );

        let longs = book.filtered(&[Bias::Long], 80, 30);
        assert_eq!(longs.len(), 1);
        assert_eq!(longs[0].symbol, "TSLA");

        let both = book.filtered(&[Bias::Long, Bias::Short], 0, 2);
        assert_eq!(both.len(), 2);
        assert_eq!(book.len(), 3);
    }

    #[test]
    fn alert_ids_increase() {
        let mut book = AlertBook::new(10);
        let first = book.push_test_alert(SignalMode::FastScalp, Interval::OneMinute, t0());
        let second = book.push_test_alert(SignalMode::FastScalp, Interval::OneMinute, t0());
        assert!(second.id > first.id);
    }
}
