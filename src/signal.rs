//! Confluence scoring for intraday reversal scalps.
//!
//! A setup collects points from five independent events on the latest bar:
//! a VWAP reclaim or rejection, an RSI-5 snap or downshift, a two-bar MACD
//! histogram turn, a volume spike, and micro structure. Presets decide the
//! score needed to act and which events are mandatory.

use serde::Serialize;

use crate::indicators::{self, rolling_median, swing_highs, swing_lows};
use crate::model::{Bar, Bias, SignalMode, SignalResult};
use crate::session::{classify_session, TimeFilter};

pub const MIN_BARS: usize = 60;
pub const LOOKBACK_BARS: usize = 160;

const VWAP_POINTS: u32 = 35;
const RSI_POINTS: u32 = 20;
const MACD_POINTS: u32 = 20;
const VOLUME_POINTS: u32 = 15;
const STRUCTURE_POINTS: u32 = 10;

const ATR_PERIOD: usize = 14;
const ATR_STOP_FACTOR: f64 = 0.8;
const MIN_RISK: f64 = 0.01;
const STRUCTURE_BARS: usize = 12;
const SWING_SPAN: usize = 3;
const VOLUME_WINDOW: usize = 30;
const VOLUME_MIN_PERIODS: usize = 10;
const MAX_REASONS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Preset {
    pub min_actionable_score: u32,
    pub vol_multiplier: f64,
    pub require_volume: bool,
    pub require_macd_turn: bool,
    pub require_vwap_event: bool,
    pub require_rsi_event: bool,
}

impl SignalMode {
    pub fn preset(self) -> Preset {
        match self {
            SignalMode::FastScalp => Preset {
                min_actionable_score: 70,
                vol_multiplier: 1.15,
                require_volume: false,
                require_macd_turn: true,
                require_vwap_event: true,
                require_rsi_event: true,
            },
            SignalMode::CleanerSignals => Preset {
                min_actionable_score: 80,
                vol_multiplier: 1.35,
                require_volume: true,
                require_macd_turn: true,
                require_vwap_event: true,
                require_rsi_event: true,
            },
        }
    }
}

/// Boolean events observed on the latest bar of the lookback window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Events {
    pub was_below_vwap: bool,
    pub reclaim_vwap: bool,
    pub was_above_vwap: bool,
    pub reject_vwap: bool,
    pub rsi_snap: bool,
    pub rsi_downshift: bool,
    pub rsi14: f64,
    pub macd_turn_up: bool,
    pub macd_turn_down: bool,
    pub volume_ok: bool,
    pub higher_low: bool,
    pub lower_high: bool,
}

impl Events {
    fn vwap_event(&self) -> bool {
        (self.was_below_vwap && self.reclaim_vwap) || (self.was_above_vwap && self.reject_vwap)
    }

    fn rsi_event(&self) -> bool {
        self.rsi_snap || self.rsi_downshift
    }

    fn macd_turn(&self) -> bool {
        self.macd_turn_up || self.macd_turn_down
    }
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Tally {
    pub points: u32,
    pub reasons: Vec<&'static str>,
}

impl Tally {
    fn add(&mut self, hit: bool, points: u32, reason: &'static str) {
        if hit {
            self.points += points;
            self.reasons.push(reason);
        }
    }
}

pub(crate) fn tally(events: &Events) -> (Tally, Tally) {
    let mut long = Tally::default();
    long.add(
        events.was_below_vwap && events.reclaim_vwap,
        VWAP_POINTS,
        "VWAP reclaim",
    );
    long.add(
        events.rsi_snap && events.rsi14 < 60.0,
        RSI_POINTS,
        "RSI-5 snapback (RSI-14 ok)",
    );
    long.add(events.macd_turn_up, MACD_POINTS, "MACD hist turning up");
    long.add(events.volume_ok, VOLUME_POINTS, "Volume confirmation");
    long.add(
        events.higher_low,
        STRUCTURE_POINTS,
        "Higher-low micro structure",
    );

    let mut short = Tally::default();
    short.add(
        events.was_above_vwap && events.reject_vwap,
        VWAP_POINTS,
        "VWAP rejection",
    );
    short.add(
        events.rsi_downshift && events.rsi14 > 40.0,
        RSI_POINTS,
        "RSI-5 downshift (RSI-14 ok)",
    );
    short.add(events.macd_turn_down, MACD_POINTS, "MACD hist turning down");
    short.add(events.volume_ok, VOLUME_POINTS, "Volume confirmation");
    short.add(
        events.lower_high,
        STRUCTURE_POINTS,
        "Lower-high micro structure",
    );

    (long, short)
}

/// First mandatory event the preset asks for that did not happen.
pub(crate) fn missing_requirement(events: &Events, preset: &Preset) -> Option<&'static str> {
    if preset.require_vwap_event && !events.vwap_event() {
        return Some("No VWAP reclaim/rejection event");
    }
    if preset.require_rsi_event && !events.rsi_event() {
        return Some("No RSI-5 snap/downshift event");
    }
    if preset.require_macd_turn && !events.macd_turn() {
        return Some("No MACD histogram turn event");
    }
    if preset.require_volume && !events.volume_ok {
        return Some("No volume confirmation");
    }
    None
}

/// Entry, stop and 1R/2R targets for a trade at `entry`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TradePlan {
    pub entry: f64,
    pub stop: f64,
    pub target_1r: f64,
    pub target_2r: f64,
}

impl TradePlan {
    pub(crate) fn long(entry: f64, swing_low: f64, atr: f64) -> Self {
        let stop = swing_low.min(entry - atr.max(0.0) * ATR_STOP_FACTOR);
        let risk = (entry - stop).max(MIN_RISK);
        Self {
            entry,
            stop,
            target_1r: entry + risk,
            target_2r: entry + 2.0 * risk,
        }
    }

    pub(crate) fn short(entry: f64, swing_high: f64, atr: f64) -> Self {
        let stop = swing_high.max(entry + atr.max(0.0) * ATR_STOP_FACTOR);
        let risk = (stop - entry).max(MIN_RISK);
        Self {
            entry,
            stop,
            target_1r: entry - risk,
            target_2r: entry - 2.0 * risk,
        }
    }
}

/// Score the latest bar of `bars` (oldest first) for a reversal scalp.
pub fn compute_scalp_signal(
    symbol: &str,
    bars: &[Bar],
    mode: SignalMode,
    filter: TimeFilter,
) -> SignalResult {
    if bars.len() < MIN_BARS {
        return SignalResult::neutral(symbol, 0, "Not enough data");
    }

    let preset = mode.preset();

    // Oscillators use the full history for warmup; VWAP and ATR are anchored
    // to the lookback window.
    let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
    let rsi_fast = indicators::rsi(&closes, 5);
    let rsi_slow = indicators::rsi(&closes, 14);
    let macd_hist = indicators::macd_histogram(&closes, 12, 26, 9);

    let offset = bars.len().saturating_sub(LOOKBACK_BARS);
    let window = &bars[offset..];
    let last = window.len() - 1;
    let last_bar = window[last];
    let session = classify_session(last_bar.timestamp);

    if !filter.allows(session) {
        return SignalResult::neutral(
            symbol,
            0,
            format!("Filtered by time-of-day ({session})"),
        )
        .at_bar(last_bar.close, last_bar.timestamp, session);
    }

    let events = detect_events(
        window,
        &rsi_fast[offset..],
        &rsi_slow[offset..],
        &macd_hist[offset..],
        preset.vol_multiplier,
    );
    let (long, short) = tally(&events);
    let best = long.points.max(short.points);

    if let Some(reason) = missing_requirement(&events, &preset) {
        return SignalResult::neutral(symbol, best, reason).at_bar(
            last_bar.close,
            last_bar.timestamp,
            session,
        );
    }

    let lows: Vec<f64> = window.iter().map(|bar| bar.low).collect();
    let highs: Vec<f64> = window.iter().map(|bar| bar.high).collect();
    let atr = indicators::atr(window, ATR_PERIOD)[last];

    let (bias, plan, winner) = if long.points >= preset.min_actionable_score
        && long.points > short.points
    {
        let swing_low = recent_swing(&lows, swing_lows(&lows, SWING_SPAN, SWING_SPAN))
            .unwrap_or_else(|| tail_extreme(&lows, f64::min));
        (Bias::Long, TradePlan::long(last_bar.close, swing_low, atr), long)
    } else if short.points >= preset.min_actionable_score && short.points > long.points {
        let swing_high = recent_swing(&highs, swing_highs(&highs, SWING_SPAN, SWING_SPAN))
            .unwrap_or_else(|| tail_extreme(&highs, f64::max));
        (
            Bias::Short,
            TradePlan::short(last_bar.close, swing_high, atr),
            short,
        )
    } else {
        let reason = format!(
            "LongScore={} ({}); ShortScore={} ({})",
            long.points,
            long.reasons.join(", "),
            short.points,
            short.reasons.join(", ")
        );
        return SignalResult::neutral(symbol, best, reason).at_bar(
            last_bar.close,
            last_bar.timestamp,
            session,
        );
    };

    let reasons: Vec<&str> = winner.reasons.iter().take(MAX_REASONS).copied().collect();
    SignalResult {
        symbol: symbol.to_string(),
        bias,
        setup_score: winner.points.min(100),
        reason: reasons.join(", "),
        entry: Some(plan.entry),
        stop: Some(plan.stop),
        target_1r: Some(plan.target_1r),
        target_2r: Some(plan.target_2r),
        last_price: Some(last_bar.close),
        timestamp: Some(last_bar.timestamp),
        session,
    }
}

pub(crate) fn detect_events(
    window: &[Bar],
    rsi_fast: &[f64],
    rsi_slow: &[f64],
    macd_hist: &[f64],
    vol_multiplier: f64,
) -> Events {
    let n = window.len() - 1;
    let closes: Vec<f64> = window.iter().map(|bar| bar.close).collect();
    let vwap = indicators::vwap(window);
    let shifted = |series: &[f64], k: usize| n.checked_sub(k).map_or(f64::NAN, |idx| series[idx]);

    let below_at = |k: usize| shifted(&closes, k) < shifted(&vwap, k);
    let above_at = |k: usize| shifted(&closes, k) > shifted(&vwap, k);

    let rsi5 = rsi_fast[n];
    let rsi5_prev = shifted(rsi_fast, 1);

    let h0 = macd_hist[n];
    let h1 = shifted(macd_hist, 1);
    let h2 = shifted(macd_hist, 2);

    let volumes: Vec<f64> = window.iter().map(|bar| bar.volume).collect();
    let volume_median = rolling_median(&volumes, VOLUME_WINDOW, VOLUME_MIN_PERIODS)[n];

    let lows: Vec<f64> = window.iter().map(|bar| bar.low).collect();
    let highs: Vec<f64> = window.iter().map(|bar| bar.high).collect();

    Events {
        was_below_vwap: below_at(3) || below_at(5),
        reclaim_vwap: closes[n] > vwap[n] && shifted(&closes, 1) <= shifted(&vwap, 1),
        was_above_vwap: above_at(3) || above_at(5),
        reject_vwap: closes[n] < vwap[n] && shifted(&closes, 1) >= shifted(&vwap, 1),
        rsi_snap: (rsi5 >= 30.0 && rsi5_prev < 30.0) || (rsi5 >= 25.0 && rsi5_prev < 25.0),
        rsi_downshift: (rsi5 <= 70.0 && rsi5_prev > 70.0) || (rsi5 <= 75.0 && rsi5_prev > 75.0),
        rsi14: rsi_slow[n],
        macd_turn_up: h0 > h1 && h1 > h2,
        macd_turn_down: h0 < h1 && h1 < h2,
        volume_ok: volume_median.is_finite() && volumes[n] >= vol_multiplier * volume_median,
        higher_low: lows[n] > tail_extreme(&lows, f64::min),
        lower_high: highs[n] < tail_extreme(&highs, f64::max),
    }
}

fn recent_swing(values: &[f64], marks: Vec<bool>) -> Option<f64> {
    marks
        .iter()
        .rposition(|marked| *marked)
        .map(|idx| values[idx])
}

fn tail_extreme(values: &[f64], pick: fn(f64, f64) -> f64) -> f64 {
    let start = values.len().saturating_sub(STRUCTURE_BARS);
    values[start..]
        .iter()
        .copied()
        .fold(f64::NAN, pick)
}
