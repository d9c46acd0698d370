//! Indicator series over bars.
//!
//! Every function returns a vector aligned index-for-index with its input.
//! Positions without enough history hold `f64::NAN`, so any comparison
//! against them is false.

use crate::model::Bar;

/// Session VWAP: cumulative typical price times volume over cumulative volume.
pub fn vwap(bars: &[Bar]) -> Vec<f64> {
    let mut cum_pv = 0.0;
    let mut cum_volume = 0.0;
    bars.iter()
        .map(|bar| {
            cum_pv += bar.typical_price() * bar.volume;
            cum_volume += bar.volume;
            if cum_volume > 0.0 {
                cum_pv / cum_volume
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Average true range as a simple rolling mean of the true range.
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    let true_ranges: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(idx, bar)| {
            let range = (bar.high - bar.low).abs();
            match idx.checked_sub(1).map(|prev| bars[prev].close) {
                Some(prev_close) => range
                    .max((bar.high - prev_close).abs())
                    .max((bar.low - prev_close).abs()),
                None => range,
            }
        })
        .collect();
    rolling_mean(&true_ranges, period)
}

fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for end in period..=values.len() {
        let window = &values[end - period..end];
        out[end - 1] = window.iter().sum::<f64>() / period as f64;
    }
    out
}

/// Relative strength index with Wilder smoothing.
///
/// The first value lands on index `period` (it needs `period` price changes).
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for idx in 1..=period {
        let change = closes[idx] - closes[idx - 1];
        avg_gain += change.max(0.0);
        avg_loss += (-change).max(0.0);
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = rsi_value(avg_gain, avg_loss);

    let smoothing = (period - 1) as f64;
    for idx in period + 1..closes.len() {
        let change = closes[idx] - closes[idx - 1];
        avg_gain = (avg_gain * smoothing + change.max(0.0)) / period as f64;
        avg_loss = (avg_loss * smoothing + (-change).max(0.0)) / period as f64;
        out[idx] = rsi_value(avg_gain, avg_loss);
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return 50.0;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }
    if avg_gain == 0.0 {
        return 0.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Exponential moving average seeded with the SMA of the first `period`
/// finite values. Leading NaNs in the input are skipped.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    let Some(start) = values.iter().position(|value| value.is_finite()) else {
        return out;
    };
    let seed_end = start + period;
    if seed_end > values.len() {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = values[start..seed_end].iter().sum::<f64>() / period as f64;
    out[seed_end - 1] = prev;
    for idx in seed_end..values.len() {
        prev = values[idx] * k + prev * (1.0 - k);
        out[idx] = prev;
    }
    out
}

/// MACD histogram: (EMA fast - EMA slow) minus its own EMA over `signal`.
pub fn macd_histogram(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<f64> {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema(&macd_line, signal);
    macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect()
}

/// Median over a trailing window, defined once `min_periods` values are available.
pub fn rolling_median(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for end in 1..=values.len() {
        let begin = end.saturating_sub(window);
        let mut sample: Vec<f64> = values[begin..end]
            .iter()
            .copied()
            .filter(|value| value.is_finite())
            .collect();
        if sample.is_empty() || sample.len() < min_periods {
            continue;
        }
        sample.sort_by(f64::total_cmp);
        let mid = sample.len() / 2;
        out[end - 1] = if sample.len() % 2 == 0 {
            (sample[mid - 1] + sample[mid]) / 2.0
        } else {
            sample[mid]
        };
    }
    out
}

/// Indices whose value is the minimum of the window `[i - left, i + right]`.
pub fn swing_lows(values: &[f64], left: usize, right: usize) -> Vec<bool> {
    swing_points(values, left, right, |value, window| {
        window.iter().all(|other| value <= *other)
    })
}

/// Indices whose value is the maximum of the window `[i - left, i + right]`.
pub fn swing_highs(values: &[f64], left: usize, right: usize) -> Vec<bool> {
    swing_points(values, left, right, |value, window| {
        window.iter().all(|other| value >= *other)
    })
}

fn swing_points(
    values: &[f64],
    left: usize,
    right: usize,
    is_extreme: impl Fn(f64, &[f64]) -> bool,
) -> Vec<bool> {
    let mut marks = vec![false; values.len()];
    if values.len() <= left + right {
        return marks;
    }
    for idx in left..values.len() - right {
        let window = &values[idx - left..=idx + right];
        marks[idx] = is_extreme(values[idx], window);
    }
    marks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(minute: u32, high: f64, low: f64, close: f64, volume: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 4)
                .and_then(|d| d.and_hms_opt(10, minute, 0))
                .expect("valid timestamp"),
            open: close,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn vwap_weights_typical_price_by_volume() {
        let bars = [bar(0, 11.0, 9.0, 10.0, 100.0), bar(1, 21.0, 19.0, 20.0, 300.0)];
        let values = vwap(&bars);
        assert!((values[0] - 10.0).abs() < 1e-9);
        assert!((values[1] - 17.5).abs() < 1e-9);
    }

    #[test]
    fn vwap_is_nan_without_volume() {
        let values = vwap(&[bar(0, 11.0, 9.0, 10.0, 0.0)]);
        assert!(values[0].is_nan());
    }

    #[test]
    fn atr_uses_previous_close_gaps() {
        let bars = [
            bar(0, 10.0, 9.0, 9.5, 1.0),
            bar(1, 12.0, 11.5, 11.8, 1.0),
            bar(2, 12.0, 11.0, 11.2, 1.0),
        ];
        let values = atr(&bars, 2);
        assert!(values[0].is_nan());
        // true ranges: 1.0, 2.5 (gap from 9.5), 1.0
        assert!((values[1] - 1.75).abs() < 1e-9);
        assert!((values[2] - 1.75).abs() < 1e-9);
    }

    #[test]
    fn rsi_extremes_and_flat_series() {
        let rising: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        let flat = vec![50.0; 10];

        assert!(rsi(&rising, 5)[4].is_nan());
        assert_eq!(rsi(&rising, 5)[9], 100.0);
        assert_eq!(rsi(&falling, 5)[9], 0.0);
        assert_eq!(rsi(&flat, 5)[9], 50.0);
    }

    #[test]
    fn rsi_stays_within_bounds() {
        let closes: Vec<f64> = (0..80)
            .map(|i| 100.0 + ((i as f64) * 0.7).sin() * 3.0)
            .collect();
        for value in rsi(&closes, 14).into_iter().filter(|v| v.is_finite()) {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn ema_seeds_with_simple_average() {
        let values = ema(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(values[1].is_nan());
        assert!((values[2] - 2.0).abs() < 1e-9);
        assert!((values[3] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn macd_histogram_needs_slow_plus_signal_warmup() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.1).collect();
        let hist = macd_histogram(&closes, 12, 26, 9);
        assert!(hist[32].is_nan());
        assert!(hist[33].is_finite());
    }

    #[test]
    fn rolling_median_respects_min_periods() {
        let values = [5.0, 1.0, 3.0, 2.0];
        let medians = rolling_median(&values, 3, 2);
        assert!(medians[0].is_nan());
        assert!((medians[1] - 3.0).abs() < 1e-9);
        assert!((medians[2] - 3.0).abs() < 1e-9);
        assert!((medians[3] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn swing_points_require_full_window() {
        let lows = [5.0, 4.0, 3.0, 1.0, 3.0, 4.0, 5.0, 0.5];
        let marks = swing_lows(&lows, 3, 3);
        assert_eq!(marks.iter().filter(|m| **m).count(), 1);
        assert!(marks[3]);
        assert!(!marks[7], "edge index never qualifies");

        let highs: Vec<f64> = lows.iter().map(|v| -v).collect();
        assert!(swing_highs(&highs, 3, 3)[3]);
    }
}
