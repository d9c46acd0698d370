use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal, Normal};

use crate::model::{Bar, Interval, Session};
use crate::session::{classify_session, now_eastern};

use super::{FeedError, MarketDataFeed};

const BARS_PER_SERIES: usize = 150;
const SETUP_PROBABILITY: f64 = 0.35;

/// Synthetic random-walk bars, for running without a vendor key.
///
/// Every call advances a generation counter so consecutive scans see fresh
/// tape. Some generations end in a flush-and-reclaim (or the mirrored
/// rip-and-reject) so the alert path has something to do.
pub struct DemoFeed {
    seed: u64,
    generation: AtomicU64,
    anchor: Option<NaiveDateTime>,
}

impl DemoFeed {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            generation: AtomicU64::new(0),
            anchor: None,
        }
    }

    /// Pin the timestamp of the last generated bar.
    pub fn with_anchor(mut self, anchor: NaiveDateTime) -> Self {
        self.anchor = Some(anchor);
        self
    }

    fn last_bar_time(&self, interval: Interval) -> NaiveDateTime {
        let now = self.anchor.unwrap_or_else(now_eastern);
        // Outside regular hours, replay a morning session of the same day.
        let anchor = if classify_session(now) == Session::Off {
            now.date()
                .and_time(NaiveTime::from_hms_opt(10, 15, 0).unwrap_or_default())
        } else {
            now
        };
        let minute = anchor.minute() as i64;
        let floored = minute - minute % interval.minutes();
        anchor
            .with_second(0)
            .and_then(|at| at.with_nanosecond(0))
            .unwrap_or(anchor)
            - Duration::minutes(minute - floored)
    }

    fn rng_for(&self, symbol: &str, generation: u64) -> StdRng {
        let symbol_hash = symbol
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
                (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
            });
        StdRng::seed_from_u64(self.seed ^ symbol_hash ^ generation.rotate_left(32))
    }

    pub fn generate(&self, symbol: &str, interval: Interval, generation: u64) -> Vec<Bar> {
        let mut rng = self.rng_for(symbol, generation);
        let end = self.last_bar_time(interval);
        let step = Duration::minutes(interval.minutes());

        let returns = Normal::<f64>::new(0.0, 0.0012).expect("valid return distribution");
        let volumes = LogNormal::<f64>::new(8.0, 0.35).expect("valid volume distribution");

        let mut price: f64 = rng.gen_range(40.0..400.0);
        let mut bars = Vec::with_capacity(BARS_PER_SERIES);
        for idx in 0..BARS_PER_SERIES {
            let open = price;
            let close = (open * (1.0 + returns.sample(&mut rng))).max(0.01);
            let wick = open * rng.gen_range(0.0..0.0008);
            bars.push(Bar {
                timestamp: end - step * (BARS_PER_SERIES - 1 - idx) as i32,
                open,
                high: open.max(close) + wick,
                low: (open.min(close) - wick).max(0.01),
                close,
                volume: volumes.sample(&mut rng).round(),
            });
            price = close;
        }

        if rng.gen_bool(SETUP_PROBABILITY) {
            let direction = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            stamp_reversal(&mut bars, direction);
        }
        bars
    }
}

/// Rewrite the tail into a decelerating flush against `direction` followed
/// by a snap back through VWAP on heavy volume.
fn stamp_reversal(bars: &mut [Bar], direction: f64) {
    let len = bars.len();
    if len < 13 {
        return;
    }
    let base_volume = bars[len - 13].volume.max(1.0);
    let mut price = bars[len - 13].close;
    let unit = price * 0.012;

    for (step, bar) in bars[len - 12..len - 1].iter_mut().enumerate() {
        let open = price;
        let close = open - direction * unit * 0.6_f64.powi(step as i32);
        *bar = Bar {
            open,
            high: open.max(close) + unit * 0.04,
            low: open.min(close) - unit * 0.04,
            close,
            volume: base_volume * 10.0,
            ..*bar
        };
        price = close;
    }

    let open = price + direction * unit * 0.25;
    let close = price + direction * unit * 1.7;
    bars[len - 1] = Bar {
        open,
        high: open.max(close) + unit * 0.04,
        low: open.min(close) - unit * 0.04,
        close,
        volume: base_volume * 12.0,
        ..bars[len - 1]
    };
}

#[async_trait]
impl MarketDataFeed for DemoFeed {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn intraday(&self, symbol: &str, interval: Interval) -> Result<Vec<Bar>, FeedError> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        Ok(self.generate(symbol, interval, generation))
    }

    async fn quote(&self, symbol: &str) -> Result<Option<f64>, FeedError> {
        let generation = self.generation.load(Ordering::Relaxed).saturating_sub(1);
        Ok(self
            .generate(symbol, Interval::OneMinute, generation)
            .last()
            .map(|bar| bar.close))
    }
}
