use std::time::{Duration, Instant};

use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use scalp_scanner::{
    feed::DemoFeed,
    logging,
    model::{Interval, SignalMode},
    scanner::scan_watchlist,
    session::TimeFilter,
    signal::compute_scalp_signal,
};
use tokio::runtime::Runtime;

fn watchlist() -> Vec<String> {
    (0..25).map(|idx| format!("SYM{idx:02}")).collect()
}

fn demo_feed() -> DemoFeed {
    let anchor = NaiveDate::from_ymd_opt(2024, 6, 3)
        .and_then(|date| date.and_hms_opt(10, 30, 0))
        .expect("valid anchor");
    DemoFeed::new(17).with_anchor(anchor)
}

fn bench_scoring(c: &mut Criterion) {
    logging::set_silent(true);
    let feed = demo_feed();
    let series: Vec<_> = watchlist()
        .iter()
        .map(|symbol| (symbol.clone(), feed.generate(symbol, Interval::OneMinute, 0)))
        .collect();

    let mut group = c.benchmark_group("scalp_signal");
    group.throughput(Throughput::Elements(series.len() as u64));
    group.bench_function("score_watchlist", |b| {
        b.iter(|| {
            series
                .iter()
                .map(|(symbol, bars)| {
                    compute_scalp_signal(
                        symbol,
                        bars,
                        SignalMode::CleanerSignals,
                        TimeFilter::ALL_SESSIONS,
                    )
                    .setup_score
                })
                .sum::<u32>()
        });
    });
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    logging::set_silent(true);
    let rt = Runtime::new().expect("failed to create Tokio runtime");
    let feed = demo_feed();
    let symbols = watchlist();

    let mut group = c.benchmark_group("scan_watchlist");
    group.throughput(Throughput::Elements(symbols.len() as u64));
    group.bench_function("demo_feed", |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                let elapsed = rt.block_on(async {
                    let start = Instant::now();
                    let report = scan_watchlist(
                        &feed,
                        &symbols,
                        Interval::OneMinute,
                        SignalMode::FastScalp,
                        TimeFilter::ALL_SESSIONS,
                    )
                    .await;
                    assert_eq!(report.results.len(), symbols.len());
                    start.elapsed()
                });
                total += elapsed;
            }
            total
        });
    });
    group.finish();
}

criterion_group!(benches, bench_scoring, bench_scan);
criterion_main!(benches);
