//! Criterion benchmarks for the engine hot paths.
//!
//! 1. Bar event loop (full backtest iteration, single and multi symbol)
//! 2. Scheduler k-way merge throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use backlab_core::config::{BacktestConfig, FeedConfig};
use backlab_core::domain::time::NANOS_PER_SEC;
use backlab_core::domain::Bar;
use backlab_core::engine::Backtest;
use backlab_core::feed::store::StoreSnapshotSource;
use backlab_core::feed::ReplayScheduler;
use backlab_core::strategy::SmaCrossover;

fn make_bars(symbol: &str, n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            Bar {
                symbol: symbol.to_string(),
                timestamp: (i as i64 + 1) * 60 * NANOS_PER_SEC,
                open: close - 0.3,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1_000_000.0,
                period: 60 * NANOS_PER_SEC,
            }
        })
        .collect()
}

fn bench_bar_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("bar_event_loop");

    for &bar_count in &[252, 1260, 2520] {
        let bars = make_bars("BENCH", bar_count);
        group.bench_with_input(
            BenchmarkId::new("sma_crossover", bar_count),
            &bar_count,
            |b, _| {
                b.iter(|| {
                    let mut backtest = Backtest::new(BacktestConfig::default());
                    backtest.add_strategy(Box::new(SmaCrossover::new("BENCH", 100.0, 20, 50)));
                    backtest.run_bars(black_box(&bars)).unwrap();
                    black_box(backtest.equity())
                });
            },
        );
    }

    group.finish();
}

fn bench_scheduler_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_merge");

    for &num_symbols in &[2usize, 10, 50] {
        let mut bars = Vec::new();
        for s in 0..num_symbols {
            bars.extend(make_bars(&format!("SYM{s}"), 1260));
        }

        group.bench_with_input(
            BenchmarkId::new("drain", num_symbols),
            &num_symbols,
            |b, _| {
                b.iter(|| {
                    let mut scheduler = ReplayScheduler::new(
                        Box::new(StoreSnapshotSource::from_bars(bars.clone())),
                        FeedConfig::default(),
                    );
                    scheduler.subscribe_all().unwrap();
                    let mut count = 0usize;
                    while let Some(event) = scheduler.next_event().unwrap() {
                        black_box(event.timestamp());
                        count += 1;
                    }
                    black_box(count)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_bar_loop, bench_scheduler_merge);
criterion_main!(benches);
