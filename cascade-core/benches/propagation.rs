//! Criterion benchmarks for wave propagation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use cascade_core::{Clock, ClockConfig, Stream};

/// A straight chain of `depth` maps.
fn chain(depth: usize) -> (Stream<u64>, Stream<u64>) {
    let source = Stream::orphan();
    let mut tail = source.clone();
    for _ in 0..depth {
        tail = tail.map(|x: &u64| x.wrapping_add(1));
    }
    (source, tail)
}

/// `width` maps fanned out from one source and joined again.
fn diamond(width: usize) -> (Stream<u64>, Stream<u64>) {
    let source = Stream::orphan();
    let branches: Vec<Stream<u64>> = (0..width as u64)
        .map(|i| source.map(move |x: &u64| x.wrapping_mul(i)))
        .collect();
    let join = Stream::subscribe_many(&branches, |inputs| {
        Ok(Some(inputs.values().iter().flatten().fold(0u64, |a, b| a.wrapping_add(*b))))
    });
    (source, join)
}

fn bench_orphan_waves(c: &mut Criterion) {
    let mut group = c.benchmark_group("orphan_wave");

    for depth in [10, 100] {
        let (source, tail) = chain(depth);
        group.bench_with_input(BenchmarkId::new("chain", depth), &depth, |b, _| {
            let mut x = 0u64;
            b.iter(|| {
                x += 1;
                source.inject(black_box(x)).unwrap();
                black_box(tail.value())
            });
        });
    }

    for width in [10, 100] {
        let (source, join) = diamond(width);
        group.bench_with_input(BenchmarkId::new("diamond", width), &width, |b, _| {
            let mut x = 0u64;
            b.iter(|| {
                x += 1;
                source.inject(black_box(x)).unwrap();
                black_box(join.value())
            });
        });
    }

    group.finish();
}

fn bench_clock_throughput(c: &mut Criterion) {
    let clock = Clock::<u64>::manual(ClockConfig::named("bench")).unwrap();
    let source = clock.source::<u64>();
    let tail = source.map(|x: &u64| x + 1).map(|x: &u64| x * 2);

    c.bench_function("clock_1000_events_then_flush", |b| {
        b.iter(|| {
            for x in 0..1000u64 {
                source.inject(x).unwrap();
            }
            clock.flush().unwrap();
            black_box(tail.value())
        });
    });
}

criterion_group!(benches, bench_orphan_waves, bench_clock_throughput);
criterion_main!(benches);
