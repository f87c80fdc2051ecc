use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pulse_animation::Oscillator;

fn bench_sampling(c: &mut Criterion) {
    let mut oscillator = Oscillator::new(0.5, 0.3, 0.0);
    oscillator.retarget(0.0, 100.0);

    c.bench_function("oscillator_value_at", |b| {
        b.iter(|| black_box(oscillator.value_at(black_box(0.12))))
    });
    c.bench_function("oscillator_velocity_at", |b| {
        b.iter(|| black_box(oscillator.velocity_at(black_box(0.12))))
    });
}

fn bench_rehydration(c: &mut Criterion) {
    c.bench_function("oscillator_retarget", |b| {
        b.iter(|| {
            let mut oscillator = Oscillator::new(0.5, 0.3, 0.0);
            oscillator.retarget(0.0, 100.0);
            oscillator.retarget(black_box(0.05), black_box(42.0));
            black_box(oscillator.value_at(0.01))
        })
    });
}

fn bench_settle(c: &mut Criterion) {
    c.bench_function("oscillator_settle_60fps", |b| {
        b.iter(|| {
            let mut oscillator = Oscillator::new(1.0, 0.3, 0.0);
            oscillator.retarget(0.0, black_box(100.0));
            let mut t = 0.0;
            while (oscillator.value_at(t) - 100.0).abs() + oscillator.velocity_at(t).abs() > 1e-3 {
                t += 1.0 / 60.0;
            }
            black_box(t)
        })
    });
}

criterion_group!(benches, bench_sampling, bench_rehydration, bench_settle);
criterion_main!(benches);
