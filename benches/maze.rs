//! Criterion benchmarks for maze generation, solving and encoding.
//!
//! Run with:
//!   cargo bench
//!   cargo bench --features parallel
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use maze3d::config::RunConfig;
use maze3d::controller::NavigationMode;
use maze3d::evaluate::evaluate;
use maze3d::prelude::*;

const SIZES: [usize; 4] = [11, 21, 31, 51];

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");

    for size in SIZES.iter() {
        group.throughput(Throughput::Elements((size * size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut seed = 0u64;
            b.iter(|| {
                seed += 1;
                let mut rng = Prng::new(seed);
                black_box(generate(Dims::new(size, size, size), &mut rng).open_count())
            });
        });
    }

    group.finish();
}

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");

    for size in SIZES.iter() {
        let mut rng = Prng::new(7);
        let layout = generate_layout(Dims::new(*size, *size, *size), GoalRule::Farthest, &mut rng);
        group.bench_with_input(BenchmarkId::from_parameter(size), &layout, |b, layout| {
            b.iter(|| black_box(solve(&layout.grid, layout.start, layout.goal).len()));
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut rng = Prng::new(3);
    let layout = generate_layout(Dims::new(11, 11, 5), GoalRule::Farthest, &mut rng);
    let episode = Episode::from_layout(layout, EpisodeParams::default());

    let mut group = c.benchmark_group("encode");
    for profile in [ObservationProfile::Flags, ObservationProfile::Spatial] {
        group.bench_function(profile.name(), |b| {
            b.iter(|| black_box(encode(&episode, profile)))
        });
    }
    group.finish();
}

fn bench_q_network(c: &mut Criterion) {
    let net = QNetworkPolicy::random(256, 1);
    let obs = Observation([0.5; OBS_LEN]);
    c.bench_function("q_network_256", |b| {
        b.iter(|| black_box(net.choose_action(&obs)))
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let config = RunConfig {
        seed: Some(11),
        mode: NavigationMode::Policy,
        ..RunConfig::default()
    };
    c.bench_function("evaluate_goal_seeking_16", |b| {
        b.iter(|| black_box(evaluate(&config, &GoalSeekingPolicy, 16).mean_reward()))
    });
}

criterion_group!(
    benches,
    bench_generate,
    bench_solve,
    bench_encode,
    bench_q_network,
    bench_evaluate
);
criterion_main!(benches);
