//! Benchmarks for the influence-region engine and the drivers built on it.
//!
//! Measures the cost of:
//! - Error-driven refinement as the point count grows
//! - Point location during refinement
//! - Decimation of an already-refined mesh

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use terra_mt::driver::decimate::{DecimateConfig, DecimateDriver};
use terra_mt::driver::refine::{RefineConfig, RefineDriver};
use terra_mt::history::{Norm, Termination};
use terra_mt::util::generate_seeded_points;

fn refine_config() -> RefineConfig {
    RefineConfig {
        constrained: false,
        random: false,
        norm: Norm::Max,
        termination: Termination::UpdateCount(None),
        seed: 42,
    }
}

fn bench_refinement(c: &mut Criterion) {
    let mut group = c.benchmark_group("refinement");

    for point_count in [50, 100, 250, 500] {
        group.throughput(Throughput::Elements(u64::try_from(point_count).unwrap()));
        group.bench_with_input(
            BenchmarkId::new("error_driven", point_count),
            &point_count,
            |b, &point_count| {
                let points = generate_seeded_points(
                    point_count as usize,
                    (0.0, 100.0),
                    (0.0, 100.0),
                    1,
                )
                .unwrap();
                b.iter(|| {
                    let mut driver = RefineDriver::build(&points, &[], &refine_config()).unwrap();
                    driver.run_to_completion().unwrap();
                    black_box(driver.store().vertex_count())
                });
            },
        );
    }
    group.finish();
}

fn bench_decimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("decimation");

    for point_count in [100, 300, 600] {
        group.throughput(Throughput::Elements(u64::try_from(point_count).unwrap()));
        group.bench_with_input(
            BenchmarkId::new("error_driven", point_count),
            &point_count,
            |b, &point_count| {
                let points = generate_seeded_points(
                    point_count as usize,
                    (0.0, 100.0),
                    (0.0, 100.0),
                    2,
                )
                .unwrap();
                let mut refine = RefineDriver::build(&points, &[], &refine_config()).unwrap();
                refine.run_to_completion().unwrap();
                let (store, _) = refine.into_parts();

                b.iter_batched(
                    || store.clone(),
                    |store| {
                        let config = DecimateConfig {
                            max_degree: 64,
                            allow_features_del: true,
                            allow_chain_brk: true,
                            simultaneous: false,
                        };
                        let mut driver =
                            DecimateDriver::build(store, config, Norm::Max, Termination::UpdateCount(Some(20)))
                                .unwrap();
                        driver.run_to_completion().unwrap();
                        black_box(driver.store().vertex_count())
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_refinement, bench_decimation);
criterion_main!(benches);
