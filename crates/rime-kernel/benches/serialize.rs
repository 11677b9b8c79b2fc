//! Domain serialisation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rime_kernel::{invert_response, CrystalDomain, SimulationParameters, DEFAULT_RADIUS, MAX_RADIUS};

fn bench_serialize(c: &mut Criterion) {
    let params = SimulationParameters::default();
    let mut group = c.benchmark_group("domain_serialize");
    for radius in [DEFAULT_RADIUS, MAX_RADIUS] {
        let domain = CrystalDomain::new(radius, &params);
        group.bench_with_input(BenchmarkId::from_parameter(radius), &domain, |b, domain| {
            b.iter(|| black_box(domain.serialize()));
        });
    }
    group.finish();
}

fn bench_invert_response(c: &mut Criterion) {
    c.bench_function("invert_response", |b| {
        b.iter(|| invert_response(black_box(0.4)));
    });
}

criterion_group!(benches, bench_serialize, bench_invert_response);
criterion_main!(benches);
