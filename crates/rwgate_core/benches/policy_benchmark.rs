//! Benchmark for uncontended acquire/release cost per policy.
//!
//! Run with: cargo bench --package rwgate_core --bench policy_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rwgate_core::{plan_roles, Policy, Role, SharedState};

fn benchmark_read_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_cycle");
    for policy in Policy::ALL {
        let state = SharedState::new();
        group.bench_function(policy.name(), |b| {
            b.iter(|| {
                let access = policy.acquire(black_box(Role::Reader), &state);
                drop(access);
            });
        });
    }
    group.finish();
}

fn benchmark_write_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_cycle");
    for policy in Policy::ALL {
        let state = SharedState::new();
        group.bench_function(policy.name(), |b| {
            b.iter(|| {
                let access = policy.acquire(black_box(Role::Writer), &state);
                drop(access);
            });
        });
    }
    group.finish();
}

fn benchmark_role_plan(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    c.bench_function("plan_roles_1000x1000", |b| {
        b.iter(|| plan_roles(black_box(1000), black_box(1000), &mut rng));
    });
}

criterion_group!(benches, benchmark_read_cycle, benchmark_write_cycle, benchmark_role_plan);
criterion_main!(benches);
