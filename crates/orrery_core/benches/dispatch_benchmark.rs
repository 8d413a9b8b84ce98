//! # Phase Dispatch Benchmark
//!
//! Throughput of `run_phase` over declared and undeclared buckets, and the
//! cost of registrants that unregister themselves mid-dispatch.
//!
//! Run with: `cargo bench --package orrery_core --bench dispatch_benchmark`

// Benchmarks don't need docs and may have intentionally unused code
#![allow(missing_docs)]
#![allow(dead_code)]

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use orrery_core::{Controlled, ControlledHandle, Phase, PhaseContext, PhaseDispatcher, PhaseSet, TypeKey};

/// Registrant with a trivial update.
struct Orbiter {
    angle: f32,
}

impl Controlled for Orbiter {
    fn phases(&self) -> PhaseSet {
        PhaseSet::only(Phase::Update).with(Phase::FixedUpdate)
    }

    fn update(&mut self, ctx: &PhaseContext<'_>) {
        self.angle += ctx.delta_time();
    }

    fn fixed_update(&mut self, ctx: &PhaseContext<'_>) {
        self.angle -= ctx.delta_time();
    }
}

/// Registrant of a type left out of the declared order.
struct Drifter;

impl Controlled for Drifter {
    fn phases(&self) -> PhaseSet {
        PhaseSet::only(Phase::Update)
    }
}

/// Registrant that leaves on its first update.
struct Expiring;

impl Controlled for Expiring {
    fn phases(&self) -> PhaseSet {
        PhaseSet::only(Phase::Update)
    }

    fn update(&mut self, ctx: &PhaseContext<'_>) {
        ctx.unregister_self();
    }
}

fn dispatcher_with(count: usize) -> PhaseDispatcher {
    let dispatcher = PhaseDispatcher::new("bench", [TypeKey::of::<Orbiter>(), TypeKey::of::<Expiring>()]);
    for _ in 0..count {
        dispatcher.register(&ControlledHandle::new(Orbiter { angle: 0.0 }));
    }
    dispatcher
}

/// Benchmark: One Update phase over declared registrants.
fn bench_run_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_phase_update");

    for count in [100, 1_000, 10_000] {
        let dispatcher = dispatcher_with(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(dispatcher.run_phase(Phase::Update, 0.016)));
        });
    }

    group.finish();
}

/// Benchmark: Declared plus undeclared registrants.
fn bench_run_mixed(c: &mut Criterion) {
    let dispatcher = dispatcher_with(1_000);
    for _ in 0..1_000 {
        dispatcher.register(&ControlledHandle::new(Drifter));
    }

    c.bench_function("run_phase_mixed_2k", |b| {
        b.iter(|| black_box(dispatcher.run_phase(Phase::Update, 0.016)));
    });
}

/// Benchmark: Every registrant unregisters itself during the phase.
fn bench_self_unregister(c: &mut Criterion) {
    c.bench_function("run_phase_self_unregister_1k", |b| {
        b.iter_batched(
            || {
                let dispatcher = dispatcher_with(0);
                for _ in 0..1_000 {
                    dispatcher.register(&ControlledHandle::new(Expiring));
                }
                dispatcher
            },
            |dispatcher| {
                black_box(dispatcher.run_phase(Phase::Update, 0.016));
                dispatcher
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_run_update, bench_run_mixed, bench_self_unregister);

criterion_main!(benches);
