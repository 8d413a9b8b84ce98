//! # DenseSet Benchmark
//!
//! Add/remove/contains cost and enumeration with removal, against the O(1)
//! claims of the collection.
//!
//! Run with: `cargo bench --package orrery_core --bench dense_set_benchmark`

// Benchmarks don't need docs
#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use orrery_core::DenseSet;

const SIZES: [u32; 3] = [100, 10_000, 100_000];

fn filled(count: u32) -> DenseSet<u32> {
    (0..count).collect()
}

/// Benchmark: Fill an empty set.
fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_set_add");

    for count in SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut set = DenseSet::with_capacity(count as usize);
                for value in 0..count {
                    set.add(value);
                }
                black_box(set.len())
            });
        });
    }

    group.finish();
}

/// Benchmark: Membership checks on a full set.
fn bench_contains(c: &mut Criterion) {
    let set = filled(100_000);
    let mut probe = 0u32;

    c.bench_function("dense_set_contains_100k", |b| {
        b.iter(|| {
            probe = probe.wrapping_add(7919) % 200_000;
            black_box(set.contains(&probe))
        });
    });
}

/// Benchmark: Remove every other element.
fn bench_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_set_remove_half");

    for count in SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || filled(count),
                |mut set| {
                    for value in (0..count).step_by(2) {
                        set.remove(&value);
                    }
                    set
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Benchmark: Enumerate while every visited element removes itself.
fn bench_enumerate_with_removal(c: &mut Criterion) {
    c.bench_function("dense_set_enumerate_self_remove_10k", |b| {
        b.iter_batched(
            || filled(10_000),
            |mut set| {
                let result = set.enumerate_with(|set, value| {
                    set.remove(&value);
                });
                black_box(result.is_ok());
                set
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_add,
    bench_contains,
    bench_remove,
    bench_enumerate_with_removal,
);

criterion_main!(benches);
