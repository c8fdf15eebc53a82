//! Benchmarks for payload building
//!
//! Run with: cargo bench

use bytecast::network::payload::{build_hex, build_literal, to_hex, unescape, Terminator};
use bytecast::variables::{VariableStore, VariableValue};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn benchmark_unescape(c: &mut Criterion) {
    c.bench_function("unescape_plain", |b| {
        b.iter(|| black_box(unescape(black_box("PWR ON INPUT HDMI1"))))
    });

    c.bench_function("unescape_escaped", |b| {
        b.iter(|| black_box(unescape(black_box("%02PWR%20ON%03%u00FF%zz"))))
    });
}

fn benchmark_literal(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_literal");

    for end in Terminator::all() {
        group.bench_with_input(BenchmarkId::from_parameter(end.name()), &end, |b, &end| {
            b.iter(|| black_box(build_literal(black_box("%FEVOL 35%0D"), end)))
        });
    }

    group.finish();
}

fn benchmark_hex(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_hex");

    for size in [4usize, 64, 1024].iter() {
        let digits: String = (0..*size).map(|i| format!("{:02x}", i % 256)).collect();
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &digits, |b, digits| {
            b.iter(|| black_box(build_hex(black_box(digits), Terminator::CrLf)))
        });
    }

    group.finish();

    c.bench_function("to_hex_1024bytes", |b| {
        let data: Vec<u8> = (0..1024).map(|i| (i % 256) as u8).collect();
        b.iter(|| black_box(to_hex(&data)))
    });
}

fn benchmark_variables(c: &mut Criterion) {
    let mut store = VariableStore::new();
    store.set("custom", "input", VariableValue::Text("HDMI1".into()));
    store.set("custom", "volume", VariableValue::Text("35".into()));

    c.bench_function("parse_variables", |b| {
        b.iter(|| black_box(store.parse(black_box("IN $(custom:input) VOL $(custom:volume) $(x:y)"))))
    });
}

criterion_group!(
    benches,
    benchmark_unescape,
    benchmark_literal,
    benchmark_hex,
    benchmark_variables,
);

criterion_main!(benches);
