//! Benchmarks for the directive pipeline.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pyacc::utils::source::SourceText;

/// A function with `n` independent annotated loop nests inside one data region.
fn synthetic_function(n: usize) -> String {
    let mut lines = vec![
        "def kernel(a, b, n):".to_string(),
        "    # acc data copyin(a) copyout(b)".to_string(),
        "    #{".to_string(),
    ];
    for k in 0..n {
        lines.push(format!("    s{} = 0", k));
        lines.push(format!("    # acc parallel loop collapse(2) reduction(+: s{})", k));
        lines.push(format!("    for i{} in range(n):", k));
        lines.push(format!("        for j{} in range(n):", k));
        lines.push(format!("            s{} += a[i{}][j{}]", k, k, k));
        lines.push(format!("    b[{}] = s{}", k, k));
    }
    lines.push("    #}".to_string());
    lines.push("    return b".to_string());
    lines.join("\n")
}

/// Benchmark annotation scanning alone.
fn bench_scanning(c: &mut Criterion) {
    let source = synthetic_function(50);
    let text = SourceText::new(&source);
    let scanner = pyacc::frontend::Scanner::new();

    c.bench_function("scan_50_nests", |b| {
        b.iter(|| scanner.scan(black_box(&text)).count())
    });
}

/// Benchmark scanning, clause parsing and tree building.
fn bench_parsing(c: &mut Criterion) {
    let source = synthetic_function(50);

    c.bench_function("parse_50_nests", |b| {
        b.iter(|| pyacc::frontend::parse(black_box(&source)).unwrap())
    });
}

/// Benchmark the full pipeline through the host backend.
fn bench_compile(c: &mut Criterion) {
    let source = synthetic_function(20);
    let config = pyacc::CompileConfig::default();

    c.bench_function("compile_20_nests", |b| {
        b.iter(|| pyacc::compile_function(black_box(&source), &config).unwrap())
    });
}

criterion_group!(benches, bench_scanning, bench_parsing, bench_compile);
criterion_main!(benches);
