//! Benchmarks for transcc hot paths.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use transcc::core::verify::Comparator;
use transcc::core::{digest, fence, parser};

/// A fenced C++ reply of roughly `lines` lines.
fn reply(lines: usize) -> String {
    let mut s = String::from("```cpp\n#include <iostream>\nint main() {\n");
    for i in 0..lines {
        s.push_str(&format!("    std::cout << {} << std::endl;\n", i));
    }
    s.push_str("}\n```");
    s
}

/// Every streamed snapshot is stripped again in full, so total work grows
/// with the square of the reply length.
fn bench_fence_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("fence_stream");
    for lines in [16, 128, 512] {
        let full = reply(lines);
        let snapshots: Vec<&str> = full
            .char_indices()
            .filter(|(_, ch)| *ch == '\n')
            .map(|(i, _)| &full[..=i])
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(lines), &snapshots, |b, snaps| {
            b.iter(|| {
                for snap in snaps {
                    black_box(fence::strip(black_box(snap)));
                }
            });
        });
    }
    group.finish();
}

fn bench_fence_single(c: &mut Criterion) {
    let text = reply(512);
    c.bench_function("fence_strip_512_lines", |b| {
        b.iter(|| black_box(fence::strip(black_box(&text))));
    });
}

fn bench_hash_lines(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_lines");
    for count in [10, 1000, 10000] {
        let lines: Vec<String> = (0..count).map(|i| format!("line {}: {}", i, i * 7)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &lines, |b, lines| {
            b.iter(|| black_box(digest::hash_lines(lines.iter().map(String::as_str))));
        });
    }
    group.finish();
}

fn bench_compare(c: &mut Criterion) {
    let comparator = Comparator::new(&["(?i)^execution time".to_string()]).unwrap();
    let mut out: String = (0..2000).map(|i| format!("value {}\n", i)).collect();
    out.push_str("Execution Time: 1.234 seconds\n");
    c.bench_function("compare_2000_lines", |b| {
        b.iter(|| black_box(comparator.compare_output(black_box(&out), black_box(&out))));
    });
}

fn bench_yaml_parse(c: &mut Criterion) {
    let yaml = r#"
version: "1.0"
backends:
  gpt:
    model: gpt-4o
    base_url: https://api.openai.com/v1
    api_key_env: OPENAI_API_KEY
toolchain:
  compilers: [g++, clang++]
  flags: [-O3, -march=native]
compare:
  ignore_lines: ["(?i)^execution time", "^elapsed"]
"#;
    c.bench_function("yaml_parse", |b| {
        b.iter(|| {
            let config = parser::parse_config(black_box(yaml)).unwrap();
            black_box(parser::validate_config(&config));
        });
    });
}

criterion_group!(
    benches,
    bench_fence_stream,
    bench_fence_single,
    bench_hash_lines,
    bench_compare,
    bench_yaml_parse
);
criterion_main!(benches);
