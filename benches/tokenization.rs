use cpai::utils::tokens::{TokenCounter, Tokenizer, count_tokens};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

fn count_tokens_benchmark(c: &mut Criterion) {
    let small_content = "fn main() { println!(\"Hello, world!\"); }";
    let medium_content = small_content.repeat(100);
    let large_content = small_content.repeat(1000);

    let mut group = c.benchmark_group("tokenization");

    group.throughput(Throughput::Bytes(small_content.len() as u64));
    group.bench_function("small_40b", |b| b.iter(|| count_tokens(black_box(small_content))));

    group.throughput(Throughput::Bytes(medium_content.len() as u64));
    group.bench_function("medium_4kb", |b| b.iter(|| count_tokens(black_box(&medium_content))));

    group.throughput(Throughput::Bytes(large_content.len() as u64));
    group.bench_function("large_40kb", |b| b.iter(|| count_tokens(black_box(&large_content))));

    group.finish();
}

fn encoding_benchmark(c: &mut Criterion) {
    let content = "pub fn add(a: i32, b: i32) -> i32 { a + b }\n".repeat(200);
    let mut group = c.benchmark_group("encodings");
    for encoding in ["o200k_base", "cl100k_base"] {
        let tokenizer = Tokenizer::acquire(encoding).unwrap();
        group.bench_function(encoding, |b| b.iter(|| tokenizer.count(black_box(&content))));
    }
    group.finish();
}

fn parallel_tokenization_benchmark(c: &mut Criterion) {
    use rayon::prelude::*;

    let files: Vec<String> = (0..100)
        .map(|i| format!("fn file{}() {{ println!(\"content {}\"); }}", i, i).repeat(50))
        .collect();
    let tokenizer = Tokenizer::acquire("o200k_base").unwrap();

    let mut group = c.benchmark_group("parallel_tokenization");

    group.bench_function("sequential", |b| {
        b.iter(|| files.iter().map(|f| tokenizer.count(f)).sum::<usize>())
    });

    group.bench_function("parallel_rayon", |b| {
        b.iter(|| files.par_iter().map(|f| tokenizer.count(f)).sum::<usize>())
    });

    group.finish();
}

criterion_group!(
    benches,
    count_tokens_benchmark,
    encoding_benchmark,
    parallel_tokenization_benchmark
);
criterion_main!(benches);
