use criterion::{criterion_group, criterion_main, Criterion};
use mdsearch_core::chunker::chunk_markdown;
use mdsearch_core::tokenizer::tokenize;

fn sample() -> String {
    (0..400)
        .map(|i| format!("Section {i} explains how the cache evicts stale entries. Lookups stay fast.\n\n"))
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    let text = sample();
    c.bench_function("tokenize_sample", |b| b.iter(|| tokenize(&text)));
}

fn bench_chunk(c: &mut Criterion) {
    let text = sample();
    c.bench_function("chunk_sample", |b| b.iter(|| chunk_markdown(&text, 500, 100)));
}

criterion_group!(benches, bench_tokenize, bench_chunk);
criterion_main!(benches);
