use criterion::{criterion_group, criterion_main, Criterion};
use textdex_core::config::VectorizerConfig;
use textdex_core::tokenizer::analyze;
use textdex_core::vectorizer::fit;

const WORDS: &[&str] = &[
    "service", "staff", "friendly", "rude", "pizza", "pasta", "delivery", "late", "cold", "fresh",
    "price", "cheap", "waited", "table", "manager", "order", "wrong", "tasty", "clean", "noisy",
];

fn corpus(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| (0..12).map(|j| WORDS[(i * 7 + j * 3) % WORDS.len()]).collect::<Vec<_>>().join(" "))
        .collect()
}

fn bench_analyze(c: &mut Criterion) {
    let cfg = VectorizerConfig::default();
    let text = corpus(1).remove(0);
    c.bench_function("analyze_review", |b| b.iter(|| analyze(&text, &cfg)));
}

fn bench_fit(c: &mut Criterion) {
    let cfg = VectorizerConfig::default();
    let texts = corpus(2_000);
    c.bench_function("fit_2000_reviews", |b| b.iter(|| fit(&texts, &cfg)));
}

criterion_group!(benches, bench_analyze, bench_fit);
criterion_main!(benches);
