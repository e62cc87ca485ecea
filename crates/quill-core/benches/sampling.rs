//! Benchmarks for the per-step sampling policy
//!
//! Every decode step runs the full filter chain over a vocabulary-sized logit
//! vector, so these measure the per-token overhead outside the model.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quill_core::config::GenerationConfig;
use quill_core::sampling::{apply_repetition_penalty, apply_top_k, apply_top_p, softmax, Sampler};

/// Generate test logits
fn generate_logits(size: usize) -> Vec<f32> {
    (0..size).map(|i| (i as f32 * 0.37) % 10.0 - 5.0).collect()
}

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("filters");
    let context: Vec<u32> = (0..256).map(|i| i * 7).collect();

    for &size in &[1024usize, 32_000, 50_257] {
        let logits = generate_logits(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("top_k_40", size), &logits, |b, logits| {
            b.iter(|| {
                let mut l = logits.clone();
                apply_top_k(black_box(&mut l), 40);
                l
            })
        });

        group.bench_with_input(BenchmarkId::new("top_p_0.9", size), &logits, |b, logits| {
            b.iter(|| {
                let mut l = logits.clone();
                apply_top_p(black_box(&mut l), 0.9);
                l
            })
        });

        group.bench_with_input(BenchmarkId::new("repetition_penalty", size), &logits, |b, logits| {
            b.iter(|| {
                let mut l = logits.clone();
                apply_repetition_penalty(black_box(&mut l), &context, 1.2);
                l
            })
        });

        group.bench_with_input(BenchmarkId::new("softmax", size), &logits, |b, logits| {
            b.iter(|| softmax(black_box(logits)))
        });
    }

    group.finish();
}

fn bench_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample");
    let logits = generate_logits(50_257);
    let context: Vec<u32> = (0..64).collect();

    let configs = [
        ("defaults", GenerationConfig::default()),
        (
            "top_k_and_penalty",
            GenerationConfig {
                top_k: 40,
                repetition_penalty: 1.2,
                temperature: 0.7,
                ..Default::default()
            },
        ),
    ];

    for (name, config) in &configs {
        let mut sampler = Sampler::new(42);
        group.bench_function(*name, |b| {
            b.iter(|| sampler.sample(black_box(&logits), &context, config))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filters, bench_sample);
criterion_main!(benches);
