use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sentiforge_core::text::{LookupTable, Tokenizer, VocabularyBuilder};
use sentiforge_core::{BatchEncoder, Dataset, Record};

fn corpus() -> Dataset {
    let reviews = [
        "Great movie!! 10/10, would watch again.",
        "Terrible pacing<br /><br />and a plot that goes nowhere.",
        "The cast was brilliant but the script let them down.",
        "I don't think I've laughed this hard in years!",
        "Boring, predictable and far too long.",
    ];
    (0..2_000)
        .map(|i| Record::new(reviews[i % reviews.len()], (i % 2) as u8))
        .collect::<Vec<_>>()
        .into()
}

fn bench_encoding(c: &mut Criterion) {
    let dataset = corpus();
    let tokenizer = Tokenizer::new();
    let vocabulary = VocabularyBuilder::new(1_000).build_from_dataset(&dataset, &tokenizer, 32);
    let table = Arc::new(LookupTable::new(&vocabulary, 100));
    let encoder = BatchEncoder::new(tokenizer, table, 32).unwrap();

    c.bench_function("tokenize_single", |b| {
        b.iter(|| tokenizer.tokenize(black_box("Great movie!! 10/10, would watch again.")));
    });

    c.bench_function("vocabulary_2000", |b| {
        b.iter(|| {
            VocabularyBuilder::new(1_000).build_from_dataset(black_box(&dataset), &tokenizer, 32)
        });
    });

    c.bench_function("encode_sequential_2000", |b| {
        b.iter(|| encoder.batches(black_box(&dataset)).count());
    });

    c.bench_function("encode_parallel_2000", |b| {
        b.iter(|| encoder.encode_parallel(black_box(&dataset)).len());
    });
}

criterion_group!(benches, bench_encoding);
criterion_main!(benches);
