use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use upsidedown::core::config::Config;
use upsidedown::core::index::Index;
use upsidedown::core::types::{Document, Field, FieldValue};
use upsidedown::index::rows::{Row, RowCodec, TermFrequencyRow, TermVector};
use upsidedown::writer::batch::Batch;

/// Helper to create test documents
fn create_test_document(id: u64, content_size: usize) -> Document {
    let mut rng = rand::thread_rng();
    let words = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];
    let content: String = (0..content_size)
        .map(|_| words[rng.gen_range(0..words.len())])
        .collect::<Vec<_>>()
        .join(" ");

    Document::new(format!("doc_{}", id))
        .with_text("title", &format!("Document {}", id))
        .with_text("content", &content)
        .with_field(Field::new("score", FieldValue::Number(rng.gen_range(0.0..100.0))))
}

fn open_index() -> Index {
    let index = Index::new(Config::in_memory()).unwrap();
    index.open().unwrap();
    index
}

/// Benchmark single document update
fn bench_single_update(c: &mut Criterion) {
    let index = open_index();

    c.bench_function("single_document_update", |b| {
        let mut id = 0;
        b.iter(|| {
            index.update(create_test_document(id, 100)).unwrap();
            id += 1;
        });
    });
}

/// Re-indexing the same ids exercises the diff path
fn bench_reindex(c: &mut Criterion) {
    let index = open_index();
    for id in 0..100 {
        index.update(create_test_document(id, 100)).unwrap();
    }

    c.bench_function("reindex_existing_document", |b| {
        let mut id = 0;
        b.iter(|| {
            index.update(create_test_document(id % 100, 100)).unwrap();
            id += 1;
        });
    });
}

/// Benchmark batch indexing
fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_update");

    for batch_size in [10, 100, 500].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let index = open_index();
                let mut id_counter = 0u64;

                b.iter(|| {
                    let mut batch = Batch::new();
                    for _ in 0..batch_size {
                        batch.update(create_test_document(id_counter, 100));
                        id_counter += 1;
                    }
                    index.batch(&batch).unwrap();
                });
            },
        );
    }

    group.finish();
}

/// Row encoding into a reused buffer
fn bench_row_encoding(c: &mut Criterion) {
    let row = Row::TermFrequency(TermFrequencyRow::new(
        "quick",
        3,
        "doc_123456",
        4,
        0.25,
        (1..=4)
            .map(|pos| TermVector { field: 3, pos, start: pos * 6, end: pos * 6 + 5, array_positions: Vec::new() })
            .collect(),
    ));
    let mut buf = vec![0u8; row.key_size() + row.value_size()];

    c.bench_function("term_frequency_row_encode", |b| {
        b.iter(|| {
            let (key, value) = buf.split_at_mut(row.key_size());
            black_box(row.key_to(key).unwrap());
            black_box(row.value_to(value).unwrap());
        });
    });
}

fn bench_reader(c: &mut Criterion) {
    let index = open_index();
    for id in 0..1000 {
        index.update(create_test_document(id, 50)).unwrap();
    }

    c.bench_function("term_field_reader_scan", |b| {
        b.iter(|| {
            let reader = index.reader().unwrap();
            let mut postings = reader.term_field_reader("fox", "content").unwrap();
            let mut n = 0;
            while postings.next().is_some() {
                n += 1;
            }
            black_box(n);
        });
    });
}

criterion_group!(benches, bench_single_update, bench_reindex, bench_batch, bench_row_encoding, bench_reader);
criterion_main!(benches);
