use batch::{BatchHandler, BatchTarget, CommitPipeline, WriteBatch};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

const N_RECORDS: usize = 1_000;
const VALUE_SIZE: usize = 100;

fn build_batch() -> WriteBatch {
    let mut b = WriteBatch::new();
    for i in 0..N_RECORDS {
        b.put(format!("key{:06}", i).as_bytes(), &vec![b'x'; VALUE_SIZE]);
    }
    b
}

struct NullTarget;

impl BatchTarget for NullTarget {
    fn insert(&self, _internal_key: &[u8], _value: &[u8]) {}
}

struct CountingHandler {
    records: usize,
}

impl BatchHandler for CountingHandler {
    fn put(&mut self, _key: &[u8], _value: &[u8]) {
        self.records += 1;
    }

    fn delete(&mut self, _key: &[u8]) {
        self.records += 1;
    }
}

fn append_benchmark(c: &mut Criterion) {
    c.bench_function("batch_append_1k_puts", |b| {
        b.iter(build_batch);
    });
}

fn iterate_benchmark(c: &mut Criterion) {
    let batch = build_batch();
    c.bench_function("batch_iterate_1k", |b| {
        b.iter(|| {
            let mut handler = CountingHandler { records: 0 };
            batch.iterate(&mut handler).unwrap();
            handler.records
        });
    });
}

fn commit_benchmark(c: &mut Criterion) {
    c.bench_function("batch_commit_1k", |b| {
        b.iter_batched(
            || (CommitPipeline::new(0), build_batch()),
            |(pipeline, mut batch)| {
                pipeline.commit(&mut batch, &NullTarget).unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, append_benchmark, iterate_benchmark, commit_benchmark);
criterion_main!(benches);
