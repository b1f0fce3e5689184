//! Criterion microbenches for the export hot path.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the performance of:
//! - Example encoding (ExampleRecord -> protobuf bytes)
//! - TFRecord framing with masked CRC32C
//! - Record reading with CRC verification
//! - Label resolution

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use camtrap::labels::{LabelMap, LabelResolver};
use camtrap::tfrecord::{BoxRecord, ExampleRecord, RecordReader, RecordWriter, JPEG_FORMAT};

/// A record shaped like a typical camera-trap frame: a 200 KB image, a few boxes.
fn sample_record() -> ExampleRecord {
    let boxes = (0..4)
        .map(|i| BoxRecord {
            xmin: 0.1 * i as f32,
            ymin: 0.05,
            xmax: 0.1 * i as f32 + 0.08,
            ymax: 0.4,
            class_id: i + 1,
            class_text: format!("Species{i}"),
            truncated: 0,
            occluded: i % 2,
            difficult: 0,
        })
        .collect();

    ExampleRecord {
        width: 2048,
        height: 1536,
        filename: Some("cam01/IMG_0001.JPG".to_string()),
        source_id: Some("cam01/IMG_0001.JPG".to_string()),
        sha256: "ab".repeat(32),
        encoded: (0..200 * 1024).map(|i| (i % 251) as u8).collect(),
        format: JPEG_FORMAT.to_string(),
        boxes,
    }
}

/// Benchmark protobuf encoding of one example.
fn bench_example_encode(c: &mut Criterion) {
    let record = sample_record();
    let mut group = c.benchmark_group("example");
    group.throughput(Throughput::Bytes(record.encoded.len() as u64));

    group.bench_function("encode", |b| {
        b.iter(|| black_box(black_box(&record).encode()))
    });

    let bytes = record.encode();
    group.bench_function("decode", |b| {
        b.iter(|| black_box(ExampleRecord::decode(black_box(&bytes)).unwrap()))
    });

    group.finish();
}

/// Benchmark framing and reading back a batch of records in memory.
fn bench_tfrecord_framing(c: &mut Criterion) {
    let payload = sample_record().encode();
    let batch = 16;
    let mut group = c.benchmark_group("tfrecord");
    group.throughput(Throughput::Bytes((payload.len() * batch) as u64));

    group.bench_function("write", |b| {
        b.iter(|| {
            let mut writer = RecordWriter::new(Vec::with_capacity(payload.len() * batch + 256));
            for _ in 0..batch {
                writer.write_record(black_box(&payload)).unwrap();
            }
            black_box(writer.finish().unwrap())
        })
    });

    let mut writer = RecordWriter::new(Vec::new());
    for _ in 0..batch {
        writer.write_record(&payload).unwrap();
    }
    let framed = writer.finish().unwrap();

    group.bench_function("read", |b| {
        b.iter(|| {
            let count = RecordReader::new(black_box(framed.as_slice()), "bench.record")
                .map(|r| r.unwrap().len())
                .sum::<usize>();
            black_box(count)
        })
    });

    group.finish();
}

/// Benchmark label lookups against a realistic species map.
fn bench_label_resolution(c: &mut Criterion) {
    let mut pairs: Vec<(String, String)> = (0..60)
        .map(|i| (format!("species_{i}"), format!("Species {i}")))
        .collect();
    pairs.push(("Human".to_string(), "exclude".to_string()));
    pairs.push(("Vehicle".to_string(), "exclude".to_string()));
    let map = LabelMap::from_pairs(pairs);
    let resolver = LabelResolver::new(&map);
    let queries: Vec<String> = (0..64).map(|i| format!("species_{}", i % 62)).collect();

    c.bench_function("label_resolve", |b| {
        b.iter(|| {
            let hits = queries
                .iter()
                .filter(|q| resolver.resolve(black_box(q)).is_some())
                .count();
            black_box(hits)
        })
    });
}

criterion_group!(
    benches,
    bench_example_encode,
    bench_tfrecord_framing,
    bench_label_resolution,
);
criterion_main!(benches);
