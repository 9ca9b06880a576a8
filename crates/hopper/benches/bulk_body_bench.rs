//! 🧪 Benchmarks for bulk body rendering — the one hot loop every document
//! passes through on its way to the cluster.
//!
//! Two shapes measured: the opaque path (no id field, records never parsed)
//! and the id-extraction path (every record parsed once). The gap between
//! them is the price of stable document ids. Spoiler: it's not free.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use hopper::bulk::render_bulk_body;

fn synthetic_records(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            format!(
                r#"{{"id":"doc-{i}","title":"record number {i}","score":{i},"tags":["bulk","bench"]}}"#
            )
        })
        .collect()
}

fn bench_render_bulk_body(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_bulk_body");

    for &batch_size in &[100usize, 1000] {
        let records = synthetic_records(batch_size);
        group.throughput(Throughput::Elements(batch_size as u64));

        // 📦 opaque path: records fly through unparsed
        group.bench_with_input(
            BenchmarkId::new("opaque", batch_size),
            &records,
            |b, records| {
                b.iter(|| {
                    render_bulk_body(black_box(records), "docs", "default", None)
                        .expect("render should not fail")
                })
            },
        );

        // 📎 id path: one JSON parse per record, ids stamped on action lines
        group.bench_with_input(
            BenchmarkId::new("id_extraction", batch_size),
            &records,
            |b, records| {
                b.iter(|| {
                    render_bulk_body(black_box(records), "docs", "default", Some("id"))
                        .expect("render should not fail")
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_render_bulk_body);
criterion_main!(benches);
