//! Live filter benchmarks: incremental maintenance against full refilters.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use livesync_bench::insert_batch;
use livesync_codec::DomainValue;
use livesync_core::{ClientConfig, Reconciler, RowOperation, TableUpdate};
use livesync_testkit::{message_row, simple_schema};
use livesync_view::{predicate, table_filter, Predicate, TableRow};

fn longer_than(n: usize) -> Predicate<TableRow> {
    predicate(move |row: &TableRow| {
        row.get("text")
            .and_then(DomainValue::as_str)
            .is_some_and(|text| text.len() > n)
    })
}

fn seeded(count: u32) -> Reconciler {
    let reconciler = Reconciler::new(
        simple_schema(),
        ClientConfig::new().with_primary_key("Message", "id"),
    )
    .unwrap();
    reconciler.apply(&[insert_batch(count)]).unwrap();
    reconciler
}

/// One inserted row, applied incrementally to a populated view.
fn bench_incremental_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_incremental_insert");

    for count in [1_000u32, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let reconciler = seeded(count);
            let view = table_filter(
                Arc::clone(reconciler.store()),
                Arc::clone(reconciler.feed()),
                "Message",
                Some(longer_than(3)),
            );
            view.populate().unwrap();
            let mut next = count;
            b.iter(|| {
                let row = message_row(next, "inserted");
                next += 1;
                reconciler
                    .apply(&[TableUpdate::new("Message", vec![RowOperation::insert(row)])])
                    .unwrap();
                black_box(view.len().unwrap());
            });
        });
    }

    group.finish();
}

/// A predicate swap followed by a read, which forces one full pass.
fn bench_full_refilter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_full_refilter");

    for count in [1_000u32, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let reconciler = seeded(count);
            let view = table_filter(
                Arc::clone(reconciler.store()),
                Arc::clone(reconciler.feed()),
                "Message",
                Some(longer_than(3)),
            );
            let predicates = [longer_than(2), longer_than(4)];
            let mut flip = 0;
            b.iter(|| {
                flip ^= 1;
                view.set_predicate(Some(Arc::clone(&predicates[flip]))).unwrap();
                black_box(view.len().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_incremental_insert, bench_full_refilter);
criterion_main!(benches);
