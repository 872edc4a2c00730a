//! Schema decoder benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use livesync_bench::chat_messages;
use livesync_codec::{decode, decode_row, BuiltinType, RowKey, TypeDescriptor};
use livesync_testkit::{chat_schema, user_row};
use serde_json::json;

/// Benchmark decoding single builtin values.
fn bench_decode_builtin(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_builtin");

    let u64_ty = TypeDescriptor::builtin(BuiltinType::U64);
    let max = json!("18446744073709551615");
    group.bench_function("u64_string", |b| {
        b.iter(|| black_box(decode(&u64_ty, black_box(&max), None).unwrap()));
    });

    let text_ty = TypeDescriptor::builtin(BuiltinType::String);
    let text = json!("hello, world");
    group.bench_function("string", |b| {
        b.iter(|| black_box(decode(&text_ty, black_box(&text), None).unwrap()));
    });

    let bytes_ty = TypeDescriptor::array(TypeDescriptor::builtin(BuiltinType::U8));
    let bytes = json!("ab".repeat(256));
    group.bench_function("bytes_hex_256", |b| {
        b.iter(|| black_box(decode(&bytes_ty, black_box(&bytes), None).unwrap()));
    });

    group.finish();
}

/// Benchmark decoding whole table rows.
fn bench_decode_rows(c: &mut Criterion) {
    let schema = chat_schema();
    let mut group = c.benchmark_group("decode_rows");

    let user = schema.entity("User").unwrap();
    let raw = user_row(3, Some("ada"), true);
    group.bench_function("user", |b| {
        b.iter(|| black_box(decode_row(user, black_box(&raw), Some(&schema.typespace)).unwrap()));
    });

    let message = schema.entity("Message").unwrap();
    for count in [100u32, 1000] {
        let rows = chat_messages(count);
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::new("messages", count), &rows, |b, rows| {
            b.iter(|| {
                for raw in rows {
                    black_box(decode_row(message, raw, Some(&schema.typespace)).unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark canonical row key encoding.
fn bench_row_keys(c: &mut Criterion) {
    let rows = chat_messages(1000);
    let mut group = c.benchmark_group("row_key");
    group.throughput(Throughput::Elements(rows.len() as u64));
    group.bench_function("chat_messages_1000", |b| {
        b.iter(|| {
            for raw in &rows {
                black_box(RowKey::from_raw(raw));
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_decode_builtin, bench_decode_rows, bench_row_keys);
criterion_main!(benches);
