use criterion::{black_box, criterion_group, criterion_main, Criterion};
use grit_pack::delta::{apply_delta, encode_copy, encode_insert, write_varint};

/// Build a delta that interleaves copies and inserts over a synthetic base.
fn build_bench_delta(base: &[u8]) -> (Vec<u8>, usize) {
    let mut instructions = Vec::new();
    let mut target_len = 0;

    let chunk = 1024;
    let mut offset = 0;
    while offset + chunk <= base.len() {
        instructions.extend_from_slice(&encode_copy(offset as u64, chunk));
        target_len += chunk;
        instructions.extend_from_slice(&encode_insert(b"patched segment"));
        target_len += b"patched segment".len();
        offset += chunk * 2;
    }

    let mut delta = Vec::new();
    delta.extend_from_slice(&write_varint(base.len()));
    delta.extend_from_slice(&write_varint(target_len));
    delta.extend_from_slice(&instructions);
    (delta, target_len)
}

fn bench_apply_delta(c: &mut Criterion) {
    let base: Vec<u8> = (0..1_048_576u32).map(|i| (i % 251) as u8).collect();
    let (delta, _) = build_bench_delta(&base);

    c.bench_function("apply_delta_1mb_base", |b| {
        b.iter(|| apply_delta(black_box(&base), black_box(&delta)).unwrap())
    });

    let small_base = &base[..4096];
    let (small_delta, _) = build_bench_delta(small_base);
    c.bench_function("apply_delta_4kb_base", |b| {
        b.iter(|| apply_delta(black_box(small_base), black_box(&small_delta)).unwrap())
    });
}

criterion_group!(benches, bench_apply_delta);
criterion_main!(benches);
