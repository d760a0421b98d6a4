//! Keeping track of the cost of the blockwise boolean ops a filter chain
//! leans on once per chunk, per predicate.

use cq_bitmap::{Bitmap, Fill};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

#[cfg(not(debug_assertions))]
const CHUNK_LEN: usize = 64_000;
#[cfg(debug_assertions)]
const CHUNK_LEN: usize = 64;

fn checkerboard(len: usize) -> Bitmap {
    let mut bitmap = Bitmap::new(len, Fill::AllClear);
    for i in (0..len).step_by(2) {
        bitmap.set(i);
    }
    bitmap
}

fn bench_and(c: &mut Criterion) {
    let mut group = c.benchmark_group("bitmap_and");
    group.bench_with_input(BenchmarkId::new("and", CHUNK_LEN), &CHUNK_LEN, |b, &len| {
        let lhs_template = checkerboard(len);
        let rhs = Bitmap::new(len, Fill::AllSet);
        b.iter(|| {
            let mut lhs = lhs_template.clone();
            lhs.and(&rhs);
            lhs
        });
    });
    group.finish();
}

fn bench_popcount(c: &mut Criterion) {
    let mut group = c.benchmark_group("bitmap_popcount");
    group.bench_with_input(BenchmarkId::new("popcount", CHUNK_LEN), &CHUNK_LEN, |b, &len| {
        let bitmap = checkerboard(len);
        b.iter(|| bitmap.popcount());
    });
    group.finish();
}

criterion_group!(benches, bench_and, bench_popcount);
criterion_main!(benches);
