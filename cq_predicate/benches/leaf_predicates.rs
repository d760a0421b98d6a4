//! Per-chunk cost of the leaf comparison kernel, the thing every `WHERE`
//! clause bottoms out in once per chunk.

use std::sync::Arc;

use cq_bitmap::{Bitmap, Fill};
use cq_predicate::{ComparisonOp, Predicate};
use cq_schema::{FieldSpec, LogicalType, Scalar, Schema};
use cq_store::builder::int64_column;
use cq_store::Chunk;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

#[cfg(not(debug_assertions))]
const CHUNK_LEN: usize = 64_000;
#[cfg(debug_assertions)]
const CHUNK_LEN: usize = 64;

fn ramp_chunk(len: usize) -> (Arc<Schema>, Chunk) {
    let schema = Arc::new(Schema::new([FieldSpec::new("value", LogicalType::Int64, false)]).unwrap());
    let values: Vec<i64> = (0..len as i64).collect();
    let column = int64_column(values, None);
    let chunk = Chunk::new(Arc::clone(&schema), vec![column], len).unwrap();
    (schema, chunk)
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("leaf_compare");
    group.bench_with_input(BenchmarkId::new("gt_half", CHUNK_LEN), &CHUNK_LEN, |b, &len| {
        let (_schema, chunk) = ramp_chunk(len);
        let predicate = Predicate::Compare { column: 0, op: ComparisonOp::Gt, operand: Scalar::Int64(len as i64 / 2) };
        b.iter(|| {
            let mut selection = Bitmap::new(len, Fill::AllSet);
            predicate.evaluate(&chunk, &mut selection).unwrap();
            selection
        });
    });
    group.finish();
}

criterion_group!(benches, bench_compare);
criterion_main!(benches);
