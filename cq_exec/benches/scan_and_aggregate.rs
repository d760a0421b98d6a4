//! End-to-end cost of the filter+aggregate fold over a multi-chunk table,
//! sequential vs. statically-partitioned parallel.

use cq_exec::aggregate;
use cq_exec::cancellation::CancellationToken;
use cq_plan::{AggExpr, AggFunc};
use cq_predicate::{ComparisonOp, Predicate};
use cq_schema::Scalar;
use cq_testutil::random_numeric_table;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

#[cfg(not(debug_assertions))]
const NUM_ROWS: usize = 200_000;
#[cfg(debug_assertions)]
const NUM_ROWS: usize = 200;

const CHUNK_SIZE: usize = 8_000;

fn bench_filtered_sum(c: &mut Criterion) {
    let table = random_numeric_table(NUM_ROWS, CHUNK_SIZE, 7);
    let predicates = vec![Predicate::Compare { column: 1, op: ComparisonOp::Gt, operand: Scalar::Float64(ordered_float::OrderedFloat(0.0)) }];
    let aggs = vec![AggExpr { func: AggFunc::Sum(1), output_name: "sum_value".to_string() }];
    let cancellation = CancellationToken::new();

    let mut group = c.benchmark_group("filtered_sum");
    for (label, parallel) in [("sequential", false), ("parallel", true)] {
        group.bench_with_input(BenchmarkId::new(label, NUM_ROWS), &parallel, |b, &parallel| {
            b.iter(|| aggregate::run(&table, &predicates, &aggs, parallel, 4, &cancellation).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_filtered_sum);
criterion_main!(benches);
