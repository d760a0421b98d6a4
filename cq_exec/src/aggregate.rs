use cq_bitmap::BitmapPool;
use cq_plan::{AggExpr, AggFunc};
use cq_predicate::Predicate;
use cq_schema::{Schema, Scalar};
use cq_store::{Chunk, ColumnarSource};
use rayon::prelude::*;

use crate::cancellation::CancellationToken;
use crate::error::ExecError;
use crate::numeric::{MinMaxAccumulator, NumericValue, StringExtremumAccumulator, SumAccumulator};
use crate::partition;
use crate::scan::{self, ChunkSelection};

#[derive(Debug, Clone)]
enum AggState {
    Count(u64),
    Sum(SumAccumulator),
    MinNumeric(MinMaxAccumulator),
    MaxNumeric(MinMaxAccumulator),
    MinString(StringExtremumAccumulator),
    MaxString(StringExtremumAccumulator),
}

/// One slot of running aggregate state, paired with the source column name
/// it reports in overflow/empty-source errors. Opaque outside this module:
/// `cq_exec::group_by` holds a `Vec<AggSlot>` per group but only ever drives
/// it through `new_slots`/`fold_row`/`merge_slot`/`finish_slot`.
#[derive(Debug, Clone)]
pub(crate) struct AggSlot {
    func: AggFunc,
    column_name: String,
    state: AggState,
}

fn column_name(func: AggFunc, output_name: &str, schema: &Schema) -> String {
    func.source_column()
        .and_then(|c| schema.field(c))
        .map(|f| f.name().to_string())
        .unwrap_or_else(|| output_name.to_string())
}

pub(crate) fn new_slots(aggs: &[AggExpr], schema: &Schema) -> Vec<AggSlot> {
    aggs.iter()
        .map(|agg| {
            let name = column_name(agg.func, &agg.output_name, schema);
            let state = match agg.func {
                AggFunc::Count => AggState::Count(0),
                AggFunc::Sum(c) => {
                    let lt = schema.field(c).expect("sum source ordinal resolved at bind time").logical_type();
                    AggState::Sum(SumAccumulator::identity_for(lt))
                }
                AggFunc::Min(c) => {
                    let lt = schema.field(c).expect("min source ordinal resolved at bind time").logical_type();
                    if lt.is_string() {
                        AggState::MinString(StringExtremumAccumulator::default())
                    } else {
                        AggState::MinNumeric(MinMaxAccumulator::default())
                    }
                }
                AggFunc::Max(c) => {
                    let lt = schema.field(c).expect("max source ordinal resolved at bind time").logical_type();
                    if lt.is_string() {
                        AggState::MaxString(StringExtremumAccumulator::default())
                    } else {
                        AggState::MaxNumeric(MinMaxAccumulator::default())
                    }
                }
            };
            AggSlot { func: agg.func, column_name: name, state }
        })
        .collect()
}

pub(crate) fn fold_row(slot: &mut AggSlot, chunk: &Chunk, row: usize) -> Result<(), ExecError> {
    match (&mut slot.state, slot.func) {
        (AggState::Count(n), AggFunc::Count) => *n += 1,
        (AggState::Sum(acc), AggFunc::Sum(c)) => {
            if let Some(v) = NumericValue::at(chunk.column(c), row) {
                acc.add(v, &slot.column_name)?;
            }
        }
        (AggState::MinNumeric(acc), AggFunc::Min(c)) => {
            if let Some(v) = NumericValue::at(chunk.column(c), row) {
                acc.fold(v, false);
            }
        }
        (AggState::MaxNumeric(acc), AggFunc::Max(c)) => {
            if let Some(v) = NumericValue::at(chunk.column(c), row) {
                acc.fold(v, true);
            }
        }
        (AggState::MinString(acc), AggFunc::Min(c)) => acc.fold(chunk.column(c).values.utf8_get(row), false),
        (AggState::MaxString(acc), AggFunc::Max(c)) => acc.fold(chunk.column(c).values.utf8_get(row), true),
        _ => unreachable!("agg state kind always matches the function it was built from"),
    }
    Ok(())
}

pub(crate) fn merge_slot(into: &mut AggSlot, other: AggSlot) -> Result<(), ExecError> {
    match (&mut into.state, other.state) {
        (AggState::Count(a), AggState::Count(b)) => *a += b,
        (AggState::Sum(a), AggState::Sum(b)) => a.merge(b, &into.column_name)?,
        (AggState::MinNumeric(a), AggState::MinNumeric(b)) => a.merge(b, false),
        (AggState::MaxNumeric(a), AggState::MaxNumeric(b)) => a.merge(b, true),
        (AggState::MinString(a), AggState::MinString(b)) => a.merge(b, false),
        (AggState::MaxString(a), AggState::MaxString(b)) => a.merge(b, true),
        _ => unreachable!("agg state kind always matches the function it was built from"),
    }
    Ok(())
}

pub(crate) fn finish_slot(slot: AggSlot, schema: &Schema) -> Result<Scalar, ExecError> {
    match (slot.state, slot.func) {
        (AggState::Count(n), AggFunc::Count) => Ok(Scalar::Int64(n as i64)),
        (AggState::Sum(acc), AggFunc::Sum(c)) => {
            let lt = schema.field(c).expect("sum source ordinal resolved at bind time").logical_type();
            Ok(acc.to_scalar(lt))
        }
        (AggState::MinNumeric(acc), AggFunc::Min(c)) => {
            let lt = schema.field(c).expect("min source ordinal resolved at bind time").logical_type();
            acc.finish(lt, &slot.column_name)
        }
        (AggState::MaxNumeric(acc), AggFunc::Max(c)) => {
            let lt = schema.field(c).expect("max source ordinal resolved at bind time").logical_type();
            acc.finish(lt, &slot.column_name)
        }
        (AggState::MinString(acc), AggFunc::Min(_)) => acc.finish(&slot.column_name),
        (AggState::MaxString(acc), AggFunc::Max(_)) => acc.finish(&slot.column_name),
        _ => unreachable!("agg state kind always matches the function it was built from"),
    }
}

fn fold_range(
    source: &dyn ColumnarSource,
    predicates: &[Predicate],
    aggs: &[AggExpr],
    range: std::ops::Range<usize>,
    cancellation: &CancellationToken,
) -> Result<Vec<AggSlot>, ExecError> {
    let pool = BitmapPool::new();
    let schema = source.schema();
    let mut slots = new_slots(aggs, schema);
    for (done, chunk_index) in range.clone().enumerate() {
        cancellation.check(range.start + done)?;
        let selection = scan::evaluate_chunk(source, chunk_index, predicates, &pool)?;
        if selection.is_empty() {
            continue;
        }
        let chunk = source.chunk(chunk_index);
        match selection {
            ChunkSelection::Skip => {}
            ChunkSelection::All(len) => {
                for row in 0..len {
                    for slot in &mut slots {
                        fold_row(slot, chunk, row)?;
                    }
                }
            }
            ChunkSelection::Some(bitmap) => {
                for row in bitmap.iter_set_indices() {
                    for slot in &mut slots {
                        fold_row(slot, chunk, row)?;
                    }
                }
            }
        }
    }
    Ok(slots)
}

/// Runs a (possibly fused) filter + aggregate over every chunk in `source`,
/// folding each selected row directly into the running accumulators without
/// materializing an output row set. `predicates` is empty for a plain,
/// unfiltered `AggregateOp`.
pub fn run(
    source: &dyn ColumnarSource,
    predicates: &[Predicate],
    aggs: &[AggExpr],
    parallel: bool,
    worker_count: usize,
    cancellation: &CancellationToken,
) -> Result<Vec<Scalar>, ExecError> {
    let schema = source.schema();
    let chunk_count = source.chunk_count();

    let slots = if parallel && chunk_count >= 2 && worker_count > 1 {
        let ranges = partition::static_partition(chunk_count, worker_count);
        let partials: Vec<Result<Vec<AggSlot>, ExecError>> = ranges
            .par_iter()
            .map(|range| fold_range(source, predicates, aggs, range.clone(), cancellation))
            .collect();

        let mut merged = new_slots(aggs, schema);
        for partial in partials {
            let partial = partial?;
            for (into, other) in merged.iter_mut().zip(partial) {
                merge_slot(into, other)?;
            }
        }
        merged
    } else {
        fold_range(source, predicates, aggs, 0..chunk_count, cancellation)?
    };

    slots.into_iter().map(|slot| finish_slot(slot, schema)).collect()
}
