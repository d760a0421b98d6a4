use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use cq_bitmap::BitmapPool;
use cq_plan::AggExpr;
use cq_predicate::Predicate;
use cq_schema::Scalar;
use cq_store::{Chunk, ColumnValues, ColumnarSource};
use rayon::prelude::*;

use crate::aggregate::{self, AggSlot};
use crate::cancellation::CancellationToken;
use crate::error::ExecError;
use crate::partition;
use crate::scan::{self, ChunkSelection};

/// Hard ceiling on distinct groups a single query may produce, reported as
/// `ExecError::CapacityExceeded`. The engine config (`cq_store::EngineConfig`)
/// has no knob for it; a fixed, generous bound stands in rather than letting
/// an unbounded `GROUP BY` grow the table without limit.
pub const MAX_GROUP_TABLE_SIZE: usize = 10_000_000;

/// One materialized group-by output row: the key's display value and the
/// finished aggregate scalars, in `aggs` order.
pub struct GroupRow {
    pub key: Scalar,
    pub values: Vec<Scalar>,
}

type GroupTable<'src> = HashMap<Cow<'src, [u8]>, GroupEntry, ahash::RandomState>;

struct GroupEntry {
    key: Scalar,
    slots: Vec<AggSlot>,
}

/// Encodes one key column's value at `row` into byte-comparable form.
/// String columns borrow directly out of the chunk's data buffer (a
/// pointer+length into the chunk's string buffer); every other kind is
/// small enough to copy.
fn encode_key_part(chunk: &Chunk, col: usize, row: usize) -> (Cow<'_, [u8]>, Scalar) {
    let column = chunk.column(col);
    if !column.is_valid(row) {
        return (Cow::Owned(vec![0xFF]), Scalar::Null);
    }
    match &column.values {
        ColumnValues::Int8(v) => (Cow::Owned(v[row].to_le_bytes().to_vec()), Scalar::Int8(v[row])),
        ColumnValues::Int16(v) => (Cow::Owned(v[row].to_le_bytes().to_vec()), Scalar::Int16(v[row])),
        ColumnValues::Int32(v) => (Cow::Owned(v[row].to_le_bytes().to_vec()), Scalar::Int32(v[row])),
        ColumnValues::Int64(v) => (Cow::Owned(v[row].to_le_bytes().to_vec()), Scalar::Int64(v[row])),
        ColumnValues::UInt8(v) => (Cow::Owned(v[row].to_le_bytes().to_vec()), Scalar::UInt8(v[row])),
        ColumnValues::UInt16(v) => (Cow::Owned(v[row].to_le_bytes().to_vec()), Scalar::UInt16(v[row])),
        ColumnValues::UInt32(v) => (Cow::Owned(v[row].to_le_bytes().to_vec()), Scalar::UInt32(v[row])),
        ColumnValues::UInt64(v) => (Cow::Owned(v[row].to_le_bytes().to_vec()), Scalar::UInt64(v[row])),
        ColumnValues::Float32(v) => (Cow::Owned(v[row].to_le_bytes().to_vec()), Scalar::Float32(ordered_float::OrderedFloat(v[row]))),
        ColumnValues::Float64(v) => (Cow::Owned(v[row].to_le_bytes().to_vec()), Scalar::Float64(ordered_float::OrderedFloat(v[row]))),
        ColumnValues::Date32(v) => (Cow::Owned(v[row].to_le_bytes().to_vec()), Scalar::Date32(v[row])),
        ColumnValues::Timestamp(v) => (Cow::Owned(v[row].to_le_bytes().to_vec()), Scalar::Timestamp(v[row])),
        ColumnValues::Decimal128(v) => (Cow::Owned(v[row].to_le_bytes().to_vec()), Scalar::Decimal128(v[row])),
        ColumnValues::Bool { .. } => {
            let b = column.values.bool_get(row);
            (Cow::Owned(vec![b as u8]), Scalar::Bool(b))
        }
        ColumnValues::Utf8 { .. } => {
            let s = column.values.utf8_get(row);
            (Cow::Borrowed(s.as_bytes()), Scalar::Utf8(s.to_string()))
        }
        ColumnValues::Binary { .. } => {
            let b = column.values.binary_get(row);
            (Cow::Borrowed(b), Scalar::Binary(b.to_vec()))
        }
    }
}

/// Builds the group key for `row`: a single key column's value directly, or
/// for a composite key, a length-prefixed concatenation of each column's
/// encoding (so a boundary between two variable-length parts can never be
/// ambiguous) paired with a `|`-joined display label (the "composite keys
/// project as an opaque UTF-8 label" rule from `cq_plan::node`).
fn build_group_key<'a>(chunk: &'a Chunk, key_columns: &[usize], row: usize) -> (Cow<'a, [u8]>, Scalar) {
    if key_columns.len() == 1 {
        return encode_key_part(chunk, key_columns[0], row);
    }
    let mut bytes = Vec::new();
    let mut labels = Vec::with_capacity(key_columns.len());
    for &col in key_columns {
        let (part, scalar) = encode_key_part(chunk, col, row);
        bytes.extend_from_slice(&(part.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&part);
        labels.push(scalar.to_string());
    }
    (Cow::Owned(bytes), Scalar::Utf8(labels.join("|")))
}

fn fold_range<'src>(
    source: &'src dyn ColumnarSource,
    predicates: &[Predicate],
    key_columns: &[usize],
    aggs: &[AggExpr],
    range: std::ops::Range<usize>,
    cancellation: &CancellationToken,
) -> Result<GroupTable<'src>, ExecError> {
    let pool = BitmapPool::new();
    let schema = source.schema();
    let mut table: GroupTable<'src> = HashMap::with_hasher(ahash::RandomState::new());

    for (done, chunk_index) in range.clone().enumerate() {
        cancellation.check(range.start + done)?;
        let selection = scan::evaluate_chunk(source, chunk_index, predicates, &pool)?;
        if selection.is_empty() {
            continue;
        }
        let chunk = source.chunk(chunk_index);
        match &selection {
            ChunkSelection::Skip => {}
            ChunkSelection::All(len) => {
                for row in 0..*len {
                    fold_one_row(&mut table, chunk, key_columns, aggs, schema, row)?;
                }
            }
            ChunkSelection::Some(bitmap) => {
                for row in bitmap.iter_set_indices() {
                    fold_one_row(&mut table, chunk, key_columns, aggs, schema, row)?;
                }
            }
        }
    }
    Ok(table)
}

fn fold_one_row<'src>(
    table: &mut GroupTable<'src>,
    chunk: &'src Chunk,
    key_columns: &[usize],
    aggs: &[AggExpr],
    schema: &cq_schema::Schema,
    row: usize,
) -> Result<(), ExecError> {
    let (key_bytes, key_scalar) = build_group_key(chunk, key_columns, row);
    let entry = match table.entry(key_bytes) {
        Entry::Occupied(e) => e.into_mut(),
        Entry::Vacant(e) => {
            if table.len() >= MAX_GROUP_TABLE_SIZE {
                return Err(ExecError::CapacityExceeded(format!("group-by table exceeded {MAX_GROUP_TABLE_SIZE} distinct groups")));
            }
            e.insert(GroupEntry {
                key: key_scalar,
                slots: aggregate::new_slots(aggs, schema),
            })
        }
    };
    for slot in &mut entry.slots {
        aggregate::fold_row(slot, chunk, row)?;
    }
    Ok(())
}

fn merge_tables<'src>(into: &mut GroupTable<'src>, other: GroupTable<'src>) -> Result<(), ExecError> {
    for (key, entry) in other {
        match into.entry(key) {
            Entry::Occupied(mut existing) => {
                let existing = existing.get_mut();
                for (a, b) in existing.slots.iter_mut().zip(entry.slots) {
                    aggregate::merge_slot(a, b)?;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }
    }
    Ok(())
}

/// Runs a (possibly fused) filter + grouped aggregate. Rows are returned
/// sorted by the key's display string, a deterministic tie-break so the
/// sequential and parallel paths (and repeated runs) produce the same row
/// order even though hash-map iteration order is not itself stable.
pub fn run(
    source: &dyn ColumnarSource,
    predicates: &[Predicate],
    key_columns: &[usize],
    aggs: &[AggExpr],
    parallel: bool,
    worker_count: usize,
    cancellation: &CancellationToken,
) -> Result<Vec<GroupRow>, ExecError> {
    let chunk_count = source.chunk_count();

    let table = if parallel && chunk_count >= 2 && worker_count > 1 {
        let ranges = partition::static_partition(chunk_count, worker_count);
        let partials: Vec<Result<GroupTable<'_>, ExecError>> = ranges
            .par_iter()
            .map(|range| fold_range(source, predicates, key_columns, aggs, range.clone(), cancellation))
            .collect();

        let mut merged: GroupTable<'_> = HashMap::with_hasher(ahash::RandomState::new());
        for partial in partials {
            merge_tables(&mut merged, partial?)?;
        }
        merged
    } else {
        fold_range(source, predicates, key_columns, aggs, 0..chunk_count, cancellation)?
    };

    let schema = source.schema();
    let mut rows = table
        .into_values()
        .map(|entry| {
            let values = entry.slots.into_iter().map(|slot| aggregate::finish_slot(slot, schema)).collect::<Result<Vec<_>, _>>()?;
            Ok(GroupRow { key: entry.key, values })
        })
        .collect::<Result<Vec<GroupRow>, ExecError>>()?;
    rows.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));
    Ok(rows)
}
