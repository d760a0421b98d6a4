use std::sync::Arc;

use cq_plan::ProjectionItem;
use cq_predicate::Predicate;
use cq_schema::{FieldSpec, LogicalType, Schema, Scalar};
use cq_store::{Chunk, Column, ColumnValues, ColumnarSource};
use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::cancellation::CancellationToken;
use crate::error::ExecError;
use crate::partition;
use crate::scan::{self, ChunkSelection};

/// A fully materialized result: row-major, but carrying the schema needed
/// to rebuild either output shape (`to_list()` vs `to_columnar()`).
pub struct RowBatch {
    pub schema: Arc<Schema>,
    pub rows: Vec<Vec<Scalar>>,
}

/// Columnar materialization: one typed [`Column`] per output field,
/// built once the full row set is known.
pub struct ColumnarBatch {
    pub schema: Arc<Schema>,
    pub columns: Vec<Column>,
}

fn scalar_at(column: &Column, row: usize) -> Scalar {
    if !column.is_valid(row) {
        return Scalar::Null;
    }
    match &column.values {
        ColumnValues::Int8(v) => Scalar::Int8(v[row]),
        ColumnValues::Int16(v) => Scalar::Int16(v[row]),
        ColumnValues::Int32(v) => Scalar::Int32(v[row]),
        ColumnValues::Int64(v) => Scalar::Int64(v[row]),
        ColumnValues::UInt8(v) => Scalar::UInt8(v[row]),
        ColumnValues::UInt16(v) => Scalar::UInt16(v[row]),
        ColumnValues::UInt32(v) => Scalar::UInt32(v[row]),
        ColumnValues::UInt64(v) => Scalar::UInt64(v[row]),
        ColumnValues::Float32(v) => Scalar::Float32(OrderedFloat(v[row])),
        ColumnValues::Float64(v) => Scalar::Float64(OrderedFloat(v[row])),
        ColumnValues::Date32(v) => Scalar::Date32(v[row]),
        ColumnValues::Timestamp(v) => Scalar::Timestamp(v[row]),
        ColumnValues::Decimal128(v) => Scalar::Decimal128(v[row]),
        ColumnValues::Bool { .. } => Scalar::Bool(column.values.bool_get(row)),
        ColumnValues::Utf8 { .. } => Scalar::Utf8(column.values.utf8_get(row).to_string()),
        ColumnValues::Binary { .. } => Scalar::Binary(column.values.binary_get(row).to_vec()),
    }
}

/// Reads every field of `chunk` at `row` into one natural-order row.
pub fn row_at(chunk: &Chunk, row: usize) -> Vec<Scalar> {
    chunk.columns().iter().map(|c| scalar_at(c, row)).collect()
}

fn rows_from_chunk(chunk: &Chunk, selection: &ChunkSelection<'_>) -> Vec<Vec<Scalar>> {
    match selection {
        ChunkSelection::Skip => Vec::new(),
        ChunkSelection::All(len) => (0..*len).map(|row| row_at(chunk, row)).collect(),
        ChunkSelection::Some(bitmap) => bitmap.iter_set_indices().map(|row| row_at(chunk, row)).collect(),
    }
}

/// `needed`, when present, is the total row count (`offset + limit`) the
/// caller requires before any final truncation; once `rows.len()` reaches
/// it no further chunk is touched, not even to check its zone map. A
/// `needed` of `0` (a `LIMIT 0` query) means the range's first chunk is
/// never scanned at all.
fn gather_range(
    source: &dyn ColumnarSource,
    predicates: &[Predicate],
    range: std::ops::Range<usize>,
    needed: Option<usize>,
    cancellation: &CancellationToken,
) -> Result<Vec<Vec<Scalar>>, ExecError> {
    let pool = cq_bitmap::BitmapPool::new();
    let mut rows = Vec::new();
    for (done, chunk_index) in range.clone().enumerate() {
        if needed.is_some_and(|needed| rows.len() >= needed) {
            break;
        }
        cancellation.check(range.start + done)?;
        let selection = scan::evaluate_chunk(source, chunk_index, predicates, &pool)?;
        if selection.is_empty() {
            continue;
        }
        let chunk = source.chunk(chunk_index);
        rows.extend(rows_from_chunk(chunk, &selection));
    }
    Ok(rows)
}

/// Gathers every row (in chunk-major, row-within-chunk order) that
/// satisfies `predicates`, the row surface a plain (non-aggregate) scan or
/// filter produces for a downstream `MaterializeOp`/`SortOp`.
///
/// `limit`/`offset` are the driving operator's early-exit hint (see
/// `cq_physical::attach_to_driving_operator`): when `limit` is present the
/// sequential path stops once it has collected `offset + limit` rows,
/// satisfying "no chunks scanned beyond what's needed" without changing
/// the result -- the caller still applies the authoritative `skip`/`take`
/// against the full row set this returns. Parallel scans never honor the
/// hint (static partitioning has no way to tell a worker to stop early),
/// so `parallel` should already be forced off by the caller whenever
/// `limit` is `Some`.
pub fn gather_rows(
    source: &dyn ColumnarSource,
    predicates: &[Predicate],
    parallel: bool,
    worker_count: usize,
    limit: Option<u64>,
    offset: u64,
    cancellation: &CancellationToken,
) -> Result<Vec<Vec<Scalar>>, ExecError> {
    let chunk_count = source.chunk_count();
    if parallel && chunk_count >= 2 && worker_count > 1 {
        let ranges = partition::static_partition(chunk_count, worker_count);
        let partials: Vec<Result<Vec<Vec<Scalar>>, ExecError>> =
            ranges.par_iter().map(|range| gather_range(source, predicates, range.clone(), None, cancellation)).collect();
        let mut rows = Vec::new();
        for partial in partials {
            rows.extend(partial?);
        }
        Ok(rows)
    } else {
        let needed = limit.map(|n| offset as usize + n as usize);
        gather_range(source, predicates, 0..chunk_count, needed, cancellation)
    }
}

/// Projects `rows` (natural order, matching `natural_schema`) through
/// `outputs`, the same ordinal-selection rule [`cq_plan::LogicalPlan::Project`]
/// uses for its output schema.
pub fn project(natural_schema: &Schema, rows: &[Vec<Scalar>], outputs: &[ProjectionItem]) -> Result<(Arc<Schema>, Vec<Vec<Scalar>>), ExecError> {
    let specs = outputs
        .iter()
        .map(|item| {
            let field = natural_schema
                .field(item.source_ordinal)
                .ok_or_else(|| ExecError::CorruptChunk(format!("projection ordinal {} out of range", item.source_ordinal)))?;
            Ok(FieldSpec::new(item.output_name.clone(), field.logical_type(), field.nullable()))
        })
        .collect::<Result<Vec<FieldSpec>, ExecError>>()?;
    let schema = Arc::new(Schema::new(specs).map_err(|e| ExecError::CorruptChunk(e.to_string()))?);
    let projected = rows.iter().map(|row| outputs.iter().map(|item| row[item.source_ordinal].clone()).collect()).collect();
    Ok((schema, projected))
}

fn column_from_scalars(logical_type: LogicalType, values: &[Scalar]) -> Column {
    let validity: Vec<bool> = values.iter().map(|v| !v.is_null()).collect();
    let validity = Some(validity.as_slice());

    macro_rules! numeric_column {
        ($ctor:ident, $variant:ident, $ty:ty) => {{
            let v: Vec<$ty> = values
                .iter()
                .map(|s| match s {
                    Scalar::$variant(x) => *x,
                    _ => <$ty>::default(),
                })
                .collect();
            cq_store::builder::$ctor(v, validity)
        }};
    }

    match logical_type {
        LogicalType::Int8 => numeric_column!(int8_column, Int8, i8),
        LogicalType::Int16 => numeric_column!(int16_column, Int16, i16),
        LogicalType::Int32 => numeric_column!(int32_column, Int32, i32),
        LogicalType::Int64 => numeric_column!(int64_column, Int64, i64),
        LogicalType::UInt8 => numeric_column!(uint8_column, UInt8, u8),
        LogicalType::UInt16 => numeric_column!(uint16_column, UInt16, u16),
        LogicalType::UInt32 => numeric_column!(uint32_column, UInt32, u32),
        LogicalType::UInt64 => numeric_column!(uint64_column, UInt64, u64),
        LogicalType::Date32 => numeric_column!(date32_column, Date32, i32),
        LogicalType::Timestamp(_) => numeric_column!(timestamp_column, Timestamp, i64),
        LogicalType::Decimal128(_, _) => numeric_column!(decimal128_column, Decimal128, i128),
        LogicalType::Float32 => {
            let v: Vec<f32> = values
                .iter()
                .map(|s| match s {
                    Scalar::Float32(x) => x.0,
                    _ => 0.0,
                })
                .collect();
            cq_store::builder::float32_column(v, validity)
        }
        LogicalType::Float64 => {
            let v: Vec<f64> = values
                .iter()
                .map(|s| match s {
                    Scalar::Float64(x) => x.0,
                    _ => 0.0,
                })
                .collect();
            cq_store::builder::float64_column(v, validity)
        }
        LogicalType::Bool => {
            let v: Vec<bool> = values
                .iter()
                .map(|s| match s {
                    Scalar::Bool(x) => *x,
                    _ => false,
                })
                .collect();
            cq_store::builder::bool_column(&v, validity)
        }
        LogicalType::Utf8 => {
            let v: Vec<String> = values
                .iter()
                .map(|s| match s {
                    Scalar::Utf8(x) => x.clone(),
                    _ => String::new(),
                })
                .collect();
            cq_store::builder::utf8_column(&v, validity)
        }
        LogicalType::Binary => {
            let v: Vec<Vec<u8>> = values
                .iter()
                .map(|s| match s {
                    Scalar::Binary(x) => x.clone(),
                    _ => Vec::new(),
                })
                .collect();
            cq_store::builder::binary_column(&v, validity)
        }
    }
}

/// Transposes a [`RowBatch`] into columnar form. Not zero-copy: the
/// executor builds rows first (even for a columnar-target query) and
/// transposes once here, trading a little throughput on the rowwise-then-
/// columnar path for one materializer shared by both output kinds.
pub fn to_columnar(batch: RowBatch) -> ColumnarBatch {
    let columns = batch
        .schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let values: Vec<Scalar> = batch.rows.iter().map(|row| row[i].clone()).collect();
            column_from_scalars(field.logical_type(), &values)
        })
        .collect();
    ColumnarBatch { schema: batch.schema, columns }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use cq_store::{Table, ZoneMap};
    use cq_testutil::random_numeric_table;

    use super::*;

    /// Wraps a `Table`, recording which chunk indices `chunk()` is actually
    /// asked for -- the only reliable way to prove a scan stopped early,
    /// since `gather_range` already re-reads a chunk's zone map and data
    /// through the same `ColumnarSource` the executor sees.
    struct TrackedSource {
        inner: Table,
        visited: RefCell<Vec<usize>>,
    }

    impl TrackedSource {
        fn new(inner: Table) -> Self {
            Self { inner, visited: RefCell::new(Vec::new()) }
        }
    }

    impl ColumnarSource for TrackedSource {
        fn schema(&self) -> &Schema {
            self.inner.schema()
        }

        fn chunk_count(&self) -> usize {
            self.inner.chunk_count()
        }

        fn chunk(&self, index: usize) -> &Chunk {
            self.visited.borrow_mut().push(index);
            self.inner.chunk(index)
        }

        fn zone_map(&self, chunk_index: usize, column_ordinal: usize) -> Option<&ZoneMap> {
            self.inner.zone_map(chunk_index, column_ordinal)
        }
    }

    #[test]
    fn limit_zero_never_touches_a_chunk() {
        let source = TrackedSource::new(random_numeric_table(40, 10, 1));
        let cancellation = CancellationToken::new();
        let rows = gather_rows(&source, &[], false, 1, Some(0), 0, &cancellation).unwrap();
        assert!(rows.is_empty());
        assert!(source.visited.borrow().is_empty());
    }

    #[test]
    fn limit_stops_once_enough_rows_are_collected() {
        // Chunk size 10, 4 chunks total; asking for 5 rows should stop
        // after the first chunk instead of scanning all 40 rows.
        let source = TrackedSource::new(random_numeric_table(40, 10, 1));
        let cancellation = CancellationToken::new();
        let rows = gather_rows(&source, &[], false, 1, Some(5), 0, &cancellation).unwrap();
        assert!(rows.len() >= 5);
        assert_eq!(*source.visited.borrow(), vec![0]);
    }

    #[test]
    fn limit_with_offset_accounts_for_both_in_the_early_exit_threshold() {
        let source = TrackedSource::new(random_numeric_table(40, 10, 1));
        let cancellation = CancellationToken::new();
        // offset 8 + limit 5 = 13 rows needed, which spans into the second
        // chunk (rows 0..10, 10..20) but never reaches the third.
        let rows = gather_rows(&source, &[], false, 1, Some(5), 8, &cancellation).unwrap();
        assert!(rows.len() >= 13);
        assert_eq!(*source.visited.borrow(), vec![0, 1]);
    }

    #[test]
    fn no_limit_scans_every_chunk() {
        let source = TrackedSource::new(random_numeric_table(40, 10, 1));
        let cancellation = CancellationToken::new();
        let rows = gather_rows(&source, &[], false, 1, None, 0, &cancellation).unwrap();
        assert_eq!(rows.len(), 40);
        assert_eq!(*source.visited.borrow(), vec![0, 1, 2, 3]);
    }
}
