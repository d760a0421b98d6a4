use std::sync::Arc;

use cq_error::Error;
use cq_schema::Schema;

use crate::column::Column;

/// Nominal chunk size in rows: L2-friendly power of two. The last chunk of
/// a table may be shorter.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// A contiguous row-range of a [`crate::Table`]: the unit of parallel
/// scheduling and of zone-map pruning.
///
/// Rows within a chunk are numbered `0..len`. Every column in a chunk has
/// the same row count (`len`); that invariant is checked once at
/// construction (`Chunk::new`), never re-checked in the hot predicate path.
#[derive(Debug, Clone)]
pub struct Chunk {
    schema: Arc<Schema>,
    columns: Vec<Column>,
    len: usize,
}

impl Chunk {
    /// Validates the per-chunk invariants from the data model:
    /// 1. every column has the same row count as `len`,
    /// 2. each present null bitmap is `ceil(len / 8)` bytes or more,
    /// 3. variable-length columns carry monotonically non-decreasing offsets.
    ///
    /// Returns `Err(CorruptChunk)` rather than panicking: a caller handing
    /// us an inconsistent columnar source is a fatal, reportable condition,
    /// not a programmer bug inside this crate.
    pub fn new(schema: Arc<Schema>, columns: Vec<Column>, len: usize) -> Result<Self, Error> {
        if columns.len() != schema.len() {
            return Err(Error::CorruptChunk(format!(
                "schema has {} columns but chunk was built with {}",
                schema.len(),
                columns.len()
            )));
        }
        for (field, column) in schema.fields().iter().zip(columns.iter()) {
            if column.len() != len {
                return Err(Error::CorruptChunk(format!(
                    "column {:?} has {} rows, expected {len}",
                    field.name(),
                    column.len()
                )));
            }
            if !column.values.offsets_are_monotonic() {
                return Err(Error::CorruptChunk(format!(
                    "column {:?} has non-monotonic offsets",
                    field.name()
                )));
            }
            if let Some(validity) = &column.validity {
                let needed = (len + 7) / 8;
                if validity.as_bytes().len() < needed {
                    return Err(Error::CorruptChunk(format!(
                        "column {:?} null bitmap is {} bytes, need at least {needed}",
                        field.name(),
                        validity.as_bytes().len()
                    )));
                }
            }
        }
        Ok(Self { schema, columns, len })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column(&self, ordinal: usize) -> &Column {
        &self.columns[ordinal]
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

#[cfg(test)]
mod tests {
    use cq_schema::{FieldSpec, LogicalType};

    use super::*;
    use crate::column::ColumnValues;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new([
                FieldSpec::new("a", LogicalType::Int32, false),
                FieldSpec::new("b", LogicalType::Int32, false),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn row_count_mismatch_is_corrupt_chunk() {
        let schema = schema();
        let columns = vec![
            Column::new(ColumnValues::Int32(vec![1, 2, 3].into()), None),
            Column::new(ColumnValues::Int32(vec![1, 2].into()), None),
        ];
        let err = Chunk::new(schema, columns, 3).unwrap_err();
        assert!(matches!(err, Error::CorruptChunk(_)));
    }

    #[test]
    fn well_formed_chunk_builds() {
        let schema = schema();
        let columns = vec![
            Column::new(ColumnValues::Int32(vec![1, 2, 3].into()), None),
            Column::new(ColumnValues::Int32(vec![4, 5, 6].into()), None),
        ];
        let chunk = Chunk::new(schema, columns, 3).unwrap();
        assert_eq!(chunk.len(), 3);
    }
}
