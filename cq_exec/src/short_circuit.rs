use cq_bitmap::BitmapPool;
use cq_predicate::Predicate;
use cq_schema::Scalar;
use cq_store::ColumnarSource;

use crate::cancellation::CancellationToken;
use crate::error::ExecError;
use crate::materialize;
use crate::scan::{self, ChunkSelection};

/// Returns `true` as soon as any chunk has at least one selected row,
/// without evaluating the rest of the table. `predicates` narrows each
/// chunk the same way [`crate::aggregate::run`] does; the only difference
/// is stopping at the first non-empty chunk instead of folding every one.
pub fn any(source: &dyn ColumnarSource, predicates: &[Predicate], cancellation: &CancellationToken) -> Result<bool, ExecError> {
    let pool = BitmapPool::new();
    for chunk_index in 0..source.chunk_count() {
        cancellation.check(chunk_index)?;
        let selection = scan::evaluate_chunk(source, chunk_index, predicates, &pool)?;
        if !selection.is_empty() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The first row (in chunk-major, row-within-chunk order) satisfying
/// `predicates`, or `None` if no row does. Stops scanning at the first
/// chunk with a set bit; within that chunk, the row index is read straight
/// off the selection bitmap's blocks (block index * 64 + trailing zeros),
/// never walking the whole chunk looking for it.
pub fn first(source: &dyn ColumnarSource, predicates: &[Predicate], cancellation: &CancellationToken) -> Result<Option<Vec<Scalar>>, ExecError> {
    let pool = BitmapPool::new();
    for chunk_index in 0..source.chunk_count() {
        cancellation.check(chunk_index)?;
        let selection = scan::evaluate_chunk(source, chunk_index, predicates, &pool)?;
        let row = match &selection {
            ChunkSelection::Skip => None,
            ChunkSelection::All(len) if *len > 0 => Some(0),
            ChunkSelection::All(_) => None,
            ChunkSelection::Some(bitmap) => bitmap.iter_blocks().find(|(_, block)| *block != 0).map(|(block_idx, block)| block_idx * 64 + block.trailing_zeros() as usize),
        };
        if let Some(row) = row {
            let chunk = source.chunk(chunk_index);
            return Ok(Some(materialize::row_at(chunk, row)));
        }
    }
    Ok(None)
}
