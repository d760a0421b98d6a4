use cq_bitmap::{BitmapPool, Fill, PooledBitmap};
use cq_predicate::{ChunkDisposition, Predicate};
use cq_store::{ColumnarSource, ZoneMap};

use crate::error::ExecError;

/// What evaluating a chunk's predicate set against its zone maps, then (if
/// needed) its rows, leaves behind.
pub enum ChunkSelection<'pool> {
    /// Zone maps proved no row in the chunk can satisfy the predicates.
    Skip,
    /// Zone maps proved every row satisfies the predicates; no bitmap was
    /// materialized since there is nothing left to narrow.
    All(usize),
    /// At least one predicate needed a row-level evaluation.
    Some(PooledBitmap<'pool>),
}

impl ChunkSelection<'_> {
    pub fn popcount(&self) -> u64 {
        match self {
            Self::Skip => 0,
            Self::All(len) => *len as u64,
            Self::Some(bitmap) => bitmap.popcount(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.popcount() == 0
    }
}

fn zone_maps_for(source: &dyn ColumnarSource, chunk_index: usize) -> Vec<ZoneMap> {
    let blank = || ZoneMap {
        min: None,
        max: None,
        null_count: 0,
        distinct_bloom: None,
    };
    (0..source.schema().len())
        .map(|col| source.zone_map(chunk_index, col).cloned().unwrap_or_else(blank))
        .collect()
}

/// Narrows chunk `chunk_index` by `predicates` (an implicit conjunction),
/// consulting zone maps first so that a chunk the index can rule out
/// entirely never touches its row data.
pub fn evaluate_chunk<'pool>(
    source: &dyn ColumnarSource,
    chunk_index: usize,
    predicates: &[Predicate],
    pool: &'pool BitmapPool,
) -> Result<ChunkSelection<'pool>, ExecError> {
    let chunk = source.chunk(chunk_index);
    if predicates.is_empty() {
        return Ok(ChunkSelection::All(chunk.len()));
    }

    let zone_maps = zone_maps_for(source, chunk_index);
    let mut all_trivially_true = true;
    for predicate in predicates {
        match predicate.chunk_disposition(&zone_maps) {
            ChunkDisposition::Skip => return Ok(ChunkSelection::Skip),
            ChunkDisposition::TriviallyTrue => {}
            ChunkDisposition::Evaluate => all_trivially_true = false,
        }
    }
    if all_trivially_true {
        return Ok(ChunkSelection::All(chunk.len()));
    }

    let mut selection = pool.checkout(chunk.len(), Fill::AllSet);
    for predicate in predicates {
        if selection.is_all_clear() {
            break;
        }
        if matches!(predicate.chunk_disposition(&zone_maps), ChunkDisposition::TriviallyTrue) {
            continue;
        }
        predicate.evaluate(chunk, &mut selection)?;
    }
    Ok(ChunkSelection::Some(selection))
}
