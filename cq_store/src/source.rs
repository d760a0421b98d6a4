use cq_schema::Schema;

use crate::chunk::Chunk;
use crate::zonemap::ZoneMap;

/// The contract a columnar data source exposes to the rest of the engine.
///
/// The core never writes through this interface -- ingestion, IPC readers,
/// and any other way of producing a [`Chunk`] are external collaborators.
/// [`crate::Table`] is the in-memory default implementation.
pub trait ColumnarSource {
    fn schema(&self) -> &Schema;

    fn chunk_count(&self) -> usize;

    fn chunk(&self, index: usize) -> &Chunk;

    /// `None` if the source has no precomputed zone map for this
    /// `(chunk, column)` pair (e.g. zone maps disabled in configuration).
    fn zone_map(&self, chunk_index: usize, column_ordinal: usize) -> Option<&ZoneMap>;

    fn total_rows(&self) -> usize {
        (0..self.chunk_count()).map(|i| self.chunk(i).len()).sum()
    }
}
