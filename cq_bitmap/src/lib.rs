//! The selection bitmap: a bit-per-row bitset tracking which rows of a
//! chunk remain after filtering, plus the arena pool that recycles its
//! allocations across chunk evaluations.

mod bitmap;
mod pool;

pub use bitmap::{Bitmap, Fill, SetIndices};
pub use pool::{BitmapPool, PooledBitmap};
