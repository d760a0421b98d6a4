use std::cell::RefCell;

use crate::bitmap::{Bitmap, Fill};

/// A thread-local free-list of [`Bitmap`] allocations.
///
/// Predicate evaluation, `Or`/`Not` composites, and the fused kernels all
/// need short-lived scratch bitmaps; pooling them here means the hot path
/// for a chunk never calls into the allocator. A handle is an index into
/// the pool, not a raw pointer, so its lifetime is scoped to the
/// [`PooledBitmap`] guard -- the allocation is returned automatically when
/// the guard drops, rather than the caller having to remember to free it.
#[derive(Default)]
pub struct BitmapPool {
    free: RefCell<Vec<Bitmap>>,
}

impl BitmapPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks out a bitmap of the given length and fill state, reusing a
    /// pooled allocation when one of at least that capacity is free.
    pub fn checkout(&self, len: usize, fill: Fill) -> PooledBitmap<'_> {
        let mut bm = self.free.borrow_mut().pop().unwrap_or_else(|| Bitmap::new(0, Fill::AllClear));
        bm.reset(len, fill);
        PooledBitmap {
            pool: self,
            bitmap: Some(bm),
        }
    }

    fn release(&self, bitmap: Bitmap) {
        self.free.borrow_mut().push(bitmap);
    }

    /// Number of allocations currently sitting idle in the pool.
    pub fn idle_count(&self) -> usize {
        self.free.borrow().len()
    }
}

/// A [`Bitmap`] borrowed from a [`BitmapPool`]. Derefs to [`Bitmap`]; on
/// drop, the backing allocation is returned to the pool rather than freed.
pub struct PooledBitmap<'pool> {
    pool: &'pool BitmapPool,
    bitmap: Option<Bitmap>,
}

impl<'pool> std::ops::Deref for PooledBitmap<'pool> {
    type Target = Bitmap;

    fn deref(&self) -> &Bitmap {
        self.bitmap.as_ref().expect("bitmap taken before drop")
    }
}

impl<'pool> std::ops::DerefMut for PooledBitmap<'pool> {
    fn deref_mut(&mut self) -> &mut Bitmap {
        self.bitmap.as_mut().expect("bitmap taken before drop")
    }
}

impl<'pool> Drop for PooledBitmap<'pool> {
    fn drop(&mut self) {
        if let Some(bitmap) = self.bitmap.take() {
            self.pool.release(bitmap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_out_bitmap_is_reused_after_drop() {
        let pool = BitmapPool::new();
        {
            let mut bm = pool.checkout(128, Fill::AllSet);
            bm.clear(5);
            assert_eq!(bm.popcount(), 127);
        }
        assert_eq!(pool.idle_count(), 1);

        let bm2 = pool.checkout(64, Fill::AllClear);
        assert_eq!(bm2.len(), 64);
        assert_eq!(bm2.popcount(), 0);
        assert_eq!(pool.idle_count(), 0);
    }
}
