use std::sync::Arc;

/// An immutable, Arrow-convention (LSB-first, `1` = valid) packed null
/// bitmap for one column of one chunk.
///
/// Deliberately not `arrow2::bitmap::Bitmap`: the engine never slices a
/// chunk's validity buffer independently of its value buffer, so there is
/// no need for `Bitmap`'s internal bit-offset bookkeeping -- a plain packed
/// byte buffer with a row count is enough, and it is exactly what
/// [`cq_bitmap::Bitmap::and_with_arrow_null_bitmap`] expects as input.
#[derive(Debug, Clone)]
pub struct NullBitmap {
    bytes: Arc<[u8]>,
    len: usize,
}

impl NullBitmap {
    /// `bytes` must be at least `ceil(len / 8)` bytes, LSB-first, `1` = valid.
    pub fn from_bytes(bytes: Arc<[u8]>, len: usize) -> Self {
        debug_assert!(bytes.len() >= (len + 7) / 8);
        Self { bytes, len }
    }

    pub fn from_bools(valid: &[bool]) -> Self {
        let mut bytes = vec![0u8; (valid.len() + 7) / 8];
        for (i, &v) in valid.iter().enumerate() {
            if v {
                bytes[i / 8] |= 1 << (i % 8);
            }
        }
        Self {
            bytes: bytes.into(),
            len: valid.len(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        debug_assert!(i < self.len);
        (self.bytes[i / 8] >> (i % 8)) & 1 != 0
    }

    pub fn null_count(&self) -> usize {
        let full_bytes = self.len / 8;
        let mut ones: u32 = self.bytes[..full_bytes].iter().map(|b| b.count_ones()).sum();
        for i in full_bytes * 8..self.len {
            if self.is_valid(i) {
                ones += 1;
            }
        }
        self.len - ones as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_bools() {
        let valid = [true, false, true, true, false, false, true, true, true];
        let bm = NullBitmap::from_bools(&valid);
        for (i, &v) in valid.iter().enumerate() {
            assert_eq!(bm.is_valid(i), v);
        }
        assert_eq!(bm.null_count(), valid.iter().filter(|v| !**v).count());
    }
}
