use ahash::RandomState;
use cq_schema::Scalar;

/// A small fixed-size Bloom filter over distinct column values, built at
/// ingest time for columns flagged low-cardinality. Used by the predicate
/// layer to prune a chunk on equality/`IN` predicates when the filter
/// reports the operand absent.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    hashers: [RandomState; 2],
    num_hashes: u32,
}

impl BloomFilter {
    /// `expected_items` sizes the filter for roughly a 1% false-positive
    /// rate at `num_hashes = 4`.
    pub fn new(expected_items: usize, num_hashes: u32) -> Self {
        let num_bits = (expected_items.max(1) * 10).next_power_of_two().max(64);
        Self {
            bits: vec![0u64; num_bits / 64],
            hashers: [
                RandomState::with_seeds(0x5165_4343, 0x1234_abcd, 0xdead_beef, 0xfeed_face),
                RandomState::with_seeds(0x9e37_79b9, 0x85eb_ca6b, 0xc2b2_ae35, 0x27d4_eb2f),
            ],
            num_hashes: num_hashes.max(1),
        }
    }

    fn bit_indices(&self, value: &[u8]) -> impl Iterator<Item = usize> + '_ {
        use std::hash::{BuildHasher, Hasher};
        let h1 = {
            let mut h = self.hashers[0].build_hasher();
            h.write(value);
            h.finish()
        };
        let h2 = {
            let mut h = self.hashers[1].build_hasher();
            h.write(value);
            h.finish()
        };
        let num_bits = (self.bits.len() * 64) as u64;
        (0..self.num_hashes).map(move |i| {
            // Double hashing (Kirsch-Mitzenmacher): avoids one hash per slot.
            (h1.wrapping_add((i as u64).wrapping_mul(h2)) % num_bits) as usize
        })
    }

    pub fn insert(&mut self, value: &[u8]) {
        for idx in self.bit_indices(value) {
            self.bits[idx / 64] |= 1u64 << (idx % 64);
        }
    }

    /// `false` is a definite "not present"; `true` means "maybe present".
    pub fn might_contain(&self, value: &[u8]) -> bool {
        self.bit_indices(value).all(|idx| self.bits[idx / 64] & (1u64 << (idx % 64)) != 0)
    }
}

/// Per-`(chunk, column)` summary statistics used for chunk pruning.
#[derive(Debug, Clone)]
pub struct ZoneMap {
    /// Absent iff every value in the column is null.
    pub min: Option<Scalar>,
    pub max: Option<Scalar>,
    pub null_count: u64,
    pub distinct_bloom: Option<BloomFilter>,
}

impl ZoneMap {
    pub fn all_null(len: usize) -> Self {
        Self {
            min: None,
            max: None,
            null_count: len as u64,
            distinct_bloom: None,
        }
    }

    /// `true` if the minimum/maximum are known, i.e. at least one non-null
    /// value exists in the chunk for this column.
    pub fn has_range(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloom_filter_has_no_false_negatives() {
        let mut bf = BloomFilter::new(100, 4);
        let values: Vec<String> = (0..100).map(|i| format!("item-{i}")).collect();
        for v in &values {
            bf.insert(v.as_bytes());
        }
        for v in &values {
            assert!(bf.might_contain(v.as_bytes()));
        }
    }

    #[test]
    fn bloom_filter_rejects_most_absent_values() {
        let mut bf = BloomFilter::new(50, 4);
        for i in 0..50 {
            bf.insert(format!("present-{i}").as_bytes());
        }
        let false_positives = (0..1000)
            .filter(|i| bf.might_contain(format!("absent-{i}").as_bytes()))
            .count();
        // Generous bound: this is a statistical property, not an exact one.
        assert!(false_positives < 100, "too many false positives: {false_positives}");
    }
}
