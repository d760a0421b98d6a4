/// Splits `0..chunk_count` into exactly `worker_count` contiguous,
/// non-overlapping ranges, as evenly sized as possible (the first
/// `chunk_count % worker_count` ranges get one extra chunk). This is decided
/// once, before any worker starts, so there is no work-stealing: a worker
/// that finishes its range early sits idle rather than reaching into a
/// neighbor's.
///
/// Returns fewer than `worker_count` ranges when `chunk_count < worker_count`
/// (one worker per chunk, no empty ranges handed out).
pub fn static_partition(chunk_count: usize, worker_count: usize) -> Vec<std::ops::Range<usize>> {
    if chunk_count == 0 || worker_count == 0 {
        return Vec::new();
    }
    let worker_count = worker_count.min(chunk_count);
    let base = chunk_count / worker_count;
    let remainder = chunk_count % worker_count;
    let mut ranges = Vec::with_capacity(worker_count);
    let mut start = 0;
    for worker in 0..worker_count {
        let len = base + usize::from(worker < remainder);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_evenly_when_divisible() {
        let ranges = static_partition(8, 4);
        assert_eq!(ranges, vec![0..2, 2..4, 4..6, 6..8]);
    }

    #[test]
    fn front_ranges_absorb_the_remainder() {
        let ranges = static_partition(10, 4);
        assert_eq!(ranges, vec![0..3, 3..6, 6..8, 8..10]);
        let total: usize = ranges.iter().map(|r| r.len()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn never_hands_out_more_ranges_than_chunks() {
        let ranges = static_partition(2, 8);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges, vec![0..1, 1..2]);
    }

    #[test]
    fn empty_table_yields_no_ranges() {
        assert!(static_partition(0, 4).is_empty());
    }
}
