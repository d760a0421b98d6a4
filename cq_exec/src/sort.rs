use std::cmp::Ordering;

use cq_plan::{SortDirection, SortKey};
use cq_schema::Scalar;

/// Total order over two same-column scalars: nulls sort last regardless of
/// direction (the common `NULLS LAST` SQL default), otherwise the derived
/// `PartialOrd` on `Scalar` (which is total for any pair produced by the
/// same typed column).
fn compare_scalars(a: &Scalar, b: &Scalar) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
    }
}

fn compare_rows(a: &[Scalar], b: &[Scalar], keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ord = compare_scalars(&a[key.column], &b[key.column]);
        let ord = if key.direction == SortDirection::Desc { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Full stable sort by `keys`, in priority order (first key is the primary
/// sort column).
pub fn sort_rows(mut rows: Vec<Vec<Scalar>>, keys: &[SortKey]) -> Vec<Vec<Scalar>> {
    rows.sort_by(|a, b| compare_rows(a, b, keys));
    rows
}

/// Selects the top `k` rows in `keys` order without a full sort: `best`
/// stays sorted and capped at `k` entries, so a row that sorts worse than
/// the current k-th candidate is rejected in `O(log k)` without touching
/// the rest of the input. `O(n log k)` overall versus `O(n log n)` for
/// [`sort_rows`] followed by a truncation.
pub fn top_k(rows: Vec<Vec<Scalar>>, keys: &[SortKey], k: usize) -> Vec<Vec<Scalar>> {
    if k == 0 {
        return Vec::new();
    }
    let mut best: Vec<Vec<Scalar>> = Vec::with_capacity(k + 1);
    for row in rows {
        let pos = best.partition_point(|existing| compare_rows(existing, &row, keys) != Ordering::Greater);
        if best.len() < k {
            best.insert(pos, row);
        } else if pos < k {
            best.insert(pos, row);
            best.pop();
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(n: i64) -> Vec<Scalar> {
        vec![Scalar::Int64(n)]
    }

    #[test]
    fn sort_rows_ascending() {
        let rows = vec![row(3), row(1), row(2)];
        let keys = vec![SortKey { column: 0, direction: SortDirection::Asc }];
        let sorted = sort_rows(rows, &keys);
        assert_eq!(sorted, vec![row(1), row(2), row(3)]);
    }

    #[test]
    fn top_k_matches_sort_then_truncate() {
        let rows = vec![row(5), row(1), row(4), row(2), row(3)];
        let keys = vec![SortKey { column: 0, direction: SortDirection::Desc }];
        let top = top_k(rows.clone(), &keys, 2);
        let mut full = sort_rows(rows, &keys);
        full.truncate(2);
        assert_eq!(top, full);
    }

    #[test]
    fn nulls_sort_last_regardless_of_direction() {
        let rows = vec![row(1), vec![Scalar::Null], row(2)];
        let asc = sort_rows(rows.clone(), &[SortKey { column: 0, direction: SortDirection::Asc }]);
        assert_eq!(asc.last().unwrap(), &vec![Scalar::Null]);
        let desc = sort_rows(rows, &[SortKey { column: 0, direction: SortDirection::Desc }]);
        assert_eq!(desc.last().unwrap(), &vec![Scalar::Null]);
    }
}
