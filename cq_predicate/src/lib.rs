//! Column predicates: leaf comparisons, composites, selectivity estimation,
//! and zone-map-driven chunk pruning.

pub mod error;
pub mod leaf;
pub mod predicate;
pub mod selectivity;

pub use error::PredicateError;
pub use leaf::{ComparisonOp, InSetValues, StringOp};
pub use predicate::{ChunkDisposition, Predicate};

#[cfg(test)]
mod tests {
    use cq_bitmap::{Bitmap, Fill};
    use cq_schema::{FieldSpec, LogicalType, Scalar, Schema};
    use cq_store::builder::{int32_column, utf8_column};
    use cq_store::{Chunk, Table};
    use std::sync::Arc;

    use super::*;

    fn employee_chunk() -> (Arc<Schema>, Chunk) {
        let schema = Arc::new(
            Schema::new([
                FieldSpec::new("age", LogicalType::Int32, false),
                FieldSpec::new("name", LogicalType::Utf8, false),
            ])
            .unwrap(),
        );
        let age = int32_column(vec![25, 31, 42, 19, 60], None);
        let name = utf8_column(&["alice", "bob", "carol", "dave", "erin"], None);
        let chunk = Chunk::new(Arc::clone(&schema), vec![age, name], 5).unwrap();
        (schema, chunk)
    }

    #[test]
    fn compare_greater_than_clears_failing_rows() {
        let (_schema, chunk) = employee_chunk();
        let mut selection = Bitmap::new(5, Fill::AllSet);
        let pred = Predicate::Compare {
            column: 0,
            op: ComparisonOp::Gt,
            operand: Scalar::Int32(30),
        };
        pred.evaluate(&chunk, &mut selection).unwrap();
        assert_eq!(selection.iter_set_indices().collect::<Vec<_>>(), vec![1, 2, 4]);
    }

    #[test]
    fn evaluating_twice_is_idempotent() {
        let (_schema, chunk) = employee_chunk();
        let pred = Predicate::Compare {
            column: 0,
            op: ComparisonOp::Ge,
            operand: Scalar::Int32(25),
        };
        let mut once = Bitmap::new(5, Fill::AllSet);
        pred.evaluate(&chunk, &mut once).unwrap();

        let mut twice = once.clone();
        pred.evaluate(&chunk, &mut twice).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn and_is_equivalent_to_sequential_leaf_evaluation() {
        let (_schema, chunk) = employee_chunk();
        let and_pred = Predicate::And(vec![
            Predicate::Compare {
                column: 0,
                op: ComparisonOp::Ge,
                operand: Scalar::Int32(20),
            },
            Predicate::StringOp {
                column: 1,
                op: StringOp::Contains,
                pattern: "a".into(),
            },
        ]);
        let mut combined = Bitmap::new(5, Fill::AllSet);
        and_pred.evaluate(&chunk, &mut combined).unwrap();

        let mut sequential = Bitmap::new(5, Fill::AllSet);
        Predicate::Compare {
            column: 0,
            op: ComparisonOp::Ge,
            operand: Scalar::Int32(20),
        }
        .evaluate(&chunk, &mut sequential)
        .unwrap();
        Predicate::StringOp {
            column: 1,
            op: StringOp::Contains,
            pattern: "a".into(),
        }
        .evaluate(&chunk, &mut sequential)
        .unwrap();

        assert_eq!(combined, sequential);
    }

    #[test]
    fn or_unions_child_results_under_input_mask() {
        let (_schema, chunk) = employee_chunk();
        let mut selection = Bitmap::new(5, Fill::AllSet);
        selection.clear(4); // erin excluded from the input mask up front
        let pred = Predicate::Or(vec![
            Predicate::Compare {
                column: 0,
                op: ComparisonOp::Lt,
                operand: Scalar::Int32(20),
            },
            Predicate::Compare {
                column: 0,
                op: ComparisonOp::Gt,
                operand: Scalar::Int32(55),
            },
        ]);
        pred.evaluate(&chunk, &mut selection).unwrap();
        // row 3 (dave, 19) matches the first leaf; row 4 (erin, 60) would
        // match the second leaf but was excluded by the input mask.
        assert_eq!(selection.iter_set_indices().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn unknown_column_is_reported() {
        let (_schema, chunk) = employee_chunk();
        let mut selection = Bitmap::new(5, Fill::AllSet);
        let pred = Predicate::Compare {
            column: 99,
            op: ComparisonOp::Eq,
            operand: Scalar::Int32(1),
        };
        let err = pred.evaluate(&chunk, &mut selection).unwrap_err();
        assert!(matches!(err, PredicateError::UnknownColumn(99)));
    }

    #[test]
    fn compare_over_more_than_one_lane_matches_a_sequential_reference() {
        // 20 rows: two full 8-row lanes plus a 4-row tail, exercising the
        // lane-masked `and_mask8` fold path end to end rather than just its
        // single-lane case.
        let schema = Arc::new(Schema::new([FieldSpec::new("age", LogicalType::Int32, false)]).unwrap());
        let ages: Vec<i32> = (0..20).collect();
        let age = int32_column(ages.clone(), None);
        let chunk = Chunk::new(Arc::clone(&schema), vec![age], 20).unwrap();

        let mut selection = Bitmap::new(20, Fill::AllSet);
        selection.clear(3); // pre-cleared row must stay cleared through the fold
        let pred = Predicate::Compare { column: 0, op: ComparisonOp::Ge, operand: Scalar::Int32(10) };
        pred.evaluate(&chunk, &mut selection).unwrap();

        let expected: Vec<usize> = (0..20).filter(|&i| i != 3 && ages[i] >= 10).collect();
        assert_eq!(selection.iter_set_indices().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn never_clears_every_row_without_touching_column_data() {
        // `age` here is Int32; a hardcoded Scalar::Int64 sentinel would have
        // failed `evaluate_compare`'s type match and errored instead.
        let (_schema, chunk) = employee_chunk();
        let mut selection = Bitmap::new(5, Fill::AllSet);
        Predicate::Never.evaluate(&chunk, &mut selection).unwrap();
        assert!(selection.is_all_clear());
    }

    #[test]
    fn zone_map_skip_for_impossible_range_predicate() {
        let schema = Schema::new([FieldSpec::new("age", LogicalType::Int32, false)]).unwrap();
        let age = int32_column(vec![20, 25, 30], None);
        let table = Table::builder(schema).add_chunk(vec![age]).unwrap().build();
        use cq_store::ColumnarSource;
        let zone_maps = vec![table.zone_map(0, 0).unwrap().clone()];

        let pred = Predicate::Compare {
            column: 0,
            op: ComparisonOp::Gt,
            operand: Scalar::Int32(100),
        };
        assert_eq!(pred.chunk_disposition(&zone_maps), ChunkDisposition::Skip);
    }
}
