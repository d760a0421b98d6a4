//! Logical plan nodes, canonical fingerprinting, and the rule-based,
//! fixed-point optimizer.

pub mod error;
pub mod node;
pub mod optimizer;

pub use error::PlanError;
pub use node::{AggExpr, AggFunc, LogicalPlan, ProjectionItem, SortDirection, SortKey};
pub use optimizer::optimize;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cq_predicate::{ComparisonOp, Predicate};
    use cq_schema::{FieldSpec, LogicalType, Scalar, Schema};

    use super::*;

    fn employees_schema() -> Arc<Schema> {
        Arc::new(
            Schema::new([
                FieldSpec::new("id", LogicalType::Int64, false),
                FieldSpec::new("age", LogicalType::Int32, false),
                FieldSpec::new("salary", LogicalType::Float64, false),
            ])
            .unwrap(),
        )
    }

    fn scan() -> LogicalPlan {
        LogicalPlan::Scan {
            table_ref: "employees".into(),
            schema: employees_schema(),
            estimated_rows: 1000,
        }
    }

    #[test]
    fn filter_splitting_flattens_and_nodes() {
        let plan = LogicalPlan::Filter {
            child: Box::new(scan()),
            predicates: vec![Predicate::And(vec![
                Predicate::Compare { column: 1, op: ComparisonOp::Ge, operand: Scalar::Int32(18) },
                Predicate::Compare { column: 1, op: ComparisonOp::Le, operand: Scalar::Int32(65) },
            ])],
            fuseable: false,
            estimated_rows: 1000,
        };
        let optimized = optimize(plan);
        match optimized {
            LogicalPlan::Filter { predicates, .. } => assert_eq!(predicates.len(), 2),
            _ => panic!("expected a Filter at the root"),
        }
    }

    #[test]
    fn predicate_reordering_sorts_ascending_by_selectivity() {
        let plan = LogicalPlan::Filter {
            child: Box::new(scan()),
            predicates: vec![
                Predicate::Compare { column: 1, op: ComparisonOp::Ge, operand: Scalar::Int32(18) }, // range: 0.3
                Predicate::Compare { column: 0, op: ComparisonOp::Eq, operand: Scalar::Int64(7) },  // equality: 0.1
            ],
            fuseable: false,
            estimated_rows: 1000,
        };
        let optimized = optimize(plan);
        match optimized {
            LogicalPlan::Filter { predicates, .. } => {
                assert!(matches!(predicates[0], Predicate::Compare { op: ComparisonOp::Eq, .. }));
            }
            _ => panic!("expected a Filter at the root"),
        }
    }

    #[test]
    fn tautology_is_dropped() {
        let plan = LogicalPlan::Filter {
            child: Box::new(scan()),
            predicates: vec![Predicate::IsNotNull { column: 0 }],
            fuseable: false,
            estimated_rows: 1000,
        };
        let optimized = optimize(plan);
        match optimized {
            LogicalPlan::Filter { predicates, .. } => assert!(predicates.is_empty()),
            _ => panic!("expected a Filter at the root"),
        }
    }

    #[test]
    fn contradiction_folds_filter_to_unsatisfiable() {
        let plan = LogicalPlan::Filter {
            child: Box::new(scan()),
            predicates: vec![
                Predicate::Compare { column: 1, op: ComparisonOp::Gt, operand: Scalar::Int32(10) },
                Predicate::Compare { column: 1, op: ComparisonOp::Lt, operand: Scalar::Int32(5) },
            ],
            fuseable: false,
            estimated_rows: 1000,
        };
        let optimized = optimize(plan);
        match optimized {
            LogicalPlan::Filter { estimated_rows, predicates, .. } => {
                assert_eq!(estimated_rows, 0);
                assert_eq!(predicates.len(), 1);
                assert!(matches!(predicates[0], Predicate::Never));
            }
            _ => panic!("expected a Filter at the root"),
        }
    }

    #[test]
    fn contradiction_sentinel_evaluates_cleanly_against_an_int32_column() {
        use cq_bitmap::{Bitmap, Fill};
        use cq_store::builder::{float64_column, int32_column, int64_column};
        use cq_store::Chunk;

        // Column 1 ("age") is Int32 here, the same type mismatch that once
        // tripped `evaluate_compare`'s Int32 arm when the sentinel hardcoded
        // `Scalar::Int64`. `Predicate::Never` must clear the selection
        // without ever inspecting the column's data or its logical type.
        let schema = employees_schema();
        let id = int64_column(vec![1, 2, 3], None);
        let age = int32_column(vec![20, 40, 60], None);
        let salary = float64_column(vec![1.0, 2.0, 3.0], None);
        let chunk = Chunk::new(Arc::clone(&schema), vec![id, age, salary], 3).unwrap();
        let mut selection = Bitmap::new(3, Fill::AllSet);
        Predicate::Never.evaluate(&chunk, &mut selection).unwrap();
        assert!(selection.is_all_clear());
    }

    #[test]
    fn filter_pushes_down_through_project() {
        let plan = LogicalPlan::Filter {
            child: Box::new(LogicalPlan::Project {
                child: Box::new(scan()),
                outputs: vec![
                    ProjectionItem { source_ordinal: 1, output_name: "age".into() },
                    ProjectionItem { source_ordinal: 2, output_name: "salary".into() },
                ],
                estimated_rows: 1000,
            }),
            predicates: vec![Predicate::Compare { column: 0, op: ComparisonOp::Ge, operand: Scalar::Int32(18) }],
            fuseable: false,
            estimated_rows: 1000,
        };
        let optimized = optimize(plan);
        match optimized {
            LogicalPlan::Project { child, .. } => match *child {
                LogicalPlan::Filter { predicates, .. } => {
                    assert!(matches!(predicates[0], Predicate::Compare { column: 1, .. }));
                }
                _ => panic!("expected Filter pushed below Project"),
            },
            _ => panic!("expected Project at the root after pushdown"),
        }
    }

    #[test]
    fn limit_pushes_down_through_project() {
        let plan = LogicalPlan::Limit {
            child: Box::new(LogicalPlan::Project {
                child: Box::new(scan()),
                outputs: vec![ProjectionItem { source_ordinal: 0, output_name: "id".into() }],
                estimated_rows: 1000,
            }),
            n: 10,
            estimated_rows: 10,
        };
        let optimized = optimize(plan);
        assert!(matches!(optimized, LogicalPlan::Project { .. }));
    }

    #[test]
    fn filter_feeding_aggregate_is_marked_fuseable() {
        let plan = LogicalPlan::Aggregate {
            child: Box::new(LogicalPlan::Filter {
                child: Box::new(scan()),
                predicates: vec![Predicate::Compare { column: 1, op: ComparisonOp::Ge, operand: Scalar::Int32(18) }],
                fuseable: false,
                estimated_rows: 1000,
            }),
            aggs: vec![AggExpr { func: AggFunc::Count, output_name: "n".into() }],
            estimated_rows: 1,
        };
        let optimized = optimize(plan);
        match optimized {
            LogicalPlan::Aggregate { child, .. } => match *child {
                LogicalPlan::Filter { fuseable, .. } => assert!(fuseable),
                _ => panic!("expected Filter below Aggregate"),
            },
            _ => panic!("expected Aggregate at the root"),
        }
    }

    #[test]
    fn canonical_text_is_stable_across_equivalent_rebuilds() {
        let plan_a = scan();
        let plan_b = scan();
        assert_eq!(plan_a.canonical_text(), plan_b.canonical_text());
        assert_eq!(plan_a.fingerprint(), plan_b.fingerprint());
    }
}
