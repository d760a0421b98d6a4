//! Physical planner: picks a concrete execution strategy for each logical
//! node from cost signals (row count, predicate count, hardware SIMD
//! class, worker count) and lowers the logical tree into a
//! [`PhysicalPlan`] the executor can drive directly.

pub mod plan;
pub mod strategy;

use std::sync::Arc;

use cq_plan::{AggExpr, LogicalPlan, ProjectionItem};
use cq_predicate::Predicate;
use cq_schema::Schema;

pub use plan::PhysicalPlan;
pub use strategy::{
    AggregateStrategy, CostSignals, FilterStrategy, HashAggregateStrategy, MaterializeTarget, OutputKind, ScanStrategy, SimdClass,
};

use plan::unwrap_logical_plan;

/// Expected group count above which a parallel hash aggregate's per-worker
/// partial tables would thrash L1: the planner falls back to a single
/// merged table rather than partitioning an already-cache-unfriendly join.
pub const L1_CACHE_CAPACITY_GROUPS: u64 = 50_000;

/// A fully lowered, ready-to-execute plan: the physical operator tree plus
/// the `Limit`/`Offset` values that apply to its final row order (lifted
/// off the logical tree by [`unwrap_logical_plan`] since `Limit`/`Offset`
/// don't get their own physical node -- see `plan::PendingMarkers`).
#[derive(Debug, Clone)]
pub struct PhysicalQuery {
    pub root: PhysicalPlan,
    pub limit: Option<u64>,
    pub offset: u64,
}

/// Lowers an optimized [`LogicalPlan`] into a [`PhysicalQuery`].
///
/// `sort_threshold`: a `Sort` directly under a satisfied `Limit <= sort_threshold`
/// gets a top-k heap (`SortOp::top_k`) instead of a full sort.
/// `output_kind`: whether the final materialization should build columnar
/// output or invoke the row constructor -- a caller-time choice (`to_list()`
/// vs `to_columnar()`), not something the cached logical plan encodes.
pub fn translate(plan: &LogicalPlan, signals: &CostSignals, sort_threshold: u64, output_kind: OutputKind) -> PhysicalQuery {
    let (inner, markers) = unwrap_logical_plan(plan);
    let physical = translate_node(inner, signals);
    let physical = ensure_materialized(physical, &inner.output_schema());
    let physical = set_output_kind(physical, output_kind);
    let physical = attach_markers(physical, markers.limit, markers.offset, sort_threshold);
    PhysicalQuery {
        root: physical,
        limit: markers.limit,
        offset: markers.offset,
    }
}

fn translate_node(plan: &LogicalPlan, signals: &CostSignals) -> PhysicalPlan {
    match plan {
        LogicalPlan::Scan { table_ref, schema, .. } => PhysicalPlan::ChunkedScan {
            table_ref: table_ref.clone(),
            schema: Arc::clone(schema),
            strategy: scan_strategy(signals),
            limit: None,
            offset: 0,
        },
        LogicalPlan::Filter { child, predicates, .. } => PhysicalPlan::FilterOp {
            child: Box::new(translate_node(child, signals)),
            predicates: predicates.clone(),
            strategy: filter_strategy(predicates.len(), signals),
            limit: None,
        },
        LogicalPlan::Project { child, outputs, .. } => PhysicalPlan::MaterializeOp {
            child: Box::new(translate_node(child, signals)),
            outputs: outputs.clone(),
            target: MaterializeTarget::Columnar,
        },
        LogicalPlan::Aggregate { child, aggs, .. } => translate_aggregate(child, aggs, signals),
        LogicalPlan::GroupBy {
            child,
            key_columns,
            key_property_name,
            aggs,
            estimated_rows,
        } => translate_group_by(child, key_columns, key_property_name, aggs, *estimated_rows, signals),
        LogicalPlan::Sort { child, keys, .. } => {
            let child_physical = ensure_materialized(translate_node(child, signals), &child.output_schema());
            PhysicalPlan::SortOp {
                child: Box::new(child_physical),
                keys: keys.clone(),
                top_k: None,
            }
        }
        // Limit/Offset never appear mid-tree post-optimization (the only
        // place they survive is the very top, already peeled off by
        // `unwrap_logical_plan`); a nested occurrence is translated as a
        // structural no-op over its child so recursion never panics on an
        // un-optimized or hand-built plan.
        LogicalPlan::Limit { child, .. } | LogicalPlan::Offset { child, .. } => translate_node(child, signals),
    }
}

fn translate_aggregate(child: &LogicalPlan, aggs: &[AggExpr], signals: &CostSignals) -> PhysicalPlan {
    let strategy = aggregate_strategy(signals);
    if let LogicalPlan::Filter { child: filter_child, predicates, fuseable: true, .. } = child {
        PhysicalPlan::FusedFilterAggregate {
            child: Box::new(translate_node(filter_child, signals)),
            predicates: predicates.clone(),
            aggs: aggs.to_vec(),
            strategy,
        }
    } else {
        PhysicalPlan::AggregateOp {
            child: Box::new(translate_node(child, signals)),
            aggs: aggs.to_vec(),
            strategy,
        }
    }
}

fn translate_group_by(
    child: &LogicalPlan,
    key_columns: &[usize],
    key_property_name: &str,
    aggs: &[AggExpr],
    estimated_groups: u64,
    signals: &CostSignals,
) -> PhysicalPlan {
    let (inner_child, predicates) = if let LogicalPlan::Filter { child: filter_child, predicates, fuseable: true, .. } = child {
        (translate_node(filter_child, signals), predicates.clone())
    } else {
        (translate_node(child, signals), Vec::new())
    };
    let strategy = if signals.wants_parallel_group_by(estimated_groups, L1_CACHE_CAPACITY_GROUPS) {
        HashAggregateStrategy::Parallel
    } else {
        HashAggregateStrategy::SingleThreaded
    };
    PhysicalPlan::HashAggregate {
        child: Box::new(inner_child),
        key_columns: key_columns.to_vec(),
        key_property_name: key_property_name.to_string(),
        aggs: aggs.to_vec(),
        strategy,
        predicates,
    }
}

fn scan_strategy(signals: &CostSignals) -> ScanStrategy {
    if signals.wants_parallel_scan() {
        ScanStrategy::Parallel
    } else {
        ScanStrategy::Sequential
    }
}

/// `predicate_count` is accepted (rather than dropped) to keep this
/// function's signature available as a cost signal, even though every leaf
/// currently shares one scalar-fallback kernel and the count doesn't change
/// the strategy choice today.
fn filter_strategy(_predicate_count: usize, signals: &CostSignals) -> FilterStrategy {
    if signals.wants_parallel_scan() {
        FilterStrategy::Parallel
    } else if signals.wants_simd() {
        FilterStrategy::Simd
    } else {
        FilterStrategy::Scalar
    }
}

fn aggregate_strategy(signals: &CostSignals) -> AggregateStrategy {
    if signals.wants_parallel_scan() {
        AggregateStrategy::Parallel
    } else {
        AggregateStrategy::Simd
    }
}

/// Ensures `physical`'s output is row-addressable (columnar or sorted rows)
/// by inserting an identity `MaterializeOp` when the translated tree ends
/// directly on a `Scan`/`Filter`/`Aggregate`/`HashAggregate` with no
/// explicit `Project` above it (e.g. `SELECT *` or a bare aggregate).
fn ensure_materialized(physical: PhysicalPlan, schema: &Schema) -> PhysicalPlan {
    match physical {
        PhysicalPlan::MaterializeOp { .. } | PhysicalPlan::SortOp { .. } => physical,
        other => PhysicalPlan::MaterializeOp {
            child: Box::new(other),
            outputs: identity_projection(schema),
            target: MaterializeTarget::Columnar,
        },
    }
}

fn identity_projection(schema: &Schema) -> Vec<ProjectionItem> {
    schema
        .fields()
        .iter()
        .map(|f| ProjectionItem {
            source_ordinal: f.ordinal(),
            output_name: f.name().to_string(),
        })
        .collect()
}

/// Overrides the final `MaterializeOp`'s target with the caller-requested
/// `output_kind`. If `physical`'s root is a `SortOp`, the target belongs to
/// its child materialize step instead (a `Sort` never materializes rows
/// itself -- it reorders whatever its child already produced).
fn set_output_kind(physical: PhysicalPlan, output_kind: OutputKind) -> PhysicalPlan {
    let target = match output_kind {
        OutputKind::Columnar => MaterializeTarget::Columnar,
        OutputKind::Rowwise => MaterializeTarget::Rowwise,
    };
    match physical {
        PhysicalPlan::MaterializeOp { child, outputs, .. } => PhysicalPlan::MaterializeOp { child, outputs, target },
        PhysicalPlan::SortOp { child, keys, top_k } => PhysicalPlan::SortOp {
            child: Box::new(set_output_kind(*child, output_kind)),
            keys,
            top_k,
        },
        other => other,
    }
}

/// Attaches the `Limit` value onto the driving operator so the executor can
/// stop scanning chunks once it's satisfied: a `SortOp` root gets a top-k
/// heap (when `n <= sort_threshold`); otherwise the nearest `ChunkedScan`/
/// `FilterOp` in the chain is annotated directly as an inline marker.
fn attach_markers(physical: PhysicalPlan, limit: Option<u64>, offset: u64, sort_threshold: u64) -> PhysicalPlan {
    if limit.is_none() && offset == 0 {
        return physical;
    }
    match physical {
        PhysicalPlan::SortOp { child, keys, .. } => {
            let top_k = limit.filter(|&n| n <= sort_threshold);
            PhysicalPlan::SortOp { child, keys, top_k }
        }
        PhysicalPlan::MaterializeOp { child, outputs, target } => PhysicalPlan::MaterializeOp {
            child: Box::new(attach_to_driving_operator(*child, limit, offset)),
            outputs,
            target,
        },
        other => attach_to_driving_operator(other, limit, offset),
    }
}

/// Scan-level early-exit hint: the sequential executor path stops issuing
/// chunks once it has collected `offset + limit` rows, so `LIMIT 0` never
/// scans a chunk at all. A parallel scan/filter strategy is downgraded to
/// sequential whenever `limit` is set, since static partitioning hands out
/// whole ranges up front with no way to cancel a worker early. The executor
/// still applies the final `limit`/`offset` from `PhysicalQuery` itself --
/// this hint only bounds how much work produces the row set that gets
/// truncated, never which rows end up in it.
fn attach_to_driving_operator(physical: PhysicalPlan, limit: Option<u64>, offset: u64) -> PhysicalPlan {
    match physical {
        PhysicalPlan::ChunkedScan { table_ref, schema, strategy, .. } => PhysicalPlan::ChunkedScan {
            table_ref,
            schema,
            strategy,
            limit,
            offset,
        },
        PhysicalPlan::FilterOp { child, predicates, strategy, .. } => PhysicalPlan::FilterOp {
            child: Box::new(attach_to_driving_operator(*child, limit, offset)),
            predicates,
            strategy,
            limit,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cq_plan::{AggFunc, LogicalPlan, SortDirection, SortKey};
    use cq_predicate::ComparisonOp;
    use cq_schema::{FieldSpec, LogicalType, Scalar, Schema};

    use super::*;

    fn employees_schema() -> Arc<Schema> {
        Arc::new(Schema::new([FieldSpec::new("id", LogicalType::Int64, false), FieldSpec::new("age", LogicalType::Int32, false)]).unwrap())
    }

    fn scan() -> LogicalPlan {
        LogicalPlan::Scan {
            table_ref: "employees".into(),
            schema: employees_schema(),
            estimated_rows: 10,
        }
    }

    fn small_table_signals() -> CostSignals {
        CostSignals {
            total_rows: 10,
            chunk_count: 1,
            predicate_count: 0,
            simd_class: SimdClass::Lanes256,
            worker_thread_count: 8,
            parallel_threshold: 50_000,
            parallel_group_by_threshold: 100_000,
            enable_simd: true,
        }
    }

    #[test]
    fn bare_scan_gets_identity_materialize() {
        let query = translate(&scan(), &small_table_signals(), 10_000, OutputKind::Columnar);
        match query.root {
            PhysicalPlan::MaterializeOp { outputs, child, .. } => {
                assert_eq!(outputs.len(), 2);
                assert!(matches!(*child, PhysicalPlan::ChunkedScan { .. }));
            }
            other => panic!("expected MaterializeOp, got {other:?}"),
        }
    }

    #[test]
    fn small_table_picks_sequential_scalar() {
        let plan = LogicalPlan::Filter {
            child: Box::new(scan()),
            predicates: vec![Predicate::Compare { column: 1, op: ComparisonOp::Gt, operand: Scalar::Int32(30) }],
            fuseable: false,
            estimated_rows: 5,
        };
        let query = translate(&plan, &small_table_signals(), 10_000, OutputKind::Columnar);
        let filter = find_filter_op(&query.root).unwrap();
        match filter {
            PhysicalPlan::FilterOp { strategy, .. } => assert_eq!(*strategy, FilterStrategy::Simd),
            _ => unreachable!(),
        }
    }

    #[test]
    fn large_table_picks_parallel_scan_and_filter() {
        let signals = CostSignals {
            total_rows: 1_000_000,
            chunk_count: 16,
            ..small_table_signals()
        };
        let plan = LogicalPlan::Filter {
            child: Box::new(scan()),
            predicates: vec![Predicate::Compare { column: 1, op: ComparisonOp::Gt, operand: Scalar::Int32(30) }],
            fuseable: false,
            estimated_rows: 500_000,
        };
        let query = translate(&plan, &signals, 10_000, OutputKind::Columnar);
        let scan_op = find_scan_op(&query.root).unwrap();
        match scan_op {
            PhysicalPlan::ChunkedScan { strategy, .. } => assert_eq!(*strategy, ScanStrategy::Parallel),
            _ => unreachable!(),
        }
        let filter = find_filter_op(&query.root).unwrap();
        match filter {
            PhysicalPlan::FilterOp { strategy, .. } => assert_eq!(*strategy, FilterStrategy::Parallel),
            _ => unreachable!(),
        }
    }

    #[test]
    fn fuseable_filter_feeding_aggregate_becomes_fused_kernel() {
        let plan = LogicalPlan::Aggregate {
            child: Box::new(LogicalPlan::Filter {
                child: Box::new(scan()),
                predicates: vec![Predicate::Compare { column: 1, op: ComparisonOp::Gt, operand: Scalar::Int32(30) }],
                fuseable: true,
                estimated_rows: 5,
            }),
            aggs: vec![AggExpr { func: AggFunc::Count, output_name: "n".into() }],
            estimated_rows: 1,
        };
        let query = translate(&plan, &small_table_signals(), 10_000, OutputKind::Columnar);
        match query.root {
            PhysicalPlan::MaterializeOp { child, .. } => assert!(matches!(*child, PhysicalPlan::FusedFilterAggregate { .. })),
            other => panic!("expected MaterializeOp wrapping FusedFilterAggregate, got {other:?}"),
        }
    }

    #[test]
    fn limit_under_sort_threshold_gets_top_k() {
        let plan = LogicalPlan::Limit {
            child: Box::new(LogicalPlan::Sort {
                child: Box::new(scan()),
                keys: vec![SortKey { column: 1, direction: SortDirection::Desc }],
                estimated_rows: 10,
            }),
            n: 2,
            estimated_rows: 2,
        };
        let query = translate(&plan, &small_table_signals(), 10_000, OutputKind::Columnar);
        assert_eq!(query.limit, Some(2));
        match query.root {
            PhysicalPlan::SortOp { top_k, .. } => assert_eq!(top_k, Some(2)),
            other => panic!("expected SortOp at root, got {other:?}"),
        }
    }

    #[test]
    fn limit_without_sort_propagates_to_scan() {
        let plan = LogicalPlan::Limit {
            child: Box::new(scan()),
            n: 5,
            estimated_rows: 5,
        };
        let query = translate(&plan, &small_table_signals(), 10_000, OutputKind::Columnar);
        let scan_op = find_scan_op(&query.root).unwrap();
        match scan_op {
            PhysicalPlan::ChunkedScan { limit, .. } => assert_eq!(*limit, Some(5)),
            _ => unreachable!(),
        }
    }

    fn find_filter_op(p: &PhysicalPlan) -> Option<&PhysicalPlan> {
        match p {
            PhysicalPlan::FilterOp { .. } => Some(p),
            _ => p.child().and_then(find_filter_op),
        }
    }

    fn find_scan_op(p: &PhysicalPlan) -> Option<&PhysicalPlan> {
        match p {
            PhysicalPlan::ChunkedScan { .. } => Some(p),
            _ => p.child().and_then(find_scan_op),
        }
    }
}
