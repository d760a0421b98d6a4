use std::sync::Arc;

use cq_plan::{AggExpr, LogicalPlan, ProjectionItem, SortKey};
use cq_predicate::Predicate;
use cq_schema::Schema;

use crate::strategy::{AggregateStrategy, FilterStrategy, HashAggregateStrategy, MaterializeTarget, ScanStrategy};

/// A physical plan node: the same shape as its logical counterpart, plus a
/// chosen execution strategy. `Limit`/`Offset` don't get their own node --
/// they're inline markers carried by whichever operator drives the scan.
#[derive(Debug, Clone)]
pub enum PhysicalPlan {
    ChunkedScan {
        table_ref: String,
        schema: Arc<Schema>,
        strategy: ScanStrategy,
        limit: Option<u64>,
        offset: u64,
    },
    FilterOp {
        child: Box<PhysicalPlan>,
        predicates: Vec<Predicate>,
        strategy: FilterStrategy,
        limit: Option<u64>,
    },
    FusedFilterAggregate {
        child: Box<PhysicalPlan>,
        predicates: Vec<Predicate>,
        aggs: Vec<AggExpr>,
        strategy: AggregateStrategy,
    },
    AggregateOp {
        child: Box<PhysicalPlan>,
        aggs: Vec<AggExpr>,
        strategy: AggregateStrategy,
    },
    HashAggregate {
        child: Box<PhysicalPlan>,
        key_columns: Vec<usize>,
        key_property_name: String,
        aggs: Vec<AggExpr>,
        strategy: HashAggregateStrategy,
        /// Non-empty when the optimizer marked the Filter feeding this
        /// GroupBy `fuseable`: the single-pass kernel applies these
        /// predicates and updates group accumulators without an
        /// intermediate `FilterOp`/selection-bitmap materialization.
        predicates: Vec<Predicate>,
    },
    MaterializeOp {
        child: Box<PhysicalPlan>,
        outputs: Vec<ProjectionItem>,
        target: MaterializeTarget,
    },
    SortOp {
        child: Box<PhysicalPlan>,
        keys: Vec<SortKey>,
        /// `Some(n)` when a Limit sits directly above this Sort and
        /// `n <= sort_threshold`: the executor uses a top-k heap instead of
        /// a full sort.
        top_k: Option<u64>,
    },
}

impl PhysicalPlan {
    pub fn child(&self) -> Option<&PhysicalPlan> {
        match self {
            PhysicalPlan::ChunkedScan { .. } => None,
            PhysicalPlan::FilterOp { child, .. }
            | PhysicalPlan::FusedFilterAggregate { child, .. }
            | PhysicalPlan::AggregateOp { child, .. }
            | PhysicalPlan::HashAggregate { child, .. }
            | PhysicalPlan::MaterializeOp { child, .. }
            | PhysicalPlan::SortOp { child, .. } => Some(child),
        }
    }
}

/// The pieces of a `LogicalPlan` the translator needs but that don't
/// survive into `PhysicalPlan` as their own node (Limit/Offset values,
/// whether a Sort has a Limit parent).
pub(crate) struct PendingMarkers {
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Default for PendingMarkers {
    fn default() -> Self {
        Self { limit: None, offset: 0 }
    }
}

pub(crate) fn unwrap_logical_plan(plan: &LogicalPlan) -> (&LogicalPlan, PendingMarkers) {
    let mut markers = PendingMarkers::default();
    let mut current = plan;
    loop {
        match current {
            LogicalPlan::Limit { child, n, .. } => {
                markers.limit = Some(markers.limit.map_or(*n, |existing| existing.min(*n)));
                current = child;
            }
            LogicalPlan::Offset { child, n, .. } => {
                markers.offset += n;
                current = child;
            }
            _ => return (current, markers),
        }
    }
}
