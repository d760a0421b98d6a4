use std::sync::Arc;

use cq_physical::{AggregateStrategy, FilterStrategy, HashAggregateStrategy, MaterializeTarget, PhysicalPlan, PhysicalQuery, ScanStrategy};
use cq_plan::SortKey;
use cq_predicate::Predicate;
use cq_schema::{FieldSpec, LogicalType, Schema, Scalar};
use cq_store::{ColumnarSource, EngineConfig};

use crate::aggregate;
use crate::cancellation::CancellationToken;
use crate::error::ExecError;
use crate::group_by::{self, GroupRow};
use crate::materialize::{self, ColumnarBatch, RowBatch};
use crate::sort;

/// Final output shape of a completed query: the row-major shape `to_list()`
/// returns, or the columnar shape `to_columnar()` returns.
pub enum QueryResult {
    Rows(RowBatch),
    Columnar(ColumnarBatch),
}

/// Predicates and row bound inherited by an `AggregateOp`/`FusedFilterAggregate`/
/// `HashAggregate`/plain scan from the `ChunkedScan`/`FilterOp` chain beneath
/// it. Physical translation never nests a `FilterOp` under another
/// `FilterOp` (the optimizer merges predicate sets into one node), so this
/// walk is at most two levels deep.
struct ScanChain<'p> {
    predicates: Vec<Predicate>,
    scan_parallel: bool,
    filter_parallel: bool,
    schema: &'p Schema,
    limit: Option<u64>,
    offset: u64,
}

fn resolve_scan_chain(plan: &PhysicalPlan) -> Result<ScanChain<'_>, ExecError> {
    match plan {
        PhysicalPlan::ChunkedScan { schema, strategy, limit, offset, .. } => Ok(ScanChain {
            predicates: Vec::new(),
            scan_parallel: *strategy == ScanStrategy::Parallel,
            filter_parallel: false,
            schema: schema.as_ref(),
            limit: *limit,
            offset: *offset,
        }),
        PhysicalPlan::FilterOp { child, predicates, strategy, limit } => {
            let mut chain = resolve_scan_chain(child)?;
            chain.predicates.extend(predicates.clone());
            chain.filter_parallel = *strategy == FilterStrategy::Parallel;
            if limit.is_some() {
                chain.limit = *limit;
            }
            Ok(chain)
        }
        other => Err(ExecError::CorruptChunk(format!("expected a scan/filter chain, found {other:?}"))),
    }
}

fn aggregate_output_schema(aggs: &[cq_plan::AggExpr], source_schema: &Schema) -> Result<Arc<Schema>, ExecError> {
    let specs = aggs
        .iter()
        .map(|agg| {
            let logical_type = match agg.func.source_column() {
                Some(c) => source_schema
                    .field(c)
                    .ok_or_else(|| ExecError::CorruptChunk(format!("aggregate source ordinal {c} out of range")))?
                    .logical_type(),
                None => LogicalType::Int64,
            };
            Ok(FieldSpec::new(agg.output_name.clone(), logical_type, true))
        })
        .collect::<Result<Vec<FieldSpec>, ExecError>>()?;
    Schema::new(specs).map(Arc::new).map_err(|e| ExecError::CorruptChunk(e.to_string()))
}

fn group_by_output_schema(
    key_property_name: &str,
    key_columns: &[usize],
    aggs: &[cq_plan::AggExpr],
    source_schema: &Schema,
) -> Result<Arc<Schema>, ExecError> {
    let mut specs = Vec::with_capacity(1 + aggs.len());
    if key_columns.len() == 1 {
        let field = source_schema
            .field(key_columns[0])
            .ok_or_else(|| ExecError::CorruptChunk(format!("group-by key ordinal {} out of range", key_columns[0])))?;
        specs.push(FieldSpec::new(key_property_name.to_string(), field.logical_type(), true));
    } else {
        specs.push(FieldSpec::new(key_property_name.to_string(), LogicalType::Utf8, false));
    }
    let agg_schema = aggregate_output_schema(aggs, source_schema)?;
    specs.extend(agg_schema.fields().iter().map(|f| FieldSpec::new(f.name().to_string(), f.logical_type(), f.nullable())));
    Schema::new(specs).map(Arc::new).map_err(|e| ExecError::CorruptChunk(e.to_string()))
}

fn group_rows_to_rows(rows: Vec<GroupRow>) -> Vec<Vec<Scalar>> {
    rows.into_iter()
        .map(|row| {
            let mut out = Vec::with_capacity(1 + row.values.len());
            out.push(row.key);
            out.extend(row.values);
            out
        })
        .collect()
}

/// Walks one `PhysicalPlan` node, producing its natural (unprojected) row
/// batch. The caller (always a `MaterializeOp` or the root) is responsible
/// for projecting the result through its `outputs`.
fn execute_node(
    plan: &PhysicalPlan,
    source: &dyn ColumnarSource,
    worker_count: usize,
    cancellation: &CancellationToken,
) -> Result<RowBatch, ExecError> {
    match plan {
        PhysicalPlan::ChunkedScan { schema, strategy, limit, offset, .. } => {
            // A limit hint forces the sequential path: static partitioning
            // hands each worker its range up front with no way to tell it
            // to stop early once downstream has enough rows.
            let parallel = *strategy == ScanStrategy::Parallel && limit.is_none();
            let rows = materialize::gather_rows(source, &[], parallel, worker_count, *limit, *offset, cancellation)?;
            Ok(RowBatch { schema: Arc::clone(schema), rows })
        }
        PhysicalPlan::FilterOp { .. } => {
            let chain = resolve_scan_chain(plan)?;
            let parallel = (chain.scan_parallel || chain.filter_parallel) && chain.limit.is_none();
            let rows = materialize::gather_rows(source, &chain.predicates, parallel, worker_count, chain.limit, chain.offset, cancellation)?;
            Ok(RowBatch {
                schema: Arc::new(chain.schema.clone()),
                rows,
            })
        }
        PhysicalPlan::AggregateOp { child, aggs, strategy } => {
            let chain = resolve_scan_chain(child)?;
            let parallel = *strategy == AggregateStrategy::Parallel;
            let scalars = aggregate::run(source, &chain.predicates, aggs, parallel, worker_count, cancellation)?;
            Ok(RowBatch {
                schema: aggregate_output_schema(aggs, chain.schema)?,
                rows: vec![scalars],
            })
        }
        PhysicalPlan::FusedFilterAggregate { child, predicates, aggs, strategy } => {
            let chain = resolve_scan_chain(child)?;
            let mut all_predicates = chain.predicates;
            all_predicates.extend(predicates.clone());
            let parallel = *strategy == AggregateStrategy::Parallel;
            let scalars = aggregate::run(source, &all_predicates, aggs, parallel, worker_count, cancellation)?;
            Ok(RowBatch {
                schema: aggregate_output_schema(aggs, chain.schema)?,
                rows: vec![scalars],
            })
        }
        PhysicalPlan::HashAggregate {
            child,
            key_columns,
            key_property_name,
            aggs,
            strategy,
            predicates,
        } => {
            let chain = resolve_scan_chain(child)?;
            let mut all_predicates = chain.predicates;
            all_predicates.extend(predicates.clone());
            let parallel = *strategy == HashAggregateStrategy::Parallel;
            let groups = group_by::run(source, &all_predicates, key_columns, aggs, parallel, worker_count, cancellation)?;
            Ok(RowBatch {
                schema: group_by_output_schema(key_property_name, key_columns, aggs, chain.schema)?,
                rows: group_rows_to_rows(groups),
            })
        }
        PhysicalPlan::MaterializeOp { child, outputs, .. } => {
            let natural = execute_node(child, source, worker_count, cancellation)?;
            let (schema, rows) = materialize::project(&natural.schema, &natural.rows, outputs)?;
            Ok(RowBatch { schema, rows })
        }
        PhysicalPlan::SortOp { child, keys, top_k } => {
            let natural = execute_node(child, source, worker_count, cancellation)?;
            let rows = sort_batch(natural.rows, keys, *top_k);
            Ok(RowBatch { schema: natural.schema, rows })
        }
    }
}

fn sort_batch(rows: Vec<Vec<Scalar>>, keys: &[SortKey], top_k: Option<u64>) -> Vec<Vec<Scalar>> {
    match top_k {
        Some(k) => sort::top_k(rows, keys, k as usize),
        None => sort::sort_rows(rows, keys),
    }
}

fn materialize_target_of(plan: &PhysicalPlan) -> MaterializeTarget {
    match plan {
        PhysicalPlan::MaterializeOp { target, .. } => *target,
        PhysicalPlan::SortOp { child, .. } => materialize_target_of(child),
        _ => MaterializeTarget::Columnar,
    }
}

/// Runs a fully lowered [`PhysicalQuery`] against `source`, applying the
/// query's `limit`/`offset` as the final, authoritative truncation. Any
/// `limit`/`offset` hints baked onto individual nodes by
/// `cq_physical::translate` are honored earlier, inside `execute_node`'s
/// scan/filter chain, to bound how many chunks get touched in the first
/// place -- this final `skip`/`take` is what makes that early exit safe to
/// apply even when it stops a few rows past what's strictly needed.
pub fn run(query: &PhysicalQuery, source: &dyn ColumnarSource, config: &EngineConfig, cancellation: &CancellationToken) -> Result<QueryResult, ExecError> {
    let worker_count = config.resolved_degree_of_parallelism();
    let mut batch = execute_node(&query.root, source, worker_count, cancellation)?;

    let offset = query.offset as usize;
    batch.rows = match query.limit {
        Some(limit) => batch.rows.into_iter().skip(offset).take(limit as usize).collect(),
        None => batch.rows.into_iter().skip(offset).collect(),
    };

    match materialize_target_of(&query.root) {
        MaterializeTarget::Rowwise => Ok(QueryResult::Rows(batch)),
        MaterializeTarget::Columnar => Ok(QueryResult::Columnar(materialize::to_columnar(batch))),
    }
}
