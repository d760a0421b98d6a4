//! `Engine` is the single entry point a caller constructs: it owns the
//! schema, the chunk vector and zone maps ([`cq_store::Table`]), an
//! [`cq_store::EngineConfig`], and a [`cq_cache::PlanCache`]. `query()`
//! returns a Rust expression-tree builder; `sql()` parses a SQL string;
//! both funnel into the same optimize -> physical-plan -> execute
//! pipeline and the same terminal result shapes (`count`, `any`, `first`,
//! `to_scalar_sum`, `to_list`, `to_columnar`).

mod query;
mod simd;

use std::sync::Arc;

use cq_cache::{PlanCache, PlanCacheKey};
use cq_exec::QueryResult;
use cq_frontend::QueryBuilder;
use cq_physical::{CostSignals, OutputKind, SimdClass};
use cq_schema::{Scalar, Schema};
use cq_store::{ColumnarSource, EngineConfig, Table};

pub use cq_exec::ColumnarBatch;
pub use cq_frontend::{AggKind, AggSpec, BinaryOp, Expr};
pub use cq_plan::SortDirection;
pub use query::Query;

/// One materialized result row, in schema-declared column order.
pub type Row = Vec<Scalar>;

/// A `Sort` directly under a satisfied `Limit <= SORT_THRESHOLD` gets a
/// top-k heap instead of a full sort. There's no `EngineConfig` field for
/// this threshold, so it is a fixed internal constant -- see the Open
/// Question Resolutions in `DESIGN.md`.
const SORT_THRESHOLD: u64 = 10_000;

/// The single entry point: an in-memory table bound to a configuration and
/// a plan cache. Cheap to query repeatedly; expensive to construct (it
/// owns the frozen chunk vector), so callers build one `Engine` per table
/// and reuse it.
pub struct Engine {
    table: Table,
    config: EngineConfig,
    cache: PlanCache,
    simd_class: SimdClass,
}

impl Engine {
    pub fn new(table: Table, config: EngineConfig) -> Self {
        let cache = PlanCache::new(config.plan_cache_capacity);
        Self { table, config, cache, simd_class: simd::detect_simd_class() }
    }

    pub fn with_default_config(table: Table) -> Self {
        Self::new(table, EngineConfig::default())
    }

    pub fn schema(&self) -> &Schema {
        self.table.schema()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> cq_cache::CacheStats {
        self.cache.stats()
    }

    /// Starts a query via the Rust expression-tree front end, scanning the
    /// whole table.
    pub fn query(&self) -> Query<'_> {
        let schema = Arc::new(self.table.schema().clone());
        let estimated_rows = self.table.total_rows() as u64;
        let builder = QueryBuilder::scan("table", schema, estimated_rows);
        Query::new(self, builder)
    }

    /// Parses `sql` against this table's schema and returns a `Query` ready
    /// for a terminal call. The table reference in `FROM` must spell
    /// `"table"`, matching the name every `Engine::query()` scan uses.
    pub fn sql(&self, sql: &str) -> cq_error::Result<Query<'_>> {
        let schema = Arc::new(self.table.schema().clone());
        let estimated_rows = self.table.total_rows() as u64;
        let plan = cq_frontend::parse_sql(sql, "table", &schema, estimated_rows)?;
        Ok(Query::new(self, QueryBuilder::from_plan(plan)))
    }

    fn optimized_plan(&self, plan: cq_plan::LogicalPlan) -> cq_plan::LogicalPlan {
        let key = PlanCacheKey::new(self.table.schema(), &plan);
        if let Some(cached) = self.cache.get(key) {
            return cached;
        }
        let optimized = cq_plan::optimize(plan);
        self.cache.insert(key, optimized.clone());
        optimized
    }

    fn cost_signals(&self) -> CostSignals {
        CostSignals {
            total_rows: self.table.total_rows() as u64,
            chunk_count: self.table.chunk_count(),
            predicate_count: 0,
            simd_class: self.simd_class,
            worker_thread_count: self.config.resolved_degree_of_parallelism(),
            parallel_threshold: self.config.parallel_threshold as u64,
            parallel_group_by_threshold: self.config.parallel_group_by_threshold as u64,
            enable_simd: self.config.enable_simd,
        }
    }

    fn execute(&self, plan: cq_plan::LogicalPlan, output_kind: OutputKind) -> cq_error::Result<QueryResult> {
        let optimized = self.optimized_plan(plan);
        let signals = self.cost_signals();
        cq_log::debug!(plan = %optimized.canonical_text(), "executing query");
        let physical = cq_physical::translate(&optimized, &signals, SORT_THRESHOLD, output_kind);
        let cancellation = cq_exec::CancellationToken::new();
        cq_exec::run(&physical, &self.table, &self.config, &cancellation).map_err(cq_error::Error::from)
    }

    /// Runs `plan` (already terminated with a single-row `Aggregate`) and
    /// returns its one output row.
    fn single_row(&self, plan: cq_plan::LogicalPlan) -> cq_error::Result<Row> {
        match self.execute(plan, OutputKind::Rowwise)? {
            QueryResult::Rows(batch) => batch
                .rows
                .into_iter()
                .next()
                .ok_or_else(|| cq_error::Error::EmptySource("aggregate produced no row".to_string())),
            QueryResult::Columnar(_) => unreachable!("Rowwise was requested"),
        }
    }
}

#[cfg(test)]
mod tests {
    use cq_testutil::employees_table;

    use super::*;

    fn engine() -> Engine {
        Engine::with_default_config(employees_table())
    }

    #[test]
    fn count_with_no_filter_matches_total_rows() {
        let engine = engine();
        assert_eq!(engine.query().count().unwrap(), 10);
    }

    #[test]
    fn filter_then_count() {
        let engine = engine();
        let age_over_30 = Expr::Binary(BinaryOp::Gt, Box::new(Expr::col("age")), Box::new(Expr::lit(Scalar::Int32(30))));
        let count = engine.query().filter(&age_over_30).unwrap().count().unwrap();
        assert_eq!(count, 6);
    }

    #[test]
    fn any_short_circuits_on_a_satisfied_predicate() {
        let engine = engine();
        let age_over_50 = Expr::Binary(BinaryOp::Gt, Box::new(Expr::col("age")), Box::new(Expr::lit(Scalar::Int32(50))));
        assert!(engine.query().filter(&age_over_50).unwrap().any().unwrap());
    }

    #[test]
    fn sql_front_end_matches_the_expr_front_end() {
        let engine = engine();
        let rows = engine.sql("SELECT id FROM table WHERE active = true").unwrap().to_list().unwrap();
        assert_eq!(rows.len(), 7);
    }
}
