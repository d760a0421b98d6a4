use cq_exec::{CancellationToken, ColumnarBatch, QueryResult};
use cq_frontend::{AggSpec, Expr, QueryBuilder};
use cq_physical::OutputKind;
use cq_plan::{LogicalPlan, SortDirection};
use cq_predicate::Predicate;
use cq_schema::Scalar;

use crate::{Engine, Row};

/// A `scan().filter(..).group_by(..)...` chain bound to one [`Engine`],
/// built from either front end (`Engine::query`'s expr builder or
/// `Engine::sql`'s parsed plan). Every method either narrows the chain
/// further or is a terminal operation draining `self` into one of
/// `count`/`any`/`first`/`to_scalar_sum`/`to_list`/`to_columnar`.
pub struct Query<'engine> {
    engine: &'engine Engine,
    builder: QueryBuilder,
}

impl<'engine> Query<'engine> {
    pub(crate) fn new(engine: &'engine Engine, builder: QueryBuilder) -> Self {
        Self { engine, builder }
    }

    pub fn filter(mut self, expr: &Expr) -> cq_error::Result<Self> {
        self.builder = self.builder.filter(expr)?;
        Ok(self)
    }

    /// Alias for [`Self::filter`], conventionally used after `group_by`.
    pub fn having(mut self, expr: &Expr) -> cq_error::Result<Self> {
        self.builder = self.builder.having(expr)?;
        Ok(self)
    }

    pub fn project(mut self, columns: &[&str]) -> cq_error::Result<Self> {
        self.builder = self.builder.project(columns)?;
        Ok(self)
    }

    pub fn aggregate(mut self, aggs: Vec<AggSpec>) -> cq_error::Result<Self> {
        self.builder = self.builder.aggregate(aggs)?;
        Ok(self)
    }

    pub fn group_by(mut self, keys: &[&str], key_property_name: impl Into<String>, aggs: Vec<AggSpec>) -> cq_error::Result<Self> {
        self.builder = self.builder.group_by(keys, key_property_name, aggs)?;
        Ok(self)
    }

    pub fn sort(mut self, keys: &[(&str, SortDirection)]) -> cq_error::Result<Self> {
        self.builder = self.builder.sort(keys)?;
        Ok(self)
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.builder = self.builder.limit(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.builder = self.builder.offset(n);
        self
    }

    /// `count() -> u64`: narrows to a plain `COUNT(*)` over whatever
    /// `WHERE`/`GROUP BY` already accumulated.
    pub fn count(self) -> cq_error::Result<u64> {
        let plan = self.builder.aggregate(vec![AggSpec::count("count")])?.build();
        let row = self.engine.single_row(plan)?;
        match row.into_iter().next() {
            Some(Scalar::Int64(n)) => Ok(n.max(0) as u64),
            other => Err(cq_error::Error::CorruptChunk(format!("expected an Int64 count, got {other:?}"))),
        }
    }

    /// `any() -> bool`: true as soon as one row satisfies every predicate
    /// accumulated so far, without scanning the rest of the table.
    pub fn any(self) -> cq_error::Result<bool> {
        let plan = self.builder.build();
        let predicates = collect_predicates(&plan);
        let cancellation = CancellationToken::new();
        cq_exec::short_circuit::any(&self.engine.table, &predicates, &cancellation).map_err(cq_error::Error::from)
    }

    /// `first() -> Option<Row>`: the first row (chunk-major order)
    /// satisfying the accumulated predicates.
    pub fn first(self) -> cq_error::Result<Option<Row>> {
        let plan = self.builder.build();
        let predicates = collect_predicates(&plan);
        let cancellation = CancellationToken::new();
        cq_exec::short_circuit::first(&self.engine.table, &predicates, &cancellation).map_err(cq_error::Error::from)
    }

    /// `to_scalar_sum() -> Scalar`: narrows to `SUM(column)`.
    pub fn to_scalar_sum(self, column: &str) -> cq_error::Result<Scalar> {
        let plan = self.builder.aggregate(vec![AggSpec::sum(column, "sum")])?.build();
        let row = self.engine.single_row(plan)?;
        Ok(row.into_iter().next().unwrap_or(Scalar::Null))
    }

    /// `to_list() -> Vec<Row>`.
    pub fn to_list(self) -> cq_error::Result<Vec<Row>> {
        let plan = self.builder.build();
        match self.engine.execute(plan, OutputKind::Rowwise)? {
            QueryResult::Rows(batch) => Ok(batch.rows),
            QueryResult::Columnar(_) => unreachable!("Rowwise was requested"),
        }
    }

    /// `to_columnar() -> Vec<Column>` (returned alongside the output schema
    /// as a [`ColumnarBatch`], so callers can tell which column is which).
    pub fn to_columnar(self) -> cq_error::Result<ColumnarBatch> {
        let plan = self.builder.build();
        match self.engine.execute(plan, OutputKind::Columnar)? {
            QueryResult::Columnar(batch) => Ok(batch),
            QueryResult::Rows(_) => unreachable!("Columnar was requested"),
        }
    }
}

/// Walks straight down the plan's child chain, flattening every `Filter`
/// node's predicates into one list -- used by `any`/`first`, which read
/// the accumulated `WHERE`/`HAVING` set directly rather than going through
/// the physical planner (there is no `Any`/`First` physical operator).
fn collect_predicates(plan: &LogicalPlan) -> Vec<Predicate> {
    let mut out = Vec::new();
    let mut current = Some(plan);
    while let Some(node) = current {
        if let LogicalPlan::Filter { predicates, .. } = node {
            out.extend(predicates.iter().cloned());
        }
        current = node.child();
    }
    out
}
