//! A Rust-native expression tree plus the `QueryBuilder` that lowers it into
//! a [`LogicalPlan`] against a bound [`Schema`]. This is the idiomatic-Rust
//! replacement for a runtime-reflected "user expression tree": column names
//! are resolved to ordinals once, at `build()` time, against the
//! already-frozen schema -- no delegate construction, no per-row reflection.

use std::sync::Arc;

use cq_plan::{AggExpr, AggFunc, LogicalPlan, ProjectionItem, SortDirection, SortKey};
use cq_predicate::{ComparisonOp, InSetValues, Predicate, StringOp};
use cq_schema::{LogicalType, Scalar, Schema};

use crate::error::{ExprError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    fn as_comparison(self) -> Option<ComparisonOp> {
        match self {
            Self::Eq => Some(ComparisonOp::Eq),
            Self::Ne => Some(ComparisonOp::Ne),
            Self::Lt => Some(ComparisonOp::Lt),
            Self::Le => Some(ComparisonOp::Le),
            Self::Gt => Some(ComparisonOp::Gt),
            Self::Ge => Some(ComparisonOp::Ge),
            Self::And | Self::Or => None,
        }
    }
}

fn flip(op: ComparisonOp) -> ComparisonOp {
    match op {
        ComparisonOp::Lt => ComparisonOp::Gt,
        ComparisonOp::Le => ComparisonOp::Ge,
        ComparisonOp::Gt => ComparisonOp::Lt,
        ComparisonOp::Ge => ComparisonOp::Le,
        ComparisonOp::Eq => ComparisonOp::Eq,
        ComparisonOp::Ne => ComparisonOp::Ne,
    }
}

/// Which aggregate function a call in an `Expr` (or a `QueryBuilder`
/// aggregate/group-by step) invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    Count,
    Sum,
    Min,
    Max,
}

/// A user-facing expression tree. Lowered to a [`Predicate`] by
/// [`lower_predicate`] when used as a filter/having condition; `AggCall`
/// only ever appears as the top of an [`AggSpec`], never nested inside a
/// filter.
#[derive(Debug, Clone)]
pub enum Expr {
    Column(String),
    Literal(Scalar),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
    InList(Box<Expr>, Vec<Scalar>),
    StartsWith(Box<Expr>, String),
    Contains(Box<Expr>, String),
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn lit(value: Scalar) -> Self {
        Expr::Literal(value)
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::Binary(BinaryOp::And, Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::Binary(BinaryOp::Or, Box::new(self), Box::new(other))
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// Widens or narrows a generic literal `Scalar` to exactly the variant
/// `logical_type` expects, so the leaf kernels' "operand type matches
/// column type" invariant always holds regardless of how the literal
/// arrived (a hand-built `Scalar::Int32`, or a bare integer parsed out of
/// a SQL string with no column context of its own).
pub(crate) fn coerce_scalar(logical_type: LogicalType, scalar: Scalar) -> Result<Scalar> {
    use Scalar::*;
    let coerced = match (logical_type, &scalar) {
        (LogicalType::Int8, Int64(v)) => Int8(*v as i8),
        (LogicalType::Int16, Int64(v)) => Int16(*v as i16),
        (LogicalType::Int32, Int64(v)) => Int32(*v as i32),
        (LogicalType::Int64, Int64(_)) => scalar,
        (LogicalType::UInt8, Int64(v)) => UInt8(*v as u8),
        (LogicalType::UInt16, Int64(v)) => UInt16(*v as u16),
        (LogicalType::UInt32, Int64(v)) => UInt32(*v as u32),
        (LogicalType::UInt64, Int64(v)) => UInt64(*v as u64),
        (LogicalType::Date32, Int64(v)) => Date32(*v as i32),
        (LogicalType::Timestamp(_), Int64(v)) => Timestamp(*v),
        (LogicalType::Float32, Int64(v)) => Float32(ordered_float::OrderedFloat(*v as f32)),
        (LogicalType::Float64, Int64(v)) => Float64(ordered_float::OrderedFloat(*v as f64)),
        (LogicalType::Float32, Float64(v)) => Float32(ordered_float::OrderedFloat(v.0 as f32)),
        (LogicalType::Float64, Float64(_)) => scalar,
        (LogicalType::Decimal128(_, scale), Int64(v)) => Decimal128((*v as i128) * 10i128.pow(u32::from(*scale))),
        (LogicalType::Decimal128(_, scale), Float64(v)) => Decimal128((v.0 * 10f64.powi(i32::from(*scale))).round() as i128),
        _ => scalar,
    };
    if matches_logical_type(logical_type, &coerced) {
        Ok(coerced)
    } else {
        Err(ExprError::Unsupported(format!("literal {coerced} cannot be coerced to column type {logical_type}")))
    }
}

fn matches_logical_type(logical_type: LogicalType, scalar: &Scalar) -> bool {
    matches!(
        (logical_type, scalar),
        (LogicalType::Int8, Scalar::Int8(_))
            | (LogicalType::Int16, Scalar::Int16(_))
            | (LogicalType::Int32, Scalar::Int32(_))
            | (LogicalType::Int64, Scalar::Int64(_))
            | (LogicalType::UInt8, Scalar::UInt8(_))
            | (LogicalType::UInt16, Scalar::UInt16(_))
            | (LogicalType::UInt32, Scalar::UInt32(_))
            | (LogicalType::UInt64, Scalar::UInt64(_))
            | (LogicalType::Float32, Scalar::Float32(_))
            | (LogicalType::Float64, Scalar::Float64(_))
            | (LogicalType::Bool, Scalar::Bool(_))
            | (LogicalType::Utf8, Scalar::Utf8(_))
            | (LogicalType::Binary, Scalar::Binary(_))
            | (LogicalType::Date32, Scalar::Date32(_))
            | (LogicalType::Timestamp(_), Scalar::Timestamp(_))
            | (LogicalType::Decimal128(_, _), Scalar::Decimal128(_))
    )
}

fn resolve_column(schema: &Schema, name: &str) -> Result<usize> {
    schema.ordinal_of(name).ok_or_else(|| ExprError::UnknownColumn(name.to_string()))
}

/// Lowers a filter/having expression to a [`Predicate`] against `schema`.
pub fn lower_predicate(expr: &Expr, schema: &Schema) -> Result<Predicate> {
    match expr {
        Expr::Column(name) => {
            let column = resolve_column(schema, name)?;
            Ok(Predicate::Bool { column, want: true })
        }
        Expr::Literal(_) => Err(ExprError::Unsupported("a bare literal is not a predicate".to_string())),
        Expr::Binary(BinaryOp::And, lhs, rhs) => Ok(Predicate::And(vec![lower_predicate(lhs, schema)?, lower_predicate(rhs, schema)?])),
        Expr::Binary(BinaryOp::Or, lhs, rhs) => Ok(Predicate::Or(vec![lower_predicate(lhs, schema)?, lower_predicate(rhs, schema)?])),
        Expr::Binary(op, lhs, rhs) => lower_comparison(*op, lhs, rhs, schema),
        Expr::Not(inner) => match inner.as_ref() {
            Expr::Column(name) => {
                let column = resolve_column(schema, name)?;
                Ok(Predicate::Bool { column, want: false })
            }
            other => Ok(Predicate::Not(Box::new(lower_predicate(other, schema)?))),
        },
        Expr::IsNull(inner) => Ok(Predicate::IsNull { column: column_of(inner, schema)? }),
        Expr::IsNotNull(inner) => Ok(Predicate::IsNotNull { column: column_of(inner, schema)? }),
        Expr::InList(inner, values) => {
            let column = column_of(inner, schema)?;
            let logical_type = schema.field(column).expect("column_of resolved this ordinal against schema").logical_type();
            let coerced = values.iter().map(|v| coerce_scalar(logical_type, v.clone())).collect::<Result<Vec<_>>>()?;
            Ok(Predicate::InSet { column, values: InSetValues::new(&coerced) })
        }
        Expr::StartsWith(inner, prefix) => Ok(Predicate::StringOp {
            column: column_of(inner, schema)?,
            op: StringOp::StartsWith,
            pattern: prefix.clone(),
        }),
        Expr::Contains(inner, needle) => Ok(Predicate::StringOp {
            column: column_of(inner, schema)?,
            op: StringOp::Contains,
            pattern: needle.clone(),
        }),
    }
}

fn column_of(expr: &Expr, schema: &Schema) -> Result<usize> {
    match expr {
        Expr::Column(name) => resolve_column(schema, name),
        other => Err(ExprError::Unsupported(format!("expected a bare column reference, found {other:?}"))),
    }
}

fn lower_comparison(op: BinaryOp, lhs: &Expr, rhs: &Expr, schema: &Schema) -> Result<Predicate> {
    let comparison = op.as_comparison().expect("And/Or handled by the caller before reaching lower_comparison");
    let (column, operand, comparison) = match (lhs, rhs) {
        (Expr::Column(name), Expr::Literal(value)) => (resolve_column(schema, name)?, value.clone(), comparison),
        (Expr::Literal(value), Expr::Column(name)) => (resolve_column(schema, name)?, value.clone(), flip(comparison)),
        _ => return Err(ExprError::Unsupported(format!("comparison must be column {op:?} literal, found {lhs:?} {op:?} {rhs:?}"))),
    };
    let logical_type = schema.field(column).expect("resolve_column already validated this ordinal").logical_type();
    let operand = coerce_scalar(logical_type, operand)?;
    Ok(Predicate::Compare { column, op: comparison, operand })
}

/// One aggregate output column: which function, which source column (`None`
/// for `Count`), and what the result is named.
#[derive(Debug, Clone)]
pub struct AggSpec {
    func: AggKind,
    column: Option<String>,
    output_name: String,
}

impl AggSpec {
    pub fn count(output_name: impl Into<String>) -> Self {
        Self { func: AggKind::Count, column: None, output_name: output_name.into() }
    }

    pub fn sum(column: impl Into<String>, output_name: impl Into<String>) -> Self {
        Self { func: AggKind::Sum, column: Some(column.into()), output_name: output_name.into() }
    }

    pub fn min(column: impl Into<String>, output_name: impl Into<String>) -> Self {
        Self { func: AggKind::Min, column: Some(column.into()), output_name: output_name.into() }
    }

    pub fn max(column: impl Into<String>, output_name: impl Into<String>) -> Self {
        Self { func: AggKind::Max, column: Some(column.into()), output_name: output_name.into() }
    }

    fn resolve(self, schema: &Schema) -> Result<AggExpr> {
        let func = match self.func {
            AggKind::Count => AggFunc::Count,
            AggKind::Sum => AggFunc::Sum(resolve_column(schema, self.column.as_deref().unwrap_or_default())?),
            AggKind::Min => AggFunc::Min(resolve_column(schema, self.column.as_deref().unwrap_or_default())?),
            AggKind::Max => AggFunc::Max(resolve_column(schema, self.column.as_deref().unwrap_or_default())?),
        };
        Ok(AggExpr { func, output_name: self.output_name })
    }
}

fn selectivity_of(predicate: &Predicate) -> f64 {
    // No zone maps at build time: the optimizer's own selectivity pass
    // refines this later, against the actual chunks, when it reorders
    // `And` children. This estimate only needs to seed `estimated_rows`
    // for the plan-cache/physical-planner cost signals.
    predicate.estimate_selectivity(&[])
}

/// Assembles a `scan().filter(..).group_by(..)...` chain into a
/// [`LogicalPlan`], resolving every column reference against the bound
/// schema as each step is appended.
pub struct QueryBuilder {
    plan: LogicalPlan,
}

impl QueryBuilder {
    pub fn scan(table_ref: impl Into<String>, schema: Arc<Schema>, estimated_rows: u64) -> Self {
        Self {
            plan: LogicalPlan::Scan { table_ref: table_ref.into(), schema, estimated_rows },
        }
    }

    /// Resumes a chain from an already-built plan, e.g. one produced by
    /// [`crate::sql::parse`], so both front ends share one terminal-operation
    /// surface.
    pub fn from_plan(plan: LogicalPlan) -> Self {
        Self { plan }
    }

    pub fn filter(mut self, expr: &Expr) -> Result<Self> {
        let schema = self.plan.output_schema();
        let predicate = lower_predicate(expr, &schema)?;
        let estimated_rows = (self.plan.estimated_rows() as f64 * selectivity_of(&predicate)).round() as u64;
        self.plan = LogicalPlan::Filter {
            child: Box::new(self.plan),
            predicates: vec![predicate],
            fuseable: false,
            estimated_rows,
        };
        Ok(self)
    }

    /// Alias for [`Self::filter`] used after a `group_by`/`aggregate` step,
    /// where the narrowing condition reads post-aggregation output columns.
    pub fn having(self, expr: &Expr) -> Result<Self> {
        self.filter(expr)
    }

    pub fn project(mut self, columns: &[&str]) -> Result<Self> {
        let schema = self.plan.output_schema();
        let outputs = columns
            .iter()
            .map(|name| {
                let source_ordinal = resolve_column(&schema, name)?;
                Ok(ProjectionItem { source_ordinal, output_name: (*name).to_string() })
            })
            .collect::<Result<Vec<_>>>()?;
        let estimated_rows = self.plan.estimated_rows();
        self.plan = LogicalPlan::Project { child: Box::new(self.plan), outputs, estimated_rows };
        Ok(self)
    }

    pub fn aggregate(mut self, aggs: Vec<AggSpec>) -> Result<Self> {
        let schema = self.plan.output_schema();
        let aggs = aggs.into_iter().map(|a| a.resolve(&schema)).collect::<Result<Vec<_>>>()?;
        self.plan = LogicalPlan::Aggregate { child: Box::new(self.plan), aggs, estimated_rows: 1 };
        Ok(self)
    }

    pub fn group_by(mut self, keys: &[&str], key_property_name: impl Into<String>, aggs: Vec<AggSpec>) -> Result<Self> {
        let schema = self.plan.output_schema();
        let key_columns = keys.iter().map(|k| resolve_column(&schema, k)).collect::<Result<Vec<_>>>()?;
        let aggs = aggs.into_iter().map(|a| a.resolve(&schema)).collect::<Result<Vec<_>>>()?;
        // Upper-bounded by the input row count; the real group count is only
        // known once the executor has scanned every chunk.
        let estimated_rows = self.plan.estimated_rows().max(1);
        self.plan = LogicalPlan::GroupBy {
            child: Box::new(self.plan),
            key_columns,
            key_property_name: key_property_name.into(),
            aggs,
            estimated_rows,
        };
        Ok(self)
    }

    pub fn sort(mut self, keys: &[(&str, SortDirection)]) -> Result<Self> {
        let schema = self.plan.output_schema();
        let keys = keys
            .iter()
            .map(|(name, direction)| Ok(SortKey { column: resolve_column(&schema, name)?, direction: *direction }))
            .collect::<Result<Vec<_>>>()?;
        let estimated_rows = self.plan.estimated_rows();
        self.plan = LogicalPlan::Sort { child: Box::new(self.plan), keys, estimated_rows };
        Ok(self)
    }

    pub fn limit(mut self, n: u64) -> Self {
        let estimated_rows = self.plan.estimated_rows().min(n);
        self.plan = LogicalPlan::Limit { child: Box::new(self.plan), n, estimated_rows };
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        let estimated_rows = self.plan.estimated_rows().saturating_sub(n);
        self.plan = LogicalPlan::Offset { child: Box::new(self.plan), n, estimated_rows };
        self
    }

    pub fn build(self) -> LogicalPlan {
        self.plan
    }
}
