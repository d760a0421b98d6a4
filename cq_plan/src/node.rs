use std::sync::Arc;

use cq_predicate::Predicate;
use cq_schema::{FieldSpec, LogicalType, Schema};

/// An aggregate function applied to one column (or, for `Count`, to no
/// column at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum(usize),
    Min(usize),
    Max(usize),
}

impl AggFunc {
    pub fn source_column(self) -> Option<usize> {
        match self {
            Self::Count => None,
            Self::Sum(c) | Self::Min(c) | Self::Max(c) => Some(c),
        }
    }

    fn canonical_text(self) -> String {
        match self {
            Self::Count => "count()".to_string(),
            Self::Sum(c) => format!("sum(#{c})"),
            Self::Min(c) => format!("min(#{c})"),
            Self::Max(c) => format!("max(#{c})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggExpr {
    pub func: AggFunc,
    pub output_name: String,
}

impl AggExpr {
    pub fn canonical_text(&self) -> String {
        format!("{}:{}", self.output_name, self.func.canonical_text())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub column: usize,
    pub direction: SortDirection,
}

/// One output column of a `Project`: which input ordinal it reads from and
/// what it's named in the projected schema.
#[derive(Debug, Clone)]
pub struct ProjectionItem {
    pub source_ordinal: usize,
    pub output_name: String,
}

/// A logical query plan node. Each node carries its output schema and an
/// estimated row count, the latter propagated from the child and (for
/// `Filter`) scaled by the predicate set's estimated selectivity.
///
/// `Sort` and `Having`-as-a-second-`Filter` are additions beyond the
/// original node set: `Sort` fills the `ORDER BY` gap the node list didn't
/// name but the SQL grammar (`§6`) requires, and `HAVING` is just another
/// `Filter` placed after a `GroupBy`/`Aggregate` rather than a new variant,
/// since its semantics (narrow rows by predicates over already-computed
/// columns) are identical to `WHERE`'s.
#[derive(Debug, Clone)]
pub enum LogicalPlan {
    Scan {
        table_ref: String,
        schema: Arc<Schema>,
        estimated_rows: u64,
    },
    Filter {
        child: Box<LogicalPlan>,
        predicates: Vec<Predicate>,
        /// Set by the optimizer's Filter+Aggregate fusion rule.
        fuseable: bool,
        estimated_rows: u64,
    },
    Project {
        child: Box<LogicalPlan>,
        outputs: Vec<ProjectionItem>,
        estimated_rows: u64,
    },
    Aggregate {
        child: Box<LogicalPlan>,
        aggs: Vec<AggExpr>,
        estimated_rows: u64,
    },
    GroupBy {
        child: Box<LogicalPlan>,
        key_columns: Vec<usize>,
        key_property_name: String,
        aggs: Vec<AggExpr>,
        estimated_rows: u64,
    },
    Sort {
        child: Box<LogicalPlan>,
        keys: Vec<SortKey>,
        estimated_rows: u64,
    },
    Limit {
        child: Box<LogicalPlan>,
        n: u64,
        estimated_rows: u64,
    },
    Offset {
        child: Box<LogicalPlan>,
        n: u64,
        estimated_rows: u64,
    },
}

impl LogicalPlan {
    pub fn child(&self) -> Option<&LogicalPlan> {
        match self {
            LogicalPlan::Scan { .. } => None,
            LogicalPlan::Filter { child, .. }
            | LogicalPlan::Project { child, .. }
            | LogicalPlan::Aggregate { child, .. }
            | LogicalPlan::GroupBy { child, .. }
            | LogicalPlan::Sort { child, .. }
            | LogicalPlan::Limit { child, .. }
            | LogicalPlan::Offset { child, .. } => Some(child),
        }
    }

    pub fn estimated_rows(&self) -> u64 {
        match self {
            LogicalPlan::Scan { estimated_rows, .. }
            | LogicalPlan::Filter { estimated_rows, .. }
            | LogicalPlan::Project { estimated_rows, .. }
            | LogicalPlan::Aggregate { estimated_rows, .. }
            | LogicalPlan::GroupBy { estimated_rows, .. }
            | LogicalPlan::Sort { estimated_rows, .. }
            | LogicalPlan::Limit { estimated_rows, .. }
            | LogicalPlan::Offset { estimated_rows, .. } => *estimated_rows,
        }
    }

    /// The schema of rows flowing out of this node.
    pub fn output_schema(&self) -> Arc<Schema> {
        match self {
            LogicalPlan::Scan { schema, .. } => Arc::clone(schema),
            LogicalPlan::Filter { child, .. }
            | LogicalPlan::Sort { child, .. }
            | LogicalPlan::Limit { child, .. }
            | LogicalPlan::Offset { child, .. } => child.output_schema(),
            LogicalPlan::Project { child, outputs, .. } => {
                let input = child.output_schema();
                let specs: Vec<FieldSpec> = outputs
                    .iter()
                    .map(|item| {
                        let field = input.field(item.source_ordinal).expect("projection source ordinal resolved at bind time");
                        FieldSpec::new(item.output_name.clone(), field.logical_type(), field.nullable())
                    })
                    .collect();
                Arc::new(Schema::new(specs).expect("projection produces unique output names"))
            }
            LogicalPlan::Aggregate { child, aggs, .. } => {
                let input = child.output_schema();
                let specs: Vec<FieldSpec> = aggs.iter().map(|agg| agg_field_spec(agg, &input)).collect();
                Arc::new(Schema::new(specs).expect("aggregate output names are unique"))
            }
            LogicalPlan::GroupBy {
                child,
                key_columns,
                key_property_name,
                aggs,
                ..
            } => {
                let input = child.output_schema();
                let mut specs = Vec::with_capacity(key_columns.len() + aggs.len());
                if key_columns.len() == 1 {
                    let field = input.field(key_columns[0]).expect("group-by key ordinal resolved at bind time");
                    specs.push(FieldSpec::new(key_property_name.clone(), field.logical_type(), field.nullable()));
                } else {
                    // Composite keys project as an opaque UTF-8 label; the
                    // executor builds it from the byte-concatenated key.
                    specs.push(FieldSpec::new(key_property_name.clone(), LogicalType::Utf8, false));
                }
                for agg in aggs {
                    specs.push(agg_field_spec(agg, &input));
                }
                Arc::new(Schema::new(specs).expect("group-by output names are unique"))
            }
        }
    }

    /// Deterministic pre-order rendering: operator name, output schema
    /// shape, and operand literals, identical in meaning for two logical
    /// plans that would execute identically. Doubles as the plan cache key.
    pub fn canonical_text(&self) -> String {
        match self {
            LogicalPlan::Scan { table_ref, schema, .. } => format!("scan({table_ref}:{schema})"),
            LogicalPlan::Filter { child, predicates, fuseable, .. } => format!(
                "filter({}, [{}], fuseable={fuseable})",
                child.canonical_text(),
                predicates.iter().map(Predicate::canonical_text).collect::<Vec<_>>().join(",")
            ),
            LogicalPlan::Project { child, outputs, .. } => format!(
                "project({}, [{}])",
                child.canonical_text(),
                outputs
                    .iter()
                    .map(|o| format!("{}<-#{}", o.output_name, o.source_ordinal))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            LogicalPlan::Aggregate { child, aggs, .. } => format!(
                "aggregate({}, [{}])",
                child.canonical_text(),
                aggs.iter().map(AggExpr::canonical_text).collect::<Vec<_>>().join(",")
            ),
            LogicalPlan::GroupBy {
                child,
                key_columns,
                key_property_name,
                aggs,
                ..
            } => format!(
                "group_by({}, keys=[{}] as {key_property_name}, aggs=[{}])",
                child.canonical_text(),
                key_columns.iter().map(|c| format!("#{c}")).collect::<Vec<_>>().join(","),
                aggs.iter().map(AggExpr::canonical_text).collect::<Vec<_>>().join(",")
            ),
            LogicalPlan::Sort { child, keys, .. } => format!(
                "sort({}, [{}])",
                child.canonical_text(),
                keys.iter()
                    .map(|k| format!("#{}{}", k.column, if k.direction == SortDirection::Desc { " desc" } else { "" }))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            LogicalPlan::Limit { child, n, .. } => format!("limit({}, {n})", child.canonical_text()),
            LogicalPlan::Offset { child, n, .. } => format!("offset({}, {n})", child.canonical_text()),
        }
    }

    /// A stable, order-independent hash of `canonical_text()`, used as the
    /// plan cache's map key.
    pub fn fingerprint(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = ahash::AHasher::default();
        self.canonical_text().hash(&mut hasher);
        hasher.finish()
    }
}

fn agg_field_spec(agg: &AggExpr, input_schema: &Schema) -> FieldSpec {
    let logical_type = match agg.func {
        AggFunc::Count => LogicalType::Int64,
        AggFunc::Sum(c) | AggFunc::Min(c) | AggFunc::Max(c) => input_schema
            .field(c)
            .expect("agg source ordinal resolved at bind time")
            .logical_type(),
    };
    FieldSpec::new(agg.output_name.clone(), logical_type, false)
}

