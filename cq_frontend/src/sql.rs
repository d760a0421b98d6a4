//! A `sqlparser`-based adapter implementing exactly the grammar
//! `SELECT <projection> FROM <table> [WHERE] [GROUP BY] [HAVING]
//! [ORDER BY] [LIMIT] [OFFSET]`, producing the same logical plan shape as
//! [`crate::expr`]'s `QueryBuilder`. Grounded on the same crate the pack's
//! own `predicate` crate reaches for to parse SQL text.

use std::sync::Arc;

use cq_plan::{LogicalPlan, SortDirection};
use cq_schema::{Schema, Scalar};
use sqlparser::ast::{
    BinaryOperator, Expr as SqlExpr, Function, FunctionArg, FunctionArgExpr, GroupByExpr, OrderByExpr, Select, SelectItem, SetExpr,
    Statement, TableFactor, UnaryOperator, Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::expr::{AggSpec, BinaryOp, Expr, QueryBuilder};

fn parse_error(message: impl Into<String>) -> cq_error::Error {
    cq_error::Error::SqlParseError { message: message.into(), position: 0 }
}

fn unsupported(message: impl Into<String>) -> cq_error::Error {
    cq_error::Error::UnsupportedExpression(message.into())
}

/// Parses `sql`, resolving every column reference against `schema`, and
/// produces the `LogicalPlan` for a single `SELECT` statement scanning
/// `table_ref`.
pub fn parse(sql: &str, table_ref: &str, schema: &Arc<Schema>, estimated_rows: u64) -> cq_error::Result<LogicalPlan> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql).map_err(|e| parse_error(e.to_string()))?;
    let statement = match statements.as_slice() {
        [one] => one,
        [] => return Err(parse_error("empty query")),
        _ => return Err(parse_error("expected exactly one SQL statement")),
    };
    let query = match statement {
        Statement::Query(query) => query.as_ref(),
        other => return Err(parse_error(format!("expected a SELECT statement, found {other}"))),
    };
    let select = match query.body.as_ref() {
        SetExpr::Select(select) => select.as_ref(),
        other => return Err(parse_error(format!("unsupported query body: {other}"))),
    };

    check_from(select, table_ref)?;

    let mut builder = QueryBuilder::scan(table_ref.to_string(), Arc::clone(schema), estimated_rows);

    if let Some(selection) = &select.selection {
        let expr = ast_to_expr(selection)?;
        builder = builder.filter(&expr).map_err(cq_error::Error::from)?;
    }

    let group_by_columns = group_by_columns(&select.group_by)?;
    let (plain_columns, agg_specs) = split_projection(&select.projection)?;

    if !group_by_columns.is_empty() {
        let key_property_name = group_by_columns.join(",");
        let key_refs: Vec<&str> = group_by_columns.iter().map(String::as_str).collect();
        builder = builder.group_by(&key_refs, key_property_name, agg_specs).map_err(cq_error::Error::from)?;
        if let Some(having) = &select.having {
            let expr = ast_to_expr(having)?;
            builder = builder.having(&expr).map_err(cq_error::Error::from)?;
        }
    } else if !agg_specs.is_empty() {
        builder = builder.aggregate(agg_specs).map_err(cq_error::Error::from)?;
    } else if !plain_columns.is_empty() {
        let refs: Vec<&str> = plain_columns.iter().map(String::as_str).collect();
        builder = builder.project(&refs).map_err(cq_error::Error::from)?;
    }
    // A bare `SELECT *` (no explicit columns, no aggregate, no group by)
    // needs no Project node: the physical planner inserts an identity
    // materialize step over whatever the scan/filter chain already produced.

    if !query.order_by.is_empty() {
        let keys = query.order_by.iter().map(order_by_key).collect::<cq_error::Result<Vec<_>>>()?;
        let key_refs: Vec<(&str, SortDirection)> = keys.iter().map(|(name, dir)| (name.as_str(), *dir)).collect();
        builder = builder.sort(&key_refs).map_err(cq_error::Error::from)?;
    }

    if let Some(limit) = &query.limit {
        builder = builder.limit(literal_u64(limit)?);
    }
    if let Some(offset) = &query.offset {
        builder = builder.offset(literal_u64(&offset.value)?);
    }

    Ok(builder.build())
}

fn check_from(select: &Select, table_ref: &str) -> cq_error::Result<()> {
    let Some(twj) = select.from.first() else {
        return Err(parse_error("missing FROM clause"));
    };
    let TableFactor::Table { name, .. } = &twj.relation else {
        return Err(unsupported(format!("unsupported FROM target: {:?}", twj.relation)));
    };
    let ident = name.0.last().map(|i| i.value.as_str()).unwrap_or_default();
    if !ident.eq_ignore_ascii_case(table_ref) {
        return Err(parse_error(format!("FROM {ident} does not match the bound table {table_ref:?}")));
    }
    Ok(())
}

fn group_by_columns(group_by: &GroupByExpr) -> cq_error::Result<Vec<String>> {
    match group_by {
        GroupByExpr::Expressions(exprs) => exprs.iter().map(column_name).collect(),
        GroupByExpr::All => Err(unsupported("GROUP BY ALL is not supported")),
    }
}

fn column_name(expr: &SqlExpr) -> cq_error::Result<String> {
    match expr {
        SqlExpr::Identifier(ident) => Ok(ident.value.clone()),
        SqlExpr::CompoundIdentifier(parts) => Ok(parts.last().map(|i| i.value.clone()).unwrap_or_default()),
        other => Err(unsupported(format!("expected a column reference, found {other}"))),
    }
}

fn split_projection(items: &[SelectItem]) -> cq_error::Result<(Vec<String>, Vec<AggSpec>)> {
    let mut plain_columns = Vec::new();
    let mut agg_specs = Vec::new();
    for item in items {
        match item {
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..) => {}
            SelectItem::UnnamedExpr(SqlExpr::Function(f)) => agg_specs.push(function_to_agg(f, default_agg_name(f))?),
            SelectItem::ExprWithAlias { expr: SqlExpr::Function(f), alias } => agg_specs.push(function_to_agg(f, alias.value.clone())?),
            SelectItem::UnnamedExpr(expr) => plain_columns.push(column_name(expr)?),
            SelectItem::ExprWithAlias { expr, .. } => plain_columns.push(column_name(expr)?),
        }
    }
    Ok((plain_columns, agg_specs))
}

fn default_agg_name(f: &Function) -> String {
    f.name.0.last().map(|i| i.value.to_ascii_lowercase()).unwrap_or_else(|| "agg".to_string())
}

fn function_to_agg(f: &Function, output_name: String) -> cq_error::Result<AggSpec> {
    let name = f.name.0.last().map(|i| i.value.to_ascii_uppercase()).unwrap_or_default();
    let column = function_arg_column(f)?;
    match name.as_str() {
        "COUNT" => Ok(AggSpec::count(output_name)),
        "SUM" => Ok(AggSpec::sum(column.ok_or_else(|| missing_arg("SUM"))?, output_name)),
        "MIN" => Ok(AggSpec::min(column.ok_or_else(|| missing_arg("MIN"))?, output_name)),
        "MAX" => Ok(AggSpec::max(column.ok_or_else(|| missing_arg("MAX"))?, output_name)),
        other => Err(unsupported(format!("unsupported aggregate function {other}"))),
    }
}

fn missing_arg(name: &str) -> cq_error::Error {
    unsupported(format!("{name} requires a column argument"))
}

fn function_arg_column(f: &Function) -> cq_error::Result<Option<String>> {
    match f.args.first() {
        None => Ok(None),
        Some(FunctionArg::Unnamed(FunctionArgExpr::Wildcard)) => Ok(None),
        Some(FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))) => Ok(Some(column_name(expr)?)),
        Some(other) => Err(unsupported(format!("unsupported function argument: {other:?}"))),
    }
}

fn order_by_key(o: &OrderByExpr) -> cq_error::Result<(String, SortDirection)> {
    let name = column_name(&o.expr)?;
    let direction = if o.asc == Some(false) { SortDirection::Desc } else { SortDirection::Asc };
    Ok((name, direction))
}

fn literal_u64(expr: &SqlExpr) -> cq_error::Result<u64> {
    match expr {
        SqlExpr::Value(Value::Number(n, _)) => {
            n.parse::<u64>().map_err(|_| parse_error(format!("expected a non-negative integer literal, found {n}")))
        }
        other => Err(unsupported(format!("expected an integer literal, found {other}"))),
    }
}

fn ast_to_expr(expr: &SqlExpr) -> cq_error::Result<Expr> {
    match expr {
        SqlExpr::Identifier(ident) => Ok(Expr::Column(ident.value.clone())),
        SqlExpr::CompoundIdentifier(parts) => Ok(Expr::Column(parts.last().map(|i| i.value.clone()).unwrap_or_default())),
        SqlExpr::Value(value) => Ok(Expr::Literal(value_to_scalar(value)?)),
        SqlExpr::Nested(inner) => ast_to_expr(inner),
        SqlExpr::UnaryOp { op: UnaryOperator::Not, expr: inner } => Ok(Expr::Not(Box::new(ast_to_expr(inner)?))),
        SqlExpr::IsNull(inner) => Ok(Expr::IsNull(Box::new(ast_to_expr(inner)?))),
        SqlExpr::IsNotNull(inner) => Ok(Expr::IsNotNull(Box::new(ast_to_expr(inner)?))),
        SqlExpr::InList { expr: inner, list, negated } => {
            let values = list
                .iter()
                .map(|e| match e {
                    SqlExpr::Value(v) => value_to_scalar(v),
                    other => Err(unsupported(format!("IN list entries must be literals, found {other}"))),
                })
                .collect::<cq_error::Result<Vec<_>>>()?;
            let in_list = Expr::InList(Box::new(ast_to_expr(inner)?), values);
            Ok(if *negated { Expr::Not(Box::new(in_list)) } else { in_list })
        }
        SqlExpr::Like { negated, expr: inner, pattern, escape_char: _ } => {
            let SqlExpr::Value(Value::SingleQuotedString(pattern)) = pattern.as_ref() else {
                return Err(unsupported("LIKE pattern must be a single-quoted string literal"));
            };
            let column_expr = ast_to_expr(inner)?;
            let like_expr = like_pattern_to_expr(column_expr, pattern);
            Ok(if *negated { Expr::Not(Box::new(like_expr)) } else { like_expr })
        }
        SqlExpr::BinaryOp { left, op, right } => {
            let binary_op = binary_operator(op)?;
            Ok(Expr::Binary(binary_op, Box::new(ast_to_expr(left)?), Box::new(ast_to_expr(right)?)))
        }
        other => Err(unsupported(format!("unsupported expression: {other}"))),
    }
}

/// `LIKE 'foo%'` / `'%foo%'` / `'%foo'` / `'foo'` map onto the engine's
/// three string predicates; an exact (no-wildcard) pattern lowers to a
/// case-sensitive equality comparison.
fn like_pattern_to_expr(column_expr: Expr, pattern: &str) -> Expr {
    if let Some(stripped) = pattern.strip_prefix('%').and_then(|p| p.strip_suffix('%')) {
        Expr::Contains(Box::new(column_expr), stripped.to_string())
    } else if let Some(stripped) = pattern.strip_suffix('%') {
        Expr::StartsWith(Box::new(column_expr), stripped.to_string())
    } else {
        Expr::Binary(BinaryOp::Eq, Box::new(column_expr), Box::new(Expr::Literal(Scalar::Utf8(pattern.to_string()))))
    }
}

fn value_to_scalar(value: &Value) -> cq_error::Result<Scalar> {
    match value {
        Value::Number(n, _) => match n.parse::<i64>() {
            Ok(i) => Ok(Scalar::Int64(i)),
            Err(_) => n
                .parse::<f64>()
                .map(|f| Scalar::Float64(ordered_float::OrderedFloat(f)))
                .map_err(|_| parse_error(format!("invalid numeric literal {n}"))),
        },
        Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => Ok(Scalar::Utf8(s.clone())),
        Value::Boolean(b) => Ok(Scalar::Bool(*b)),
        Value::Null => Ok(Scalar::Null),
        other => Err(unsupported(format!("unsupported literal: {other:?}"))),
    }
}

fn binary_operator(op: &BinaryOperator) -> cq_error::Result<BinaryOp> {
    match op {
        BinaryOperator::And => Ok(BinaryOp::And),
        BinaryOperator::Or => Ok(BinaryOp::Or),
        BinaryOperator::Eq => Ok(BinaryOp::Eq),
        BinaryOperator::NotEq => Ok(BinaryOp::Ne),
        BinaryOperator::Lt => Ok(BinaryOp::Lt),
        BinaryOperator::LtEq => Ok(BinaryOp::Le),
        BinaryOperator::Gt => Ok(BinaryOp::Gt),
        BinaryOperator::GtEq => Ok(BinaryOp::Ge),
        other => Err(unsupported(format!("unsupported operator: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use cq_schema::{FieldSpec, LogicalType};

    use super::*;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new([
                FieldSpec::new("id", LogicalType::Int32, false),
                FieldSpec::new("age", LogicalType::Int32, false),
                FieldSpec::new("salary", LogicalType::Float64, false),
                FieldSpec::new("active", LogicalType::Bool, false),
                FieldSpec::new("category", LogicalType::Utf8, false),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn simple_where_lowers_to_a_filter() {
        let plan = parse("SELECT id FROM employees WHERE age > 30", "employees", &schema(), 10).unwrap();
        match plan {
            LogicalPlan::Project { child, .. } => assert!(matches!(*child, LogicalPlan::Filter { .. })),
            other => panic!("expected a Project over a Filter, got {other:?}"),
        }
    }

    #[test]
    fn count_star_becomes_a_bare_aggregate() {
        let plan = parse("SELECT COUNT(*) AS n FROM employees", "employees", &schema(), 10).unwrap();
        match plan {
            LogicalPlan::Aggregate { aggs, .. } => {
                assert_eq!(aggs.len(), 1);
                assert_eq!(aggs[0].output_name, "n");
            }
            other => panic!("expected Aggregate, got {other:?}"),
        }
    }

    #[test]
    fn group_by_with_count_produces_group_by_node() {
        let plan = parse("SELECT category, COUNT(*) AS n FROM employees GROUP BY category", "employees", &schema(), 10).unwrap();
        assert!(matches!(plan, LogicalPlan::GroupBy { .. }));
    }

    #[test]
    fn order_by_and_limit_wrap_the_plan() {
        let plan = parse(
            "SELECT id FROM employees WHERE age > 30 ORDER BY salary DESC LIMIT 2",
            "employees",
            &schema(),
            10,
        )
        .unwrap();
        assert!(matches!(plan, LogicalPlan::Limit { .. }));
    }

    #[test]
    fn mismatched_table_name_is_rejected() {
        let err = parse("SELECT id FROM other_table", "employees", &schema(), 10).unwrap_err();
        assert!(matches!(err, cq_error::Error::SqlParseError { .. }));
    }

    #[test]
    fn unparseable_sql_is_rejected() {
        let err = parse("not even sql", "employees", &schema(), 10).unwrap_err();
        assert!(matches!(err, cq_error::Error::SqlParseError { .. }));
    }
}
