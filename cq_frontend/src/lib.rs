//! Front-end adapters: a Rust expression tree (`expr`) and a SQL string
//! (`sql`), both lowered to a [`cq_plan::LogicalPlan`] against a bound
//! [`cq_schema::Schema`].

mod error;
mod expr;
mod sql;

pub use error::ExprError;
pub use expr::{AggKind, AggSpec, BinaryOp, Expr, QueryBuilder};
pub use sql::parse as parse_sql;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cq_plan::SortDirection;
    use cq_testutil::employees_schema;

    use super::*;

    #[test]
    fn expr_front_end_lowers_a_comparison_filter() {
        let schema = Arc::new(employees_schema());
        let plan = QueryBuilder::scan("employees", Arc::clone(&schema), 10)
            .filter(&Expr::col("age").not().not())
            .unwrap()
            .build();
        assert!(matches!(plan, cq_plan::LogicalPlan::Filter { .. }));
    }

    #[test]
    fn sql_front_end_lowers_where_order_by_and_limit() {
        let schema = Arc::new(employees_schema());
        let plan = parse_sql("SELECT id FROM employees WHERE age > 30 ORDER BY salary DESC LIMIT 2", "employees", &schema, 10).unwrap();
        assert!(matches!(plan, cq_plan::LogicalPlan::Limit { .. }));
    }

    #[test]
    fn sort_direction_default_is_ascending() {
        let schema = Arc::new(employees_schema());
        let plan = QueryBuilder::scan("employees", Arc::clone(&schema), 10)
            .sort(&[("age", SortDirection::Asc)])
            .unwrap()
            .build();
        assert!(matches!(plan, cq_plan::LogicalPlan::Sort { .. }));
    }
}
