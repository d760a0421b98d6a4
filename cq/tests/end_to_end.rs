//! Reproduces the literal ten-row employees scenario end to end, through
//! both front ends, exercising `WHERE`, `GROUP BY`, `ORDER BY`/`LIMIT`, and
//! the short-circuiting terminal operations against one frozen `Table`.

use std::collections::HashMap;

use cq::{BinaryOp, Engine, Expr, SortDirection};
use cq_schema::Scalar;
use cq_testutil::{decimal_cents, employees_table};

fn engine() -> Engine {
    Engine::with_default_config(employees_table())
}

fn gt(column: &str, value: i32) -> Expr {
    Expr::Binary(BinaryOp::Gt, Box::new(Expr::col(column)), Box::new(Expr::lit(Scalar::Int32(value))))
}

fn eq_str(column: &str, value: &str) -> Expr {
    Expr::Binary(BinaryOp::Eq, Box::new(Expr::col(column)), Box::new(Expr::lit(Scalar::Utf8(value.to_string()))))
}

fn lt(column: &str, value: i32) -> Expr {
    Expr::Binary(BinaryOp::Lt, Box::new(Expr::col(column)), Box::new(Expr::lit(Scalar::Int32(value))))
}

#[test]
fn where_age_over_30_counts_six() {
    let engine = engine();
    assert_eq!(engine.query().filter(&gt("age", 30)).unwrap().count().unwrap(), 6);
}

#[test]
fn where_age_over_30_returns_the_expected_ids() {
    let engine = engine();
    let rows = engine.query().filter(&gt("age", 30)).unwrap().project(&["id"]).unwrap().to_list().unwrap();
    let mut ids: Vec<i32> = rows.into_iter().map(|r| match r[0] {
        Scalar::Int32(id) => id,
        other => panic!("expected Int32 id, got {other:?}"),
    }).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![2, 3, 5, 6, 8, 10]);
}

#[test]
fn where_active_and_category_eng_counts_four() {
    let engine = engine();
    let condition = Expr::col("active").and(eq_str("category", "Eng"));
    let rows = engine.query().filter(&condition).unwrap().project(&["id"]).unwrap().to_list().unwrap();
    let mut ids: Vec<i32> = rows.into_iter().map(|r| match r[0] {
        Scalar::Int32(id) => id,
        other => panic!("expected Int32 id, got {other:?}"),
    }).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 4, 9]);
}

#[test]
fn where_active_sums_salary_to_470000() {
    let engine = engine();
    let sum = engine.query().filter(&Expr::col("active")).unwrap().to_scalar_sum("salary").unwrap();
    assert_eq!(sum, Scalar::Decimal128(decimal_cents(470_000.00)));
}

#[test]
fn group_by_category_counts_every_row() {
    let engine = engine();
    let rows = engine
        .query()
        .group_by(&["category"], "category", vec![cq::AggSpec::count("n")])
        .unwrap()
        .to_list()
        .unwrap();
    let counts: HashMap<String, i64> = rows
        .into_iter()
        .map(|r| {
            let category = match &r[0] {
                Scalar::Utf8(s) => s.clone(),
                other => panic!("expected Utf8 category, got {other:?}"),
            };
            let count = match r[1] {
                Scalar::Int64(n) => n,
                other => panic!("expected Int64 count, got {other:?}"),
            };
            (category, count)
        })
        .collect();
    assert_eq!(counts.get("Eng"), Some(&5));
    assert_eq!(counts.get("Mgmt"), Some(&2));
    assert_eq!(counts.get("Mkt"), Some(&2));
    assert_eq!(counts.get("Exec"), Some(&1));
}

#[test]
fn where_active_group_by_category_drops_mgmt_entirely() {
    let engine = engine();
    let rows = engine
        .query()
        .filter(&Expr::col("active"))
        .unwrap()
        .group_by(&["category"], "category", vec![cq::AggSpec::count("n")])
        .unwrap()
        .to_list()
        .unwrap();
    let counts: HashMap<String, i64> = rows
        .into_iter()
        .map(|r| {
            let category = match &r[0] {
                Scalar::Utf8(s) => s.clone(),
                other => panic!("expected Utf8 category, got {other:?}"),
            };
            let count = match r[1] {
                Scalar::Int64(n) => n,
                other => panic!("expected Int64 count, got {other:?}"),
            };
            (category, count)
        })
        .collect();
    assert_eq!(counts.get("Eng"), Some(&4));
    assert_eq!(counts.get("Mkt"), Some(&2));
    assert_eq!(counts.get("Exec"), Some(&1));
    assert_eq!(counts.get("Mgmt"), None);
}

#[test]
fn where_age_over_30_order_by_salary_desc_limit_two() {
    let engine = engine();
    let rows = engine
        .query()
        .filter(&gt("age", 30))
        .unwrap()
        .sort(&[("salary", SortDirection::Desc)])
        .unwrap()
        .limit(2)
        .project(&["id"])
        .unwrap()
        .to_list()
        .unwrap();
    let ids: Vec<i32> = rows
        .into_iter()
        .map(|r| match r[0] {
            Scalar::Int32(id) => id,
            other => panic!("expected Int32 id, got {other:?}"),
        })
        .collect();
    assert_eq!(ids, vec![8, 3]);
}

#[test]
fn where_age_over_30_and_age_under_10_is_empty() {
    let engine = engine();
    let condition = gt("age", 30).and(lt("age", 10));
    assert_eq!(engine.query().filter(&condition).unwrap().count().unwrap(), 0);
    let rows = engine.query().filter(&condition).unwrap().to_list().unwrap();
    assert!(rows.is_empty());
}

#[test]
fn limit_zero_returns_an_empty_result() {
    let engine = engine();
    let rows = engine.query().filter(&gt("age", 30)).unwrap().limit(0).project(&["id"]).unwrap().to_list().unwrap();
    assert!(rows.is_empty());
}

#[test]
fn any_age_over_50_is_true() {
    let engine = engine();
    assert!(engine.query().filter(&gt("age", 50)).unwrap().any().unwrap());
}

#[test]
fn any_age_over_100_is_false() {
    let engine = engine();
    assert!(!engine.query().filter(&gt("age", 100)).unwrap().any().unwrap());
}

#[test]
fn where_category_eng_min_salary_is_45000() {
    let engine = engine();
    let condition = eq_str("category", "Eng");
    let rows = engine
        .query()
        .filter(&condition)
        .unwrap()
        .aggregate(vec![cq::AggSpec::min("salary", "min_salary")])
        .unwrap()
        .to_list()
        .unwrap();
    assert_eq!(rows[0][0], Scalar::Decimal128(decimal_cents(45_000.00)));
}

#[test]
fn where_category_eng_max_salary_is_75000() {
    let engine = engine();
    let condition = eq_str("category", "Eng");
    let rows = engine
        .query()
        .filter(&condition)
        .unwrap()
        .aggregate(vec![cq::AggSpec::max("salary", "max_salary")])
        .unwrap()
        .to_list()
        .unwrap();
    assert_eq!(rows[0][0], Scalar::Decimal128(decimal_cents(75_000.00)));
}

#[test]
fn first_returns_the_first_matching_row_without_scanning_the_rest() {
    let engine = engine();
    let row = engine.query().filter(&gt("age", 30)).unwrap().first().unwrap().expect("at least one row matches");
    match &row[0] {
        Scalar::Int32(id) => assert!(*id > 0),
        other => panic!("expected Int32 id, got {other:?}"),
    }
}

#[test]
fn sql_front_end_agrees_with_the_expr_front_end_on_where_and_count() {
    let engine = engine();
    let count = engine.sql("SELECT id FROM table WHERE age > 30").unwrap().count().unwrap();
    assert_eq!(count, 6);
}

#[test]
fn sql_front_end_agrees_on_group_by() {
    let engine = engine();
    let rows = engine.sql("SELECT category, COUNT(*) AS n FROM table GROUP BY category").unwrap().to_list().unwrap();
    assert_eq!(rows.len(), 4);
}
