//! Schema and table generators shared by integration tests across the `cq`
//! workspace, mirroring the ingest-time data generators
//! (`re_types::datagen`) the pack builds for its own cross-crate tests:
//! random tables with a controllable row/chunk shape, plus the literal
//! fixture used for the end-to-end scenario.

use std::sync::Arc;

use cq_schema::{FieldSpec, LogicalType, Schema};
use cq_store::builder::{bool_column, decimal128_column, int32_column, utf8_column};
use cq_store::{Column, Table};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The schema from the literal end-to-end scenario: `[id, name, age,
/// salary, active, category]`.
pub fn employees_schema() -> Schema {
    Schema::new([
        FieldSpec::new("id", LogicalType::Int32, false),
        FieldSpec::new("name", LogicalType::Utf8, false),
        FieldSpec::new("age", LogicalType::Int32, false),
        FieldSpec::new("salary", LogicalType::Decimal128(18, 2), false),
        FieldSpec::new("active", LogicalType::Bool, false),
        FieldSpec::new("category", LogicalType::Utf8, false),
    ])
    .expect("literal schema has unique field names")
}

/// Unscaled `i128` mantissa for a dollar amount under `Decimal128(18, 2)`.
pub fn decimal_cents(dollars: f64) -> i128 {
    (dollars * 100.0).round() as i128
}

/// The literal 10-row employees table from the end-to-end scenario,
/// built as a single chunk.
pub fn employees_table() -> Table {
    let ids = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
    let names = ["Alice", "Bob", "Charlie", "Diana", "Eve", "Frank", "Grace", "Henry", "Ivy", "Jack"];
    let ages = vec![25, 35, 45, 28, 32, 40, 29, 55, 23, 38];
    let salaries: Vec<i128> = [50000.00, 75000.00, 90000.00, 55000.00, 65000.00, 80000.00, 60000.00, 120000.00, 45000.00, 70000.00]
        .iter()
        .map(|d| decimal_cents(*d))
        .collect();
    let active = [true, true, false, true, true, false, true, true, true, false];
    let categories = ["Eng", "Eng", "Mgmt", "Eng", "Mkt", "Mgmt", "Mkt", "Exec", "Eng", "Eng"];

    let columns: Vec<Column> = vec![
        int32_column(ids, None),
        utf8_column(&names, None),
        int32_column(ages, None),
        decimal128_column(salaries, None),
        bool_column(&active, None),
        utf8_column(&categories, None),
    ];

    Table::builder(employees_schema())
        .add_chunk(columns)
        .expect("literal fixture columns satisfy the chunk invariants")
        .build()
}

/// Builds a `Table` of `num_rows` rows over `[id: Int64, value: Float64,
/// tag: Utf8, flag: Bool]`, split into chunks of `chunk_size` rows
/// (the last chunk short if `num_rows` doesn't divide evenly), driven by a
/// seeded RNG for reproducible property tests.
pub fn random_numeric_table(num_rows: usize, chunk_size: usize, seed: u64) -> Table {
    let schema = Schema::new([
        FieldSpec::new("id", LogicalType::Int64, false),
        FieldSpec::new("value", LogicalType::Float64, false),
        FieldSpec::new("tag", LogicalType::Utf8, false),
        FieldSpec::new("flag", LogicalType::Bool, false),
    ])
    .expect("random table schema has unique field names");

    let mut rng = StdRng::seed_from_u64(seed);
    let tags = ["red", "green", "blue", "yellow"];
    let mut builder = Table::builder(schema);

    let mut row = 0usize;
    while row < num_rows {
        let len = chunk_size.min(num_rows - row);
        let ids: Vec<i64> = (row..row + len).map(|i| i as i64).collect();
        let values: Vec<f64> = (0..len).map(|_| rng.gen_range(-1000.0..1000.0)).collect();
        let tag_values: Vec<&str> = (0..len).map(|_| tags[rng.gen_range(0..tags.len())]).collect();
        let flags: Vec<bool> = (0..len).map(|_| rng.gen_bool(0.5)).collect();

        let columns: Vec<Column> = vec![
            cq_store::builder::int64_column(ids, None),
            cq_store::builder::float64_column(values, None),
            utf8_column(&tag_values, None),
            bool_column(&flags, None),
        ];
        builder = builder.add_chunk(columns).expect("generated columns satisfy the chunk invariants");
        row += len;
    }

    builder.build()
}

/// Wraps `table` in an `Arc` for adapters/facades that need a shared,
/// cloneable handle to the same `ColumnarSource`.
pub fn shared(table: Table) -> Arc<Table> {
    Arc::new(table)
}

#[cfg(test)]
mod tests {
    use cq_store::ColumnarSource;

    use super::*;

    #[test]
    fn employees_table_has_ten_rows_one_chunk() {
        let table = employees_table();
        assert_eq!(table.total_rows(), 10);
        assert_eq!(table.chunk_count(), 1);
    }

    #[test]
    fn random_table_splits_into_expected_chunk_count() {
        let table = random_numeric_table(25, 10, 7);
        assert_eq!(table.total_rows(), 25);
        assert_eq!(table.chunk_count(), 3);
    }

    #[test]
    fn random_table_is_reproducible_for_the_same_seed() {
        let a = random_numeric_table(50, 16, 42);
        let b = random_numeric_table(50, 16, 42);
        for i in 0..a.chunk_count() {
            let ca = a.chunk(i);
            let cb = b.chunk(i);
            assert_eq!(ca.len(), cb.len());
        }
    }
}
