//! Executor: chunk-at-a-time kernels (scalar/SIMD-shaped predicate
//! evaluation, fused filter+aggregate, grouped hash aggregation, top-k /
//! full sort, short-circuit `any`/`first`), static parallel chunk
//! partitioning, and the final materialization into rows or columns.
//!
//! [`executor::run`] is the single entry point: it drives a
//! [`cq_physical::PhysicalQuery`] against a [`cq_store::ColumnarSource`] and
//! returns either a row-major or columnar result batch.

pub mod aggregate;
pub mod cancellation;
pub mod error;
pub mod executor;
pub mod group_by;
pub mod materialize;
pub mod numeric;
pub mod partition;
pub mod scan;
pub mod short_circuit;
pub mod sort;

pub use cancellation::CancellationToken;
pub use error::{ExecError, Result};
pub use executor::{run, QueryResult};
pub use group_by::{GroupRow, MAX_GROUP_TABLE_SIZE};
pub use materialize::{ColumnarBatch, RowBatch};
