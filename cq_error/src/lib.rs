//! The error taxonomy shared by every stage of the query engine.
//!
//! Each crate defines its own local error type for the failures that can
//! only happen at that stage (see e.g. `cq_predicate::PredicateError`), and
//! converts into [`Error`] at the boundary where it crosses into a caller
//! that doesn't care which stage failed. This mirrors how the upstream
//! `WriteError`/`QueryError` enums are composed: local, specific errors
//! close to where they're raised, one shared tagged value at the edge.

/// A single query-engine error, tagged by kind.
///
/// No operation recovers from one of these in-kernel: predicate, aggregate,
/// and bitmap kernels never catch their own errors, they propagate with `?`.
/// The executor collects at most one error per worker and returns the first
/// in chunk order.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A column referenced by a plan does not exist, or exists with the
    /// wrong logical type.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The front-end could not translate a construct into the supported
    /// logical-plan vocabulary. Surfaced when `strict_mode` is enabled;
    /// otherwise the caller may choose to fall back to a scalar plan.
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// A SQL string failed to parse, tagged with a byte offset into the
    /// original query text.
    #[error("sql parse error at position {position}: {message}")]
    SqlParseError { message: String, position: usize },

    /// A chunk's internal invariants (row-count agreement, null-bitmap
    /// length, monotone offsets) do not hold. Fatal; the executor never
    /// attempts partial recovery on a corrupt chunk.
    #[error("corrupt chunk: {0}")]
    CorruptChunk(String),

    /// An integer aggregate accumulator exceeded the target width.
    #[error("arithmetic overflow while aggregating column {column:?}")]
    ArithmeticOverflow { column: String },

    /// The caller's cancellation token was observed set at a chunk
    /// boundary. Carries a human-readable note of what, if anything, had
    /// already been reduced.
    #[error("query cancelled: {0}")]
    Cancelled(String),

    /// A hash aggregation's group table grew past its configured bound.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// The source table or a predicate reported an empty-input condition
    /// that a caller explicitly asked to be surfaced rather than defaulted
    /// (e.g. `MIN`/`MAX` over zero rows).
    #[error("empty source: {0}")]
    EmptySource(String),
}

pub type Result<T, E = Error> = ::std::result::Result<T, E>;
