/// Local error type for the executor, folded into [`cq_error::Error`] at the
/// crate boundary (the `cq` facade's `?` converts at the call site), the same
/// boundary pattern `cq_predicate::PredicateError` uses.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Predicate(#[from] cq_predicate::PredicateError),

    #[error("arithmetic overflow while aggregating column {column:?}")]
    ArithmeticOverflow { column: String },

    #[error("query cancelled: {0}")]
    Cancelled(String),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("empty source: {0}")]
    EmptySource(String),

    #[error("corrupt chunk: {0}")]
    CorruptChunk(String),
}

impl From<ExecError> for cq_error::Error {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Predicate(e) => e.into(),
            ExecError::ArithmeticOverflow { column } => cq_error::Error::ArithmeticOverflow { column },
            ExecError::Cancelled(msg) => cq_error::Error::Cancelled(msg),
            ExecError::CapacityExceeded(msg) => cq_error::Error::CapacityExceeded(msg),
            ExecError::EmptySource(msg) => cq_error::Error::EmptySource(msg),
            ExecError::CorruptChunk(msg) => cq_error::Error::CorruptChunk(msg),
        }
    }
}

pub type Result<T, E = ExecError> = ::std::result::Result<T, E>;
