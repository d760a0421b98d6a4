/// Local error type for predicate construction and evaluation, folded into
/// [`cq_error::Error`] at the crate boundary (`cq_plan`/`cq_exec` call
/// sites convert with `?` via the `From` impl below).
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum PredicateError {
    #[error("predicate references unknown column ordinal {0}")]
    UnknownColumn(usize),
    #[error("predicate operand type does not match column {column:?}'s logical type {logical_type}")]
    KindMismatch { column: String, logical_type: String },
}

impl From<PredicateError> for cq_error::Error {
    fn from(err: PredicateError) -> Self {
        cq_error::Error::SchemaMismatch(err.to_string())
    }
}
