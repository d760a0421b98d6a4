#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum PlanError {
    #[error("plan references unknown column ordinal {0}")]
    UnknownColumn(usize),
    #[error("{0}")]
    Predicate(#[from] cq_predicate::PredicateError),
    #[error("{0}")]
    Schema(#[from] cq_schema::DuplicateFieldName),
}

impl From<PlanError> for cq_error::Error {
    fn from(err: PlanError) -> Self {
        cq_error::Error::SchemaMismatch(err.to_string())
    }
}
