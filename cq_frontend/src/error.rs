/// Local error type for the expression-tree front end, folded into
/// [`cq_error::Error`] at the crate boundary -- the same pattern
/// `cq_predicate::PredicateError`/`cq_plan::PlanError` use.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ExprError {
    #[error("unknown column {0:?}")]
    UnknownColumn(String),

    #[error("unsupported expression: {0}")]
    Unsupported(String),
}

impl From<ExprError> for cq_error::Error {
    fn from(err: ExprError) -> Self {
        match err {
            ExprError::UnknownColumn(name) => cq_error::Error::SchemaMismatch(format!("unknown column {name:?}")),
            ExprError::Unsupported(msg) => cq_error::Error::UnsupportedExpression(msg),
        }
    }
}

pub type Result<T, E = ExprError> = ::std::result::Result<T, E>;
