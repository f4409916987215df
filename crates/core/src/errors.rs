use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("function response `{name}` has no matching function call in the preceding model turn")]
    OrphanedFunctionResponse { name: String },
    #[error("a model turn must carry at least one part")]
    EmptyModelTurn,
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
