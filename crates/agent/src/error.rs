use slackforce_core::{DomainError, SinkError};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::llm::GenerationError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("tool loop exceeded {rounds} rounds without a final answer")]
    LoopExceeded { rounds: u32 },
    #[error("run was cancelled")]
    Cancelled,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl AgentError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Catalog(_) => "catalog",
            Self::Generation(_) => "generation",
            Self::LoopExceeded { .. } => "loop_exceeded",
            Self::Cancelled => "cancelled",
            Self::Domain(_) | Self::Sink(_) => "unhandled",
        }
    }

    /// The single message a user sees when a run fails.
    pub fn warning_text(&self) -> String {
        format!(":warning: Something went wrong: {self}")
    }
}

#[cfg(test)]
mod tests {
    use slackforce_core::DomainError;

    use super::AgentError;
    use crate::llm::GenerationError;

    #[test]
    fn warning_text_carries_the_error() {
        let error = AgentError::from(GenerationError::EmptyResponse);
        assert_eq!(error.warning_text(), ":warning: Something went wrong: model returned no candidates");
        assert_eq!(error.kind(), "generation");
    }

    #[test]
    fn domain_errors_are_reported_as_unhandled() {
        let error = AgentError::from(DomainError::EmptyModelTurn);
        assert_eq!(error.kind(), "unhandled");
    }
}
