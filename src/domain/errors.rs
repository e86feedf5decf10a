use thiserror::Error;

/// Closed set of failure kinds shared by the repository, the use-case layer and both entry points.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Entity already exists: {0}")]
    Conflict(String),
    #[error("Unavailable: {0}")]
    Unavailable(String),
    #[error("Deadline exceeded")]
    DeadlineExceeded,
    #[error("Operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    pub fn not_found(entity: &str, key: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} not found: {key}"))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Failures that may succeed when the same call is repeated later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DomainError::Unavailable(_)
                | DomainError::DeadlineExceeded
                | DomainError::Cancelled
                | DomainError::Internal(_)
        )
    }
}
