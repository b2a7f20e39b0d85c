use thiserror::Error;

/// Failure taxonomy shared by every service. Handlers translate it to HTTP
/// status codes; services never build HTTP responses themselves.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Rejected before any state was touched.
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0} not found")]
    NotFound(String),

    /// The target exists but its lifecycle forbids the operation
    /// (e.g. closing an already closed chat session).
    #[error("{0}")]
    InvalidState(String),

    /// The text-generation collaborator failed or timed out. Never retried.
    #[error("text generation failed: {0}")]
    ExternalService(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        CoreError::InvalidArgument(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        CoreError::InvalidState(message.into())
    }

    pub fn external(message: impl Into<String>) -> Self {
        CoreError::ExternalService(message.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
