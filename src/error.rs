use crate::store::StoreError;

/// Error enum for the engine operations, mirroring the wire taxonomy:
/// `bad_request`, `not_found`, `internal_error`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Store failure: {0}")]
    Internal(#[source] StoreError),
}

impl EngineError {
    /// Wire code for this error, as consumed by HTTP/CLI callers.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::BadRequest(_) => "bad_request",
            EngineError::NotFound(_) => "not_found",
            EngineError::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            other => EngineError::Internal(other),
        }
    }
}
