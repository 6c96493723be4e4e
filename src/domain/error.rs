use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Remote service error: {0}")]
    RemoteService(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Run {run_id} did not finish within {waited_secs}s (last status: {last_status})")]
    RunTimeout {
        run_id: String,
        last_status: String,
        waited_secs: u64,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::RemoteService(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteService(_))
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RunTimeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::StorageError(_))
    }
}
