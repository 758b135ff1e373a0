use std::path::PathBuf;

/// Errors surfaced by the record store, the entity services and the auth layer.
///
/// Every variant carries a message specific enough to be shown to the operator
/// as-is; the CLI prints `Display` and returns to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record in {}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Replaces the message of a `NotFound` with a caller-specific one and
    /// passes every other variant through untouched.
    pub fn or_not_found<F>(self, message: F) -> Self
    where
        F: FnOnce() -> String,
    {
        match self {
            ServiceError::NotFound(_) => ServiceError::NotFound(message()),
            other => other,
        }
    }
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;
