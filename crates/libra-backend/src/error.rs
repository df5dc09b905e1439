//! Backend-specific error types and conversions.

use libra_core::error::LibraError;

/// Backend-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(String),

    /// The auth service rejected the request (bad credentials, expired
    /// refresh token, duplicate registration, ...).
    #[error("{message}")]
    Auth { status: u16, message: String },

    #[error("request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("no active session")]
    NoSession,
}

impl From<BackendError> for LibraError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound { entity, id } => LibraError::NotFound { entity, id },
            BackendError::Auth { message, .. } => {
                LibraError::AuthenticationFailed { reason: message }
            }
            BackendError::NoSession => LibraError::NotAuthenticated,
            BackendError::Http(e) if e.is_timeout() => LibraError::Timeout {
                operation: e
                    .url()
                    .map(|u| u.path().to_string())
                    .unwrap_or_else(|| "backend request".into()),
            },
            other => LibraError::Backend(other.to_string()),
        }
    }
}
