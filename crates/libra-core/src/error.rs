//! Error types for the Libra client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("No authenticated user")]
    NotAuthenticated,

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Timed out waiting for {operation}")]
    Timeout { operation: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type LibraResult<T> = Result<T, LibraError>;
