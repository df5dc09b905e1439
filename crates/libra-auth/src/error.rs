//! Authentication error types.

use libra_core::error::LibraError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no authenticated user")]
    NotAuthenticated,

    #[error("Name is required.")]
    NameRequired,

    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("Phone number is required.")]
    PhoneRequired,

    #[error("Please enter a valid phone number format (e.g., +1 555-123-4567).")]
    InvalidPhone,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("auth synchronizer is not running")]
    SynchronizerStopped,
}

impl From<AuthError> for LibraError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotAuthenticated => LibraError::NotAuthenticated,
            AuthError::NameRequired
            | AuthError::InvalidEmail
            | AuthError::PhoneRequired
            | AuthError::InvalidPhone
            | AuthError::PasswordMismatch
            | AuthError::PasswordTooShort { .. } => LibraError::Validation {
                message: err.to_string(),
            },
            AuthError::SynchronizerStopped => LibraError::Internal(err.to_string()),
        }
    }
}
