//! Auth events delivered by the backend push channel.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl AuthEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEventKind::InitialSession => "INITIAL_SESSION",
            AuthEventKind::SignedIn => "SIGNED_IN",
            AuthEventKind::SignedOut => "SIGNED_OUT",
            AuthEventKind::TokenRefreshed => "TOKEN_REFRESHED",
            AuthEventKind::UserUpdated => "USER_UPDATED",
            AuthEventKind::PasswordRecovery => "PASSWORD_RECOVERY",
        }
    }
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session change pushed by the auth backend.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }

    pub fn signed_out() -> Self {
        Self::new(AuthEventKind::SignedOut, None)
    }
}
