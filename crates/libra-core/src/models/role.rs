//! Role domain model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access level gating which parts of the application a user may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Student,
    Librarian,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Student, Role::Librarian];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Librarian => "Librarian",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    /// Role names are matched exactly, the way they are stored in claims
    /// and in the `users` table.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Student" => Ok(Role::Student),
            "Librarian" => Ok(Role::Librarian),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// Role as asserted by a session, before any fallback.
///
/// A claim that is present but names no known role stays distinct from a
/// missing one: it is admitted by no role-gated view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimedRole {
    Known(Role),
    Unrecognized(String),
}

impl ClaimedRole {
    pub fn known(&self) -> Option<Role> {
        match self {
            ClaimedRole::Known(role) => Some(*role),
            ClaimedRole::Unrecognized(_) => None,
        }
    }

    pub fn is_any_of(&self, allowed: &[Role]) -> bool {
        self.known().is_some_and(|role| allowed.contains(&role))
    }
}

impl From<Role> for ClaimedRole {
    fn from(role: Role) -> Self {
        ClaimedRole::Known(role)
    }
}

impl From<&str> for ClaimedRole {
    fn from(raw: &str) -> Self {
        raw.parse()
            .map(ClaimedRole::Known)
            .unwrap_or_else(|_| ClaimedRole::Unrecognized(raw.to_string()))
    }
}

impl fmt::Display for ClaimedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimedRole::Known(role) => fmt::Display::fmt(role, f),
            ClaimedRole::Unrecognized(raw) => f.write_str(raw),
        }
    }
}
