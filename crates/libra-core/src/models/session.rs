//! Session domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::{ClaimedRole, Role};

/// Identity embedded in a session, as issued by the auth backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Subject identifier.
    pub id: Uuid,
    pub email: Option<String>,
    /// Free-form claims attached to the identity (`role`, `full_name`, ...).
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl SessionUser {
    /// Role carried in the identity claims. A missing, null or empty
    /// claim is absent; any other value is a claim, recognized or not.
    pub fn claimed_role(&self) -> Option<ClaimedRole> {
        match self.user_metadata.get("role")? {
            serde_json::Value::Null => None,
            serde_json::Value::String(raw) if raw.is_empty() => None,
            serde_json::Value::String(raw) => Some(ClaimedRole::from(raw.as_str())),
            other => Some(ClaimedRole::Unrecognized(other.to_string())),
        }
    }

    /// Role carried in the identity claims, if it names a known role.
    pub fn role_claim(&self) -> Option<Role> {
        self.claimed_role().and_then(|claim| claim.known())
    }
}

/// Authentication credential bundle for the current user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user: SessionUser,
}

impl Session {
    pub fn subject(&self) -> Uuid {
        self.user.id
    }

    pub fn claimed_role(&self) -> Option<ClaimedRole> {
        self.user.claimed_role()
    }

    pub fn role_claim(&self) -> Option<Role> {
        self.user.role_claim()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
