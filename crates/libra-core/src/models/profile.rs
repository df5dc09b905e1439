//! Profile domain model (`users` table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Same value as the session subject.
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Merge a partial update into this profile.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(email) = &update.email {
            self.email = email.clone();
        }
        if let Some(phone) = &update.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(role) = update.role {
            self.role = role;
        }
    }
}

/// Row inserted on registration or post-OAuth role selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
}

/// Partial update of a profile row. `None` fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.role.is_none()
    }
}
