//! Inputs for identity operations against the auth backend.

use serde::{Deserialize, Serialize};

/// Email/password registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    /// Stored as identity claims (`name`, `phone`, `role`).
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }
}

/// Parameters of an OAuth redirect sign-in.
#[derive(Debug, Clone)]
pub struct OAuthRequest {
    pub provider: OAuthProvider,
    /// Where the provider sends the browser back to.
    pub redirect_to: Option<String>,
    /// Extra provider query parameters (`access_type`, `prompt`, ...).
    pub query_params: Vec<(String, String)>,
}

/// Changes to the authenticated identity itself (not the profile row).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Merged into the identity claims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}
