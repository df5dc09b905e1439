//! Authentication client configuration.

use std::time::Duration;

use libra_core::models::role::Role;

/// Configuration for the auth synchronizer and route guard.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Upper bound on a single profile fetch (default: 1 second).
    pub profile_fetch_timeout: Duration,
    /// Upper bound on reading the current session (default: 1 second).
    pub session_fetch_timeout: Duration,
    /// Role assumed when neither the session claims nor the profile
    /// carry one (default: `Student`).
    pub default_role: Role,
    /// Public origin of the application, used as OAuth and password
    /// reset redirect target.
    pub site_url: String,
    /// Where unauthenticated users are sent (default: `/auth/login`).
    pub login_path: String,
    /// Where users lacking a required role are sent (default: `/`).
    pub home_path: String,
    /// Landing page of password reset links (default: `/auth/reset-password`).
    pub reset_password_path: String,
    /// Minimum length accepted for new passwords (default: 6).
    pub min_password_length: usize,
    /// Capacity of the synchronizer command queue (default: 32).
    pub command_buffer: usize,
}

impl AuthConfig {
    pub fn reset_password_url(&self) -> String {
        format!(
            "{}{}",
            self.site_url.trim_end_matches('/'),
            self.reset_password_path
        )
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            profile_fetch_timeout: Duration::from_secs(1),
            session_fetch_timeout: Duration::from_secs(1),
            default_role: Role::Student,
            site_url: "http://localhost:5173".into(),
            login_path: "/auth/login".into(),
            home_path: "/".into(),
            reset_password_path: "/auth/reset-password".into(),
            min_password_length: 6,
            command_buffer: 32,
        }
    }
}
