//! Application configuration from environment variables.

use std::time::Duration;

use libra_auth::AuthConfig;
use libra_backend::SupabaseConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("{name} must be a number of milliseconds, got {value:?}")]
    InvalidMillis { name: &'static str, value: String },
}

/// Optional credentials used to open a session at startup.
#[derive(Debug, Clone)]
pub enum StartupLogin {
    Password { email: String, password: String },
    /// Refresh token handed back by an OAuth or reset-link redirect.
    RefreshToken(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase: SupabaseConfig,
    pub auth: AuthConfig,
    /// Location whose guard decision is logged on every state change.
    pub location: String,
    pub login: Option<StartupLogin>,
}

impl AppConfig {
    /// Read configuration from the process environment, after loading a
    /// `.env` file if one is present.
    ///
    /// `SUPABASE_URL` and `SUPABASE_ANON_KEY` are required. Everything
    /// else falls back to the library defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let supabase = SupabaseConfig {
            url: required("SUPABASE_URL")?,
            anon_key: required("SUPABASE_ANON_KEY")?,
            ..Default::default()
        };

        let mut auth = AuthConfig::default();
        if let Some(site_url) = optional("LIBRA_SITE_URL") {
            auth.site_url = site_url;
        }
        if let Some(timeout) = millis("LIBRA_PROFILE_TIMEOUT_MS")? {
            auth.profile_fetch_timeout = timeout;
        }
        if let Some(timeout) = millis("LIBRA_SESSION_TIMEOUT_MS")? {
            auth.session_fetch_timeout = timeout;
        }

        let login = match (
            optional("LIBRA_EMAIL"),
            optional("LIBRA_PASSWORD"),
            optional("LIBRA_REFRESH_TOKEN"),
        ) {
            (Some(email), Some(password), _) => Some(StartupLogin::Password { email, password }),
            (_, _, Some(token)) => Some(StartupLogin::RefreshToken(token)),
            _ => None,
        };

        Ok(Self {
            supabase,
            location: optional("LIBRA_LOCATION").unwrap_or_else(|| auth.home_path.clone()),
            auth,
            login,
        })
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn millis(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    optional(name)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidMillis { name, value })
        })
        .transpose()
}
