//! Supabase client: GoTrue (`/auth/v1`) for identity and PostgREST
//! (`/rest/v1`) for the `users` table.
//!
//! The client keeps the current session in memory and emits an
//! [`AuthEvent`] on its broadcast channel whenever that session changes,
//! which is what the auth synchronizer listens to.

mod auth;
mod profiles;
mod wire;

use std::time::Duration;

use libra_core::models::event::{AuthEvent, AuthEventKind};
use libra_core::models::session::Session;
use reqwest::RequestBuilder;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use crate::error::BackendError;

/// Configuration for connecting to a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL (e.g., `https://xyzcompany.supabase.co`).
    pub url: String,
    /// Public anonymous API key.
    pub anon_key: String,
    /// Per-request timeout (default: 10 seconds).
    pub request_timeout: Duration,
    /// Sessions this close to expiry are refreshed before being handed
    /// out (default: 30 seconds).
    pub expiry_margin: Duration,
    /// Capacity of the auth event channel (default: 16).
    pub event_capacity: usize,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:54321".into(),
            anon_key: String::new(),
            request_timeout: Duration::from_secs(10),
            expiry_margin: Duration::from_secs(30),
            event_capacity: 16,
        }
    }
}

pub struct SupabaseClient {
    http: reqwest::Client,
    config: SupabaseConfig,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> Result<Self, BackendError> {
        info!(url = %config.url, "Creating Supabase client");
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Ok(Self {
            http,
            config,
            session: RwLock::new(None),
            events,
        })
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url())
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url())
    }

    /// Attach the API key and a bearer token: the user's access token when
    /// signed in, the anonymous key otherwise.
    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.config.anon_key.clone(),
        };
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }

    async fn replace_session(&self, session: Option<Session>, kind: AuthEventKind) {
        *self.session.write().await = session.clone();
        debug!(event = %kind, "session changed");
        // Nobody listening yet is fine.
        let _ = self.events.send(AuthEvent::new(kind, session));
    }
}
