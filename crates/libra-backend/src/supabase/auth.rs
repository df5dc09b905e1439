//! GoTrue implementation of [`AuthBackend`].

use chrono::Utc;
use libra_core::backend::{AuthBackend, AuthEventReceiver};
use libra_core::error::LibraResult;
use libra_core::models::credentials::{OAuthRequest, SignUpRequest, UserAttributes};
use libra_core::models::event::AuthEventKind;
use libra_core::models::session::{Session, SessionUser};
use serde_json::json;
use tracing::{info, warn};

use super::SupabaseClient;
use super::wire::{self, SessionResponse, UserResponse};
use crate::error::BackendError;

impl SupabaseClient {
    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, BackendError> {
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await?;
        let response = wire::check(response).await.map_err(wire::as_auth_error)?;
        let session: SessionResponse = response.json().await?;
        Ok(session.into_session(Utc::now()))
    }

    /// Adopt a session handed back by an OAuth or magic-link redirect.
    pub async fn recover_session(&self, refresh_token: &str) -> LibraResult<Session> {
        let session = self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;
        self.replace_session(Some(session.clone()), AuthEventKind::SignedIn)
            .await;
        Ok(session)
    }
}

impl AuthBackend for SupabaseClient {
    async fn get_session(&self) -> LibraResult<Option<Session>> {
        let current = self.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };
        let margin = chrono::Duration::from_std(self.config.expiry_margin)
            .unwrap_or_else(|_| chrono::Duration::zero());
        if session.is_expired_at(Utc::now() + margin) {
            return self.refresh_session().await;
        }
        Ok(Some(session))
    }

    fn subscribe(&self) -> AuthEventReceiver {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> LibraResult<Session> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        info!(user_id = %session.subject(), "signed in with password");
        self.replace_session(Some(session.clone()), AuthEventKind::SignedIn)
            .await;
        Ok(session)
    }

    async fn sign_in_with_oauth(&self, request: OAuthRequest) -> LibraResult<String> {
        Ok(wire::authorize_url(&self.auth_url("authorize"), &request)?)
    }

    async fn sign_up(&self, input: SignUpRequest) -> LibraResult<Option<Session>> {
        let response = self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.config.anon_key)
            .json(&json!({
                "email": input.email,
                "password": input.password,
                "data": input.metadata,
            }))
            .send()
            .await
            .map_err(BackendError::from)?;
        let response = wire::check(response).await.map_err(wire::as_auth_error)?;
        let body: serde_json::Value = response.json().await.map_err(BackendError::from)?;

        let session = wire::parse_sign_up(body, Utc::now())?;
        if let Some(session) = &session {
            self.replace_session(Some(session.clone()), AuthEventKind::SignedIn)
                .await;
        }
        Ok(session)
    }

    async fn sign_out(&self) -> LibraResult<()> {
        if self.session.read().await.is_some() {
            let request = self.http.post(self.auth_url("logout"));
            let result = match self.authorized(request).await.send().await {
                Ok(response) => wire::check(response).await.map(|_| ()),
                Err(e) => Err(e.into()),
            };
            // The local session is dropped regardless; a failed revoke only
            // leaves the refresh token to expire on its own.
            if let Err(e) = result {
                warn!(error = %e, "remote sign-out failed");
            }
        }
        self.replace_session(None, AuthEventKind::SignedOut).await;
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> LibraResult<()> {
        let mut request = self
            .http
            .post(self.auth_url("recover"))
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email }));
        if let Some(redirect) = redirect_to {
            request = request.query(&[("redirect_to", redirect)]);
        }
        let response = request.send().await.map_err(BackendError::from)?;
        wire::check(response).await.map_err(wire::as_auth_error)?;
        Ok(())
    }

    async fn update_user(&self, attributes: UserAttributes) -> LibraResult<SessionUser> {
        let Some(mut session) = self.session.read().await.clone() else {
            return Err(BackendError::NoSession.into());
        };
        let request = self.http.put(self.auth_url("user")).json(&attributes);
        let response = self
            .authorized(request)
            .await
            .send()
            .await
            .map_err(BackendError::from)?;
        let response = wire::check(response).await.map_err(wire::as_auth_error)?;
        let user: UserResponse = response.json().await.map_err(BackendError::from)?;

        session.user = user.into();
        let updated = session.user.clone();
        self.replace_session(Some(session), AuthEventKind::UserUpdated)
            .await;
        Ok(updated)
    }

    async fn refresh_session(&self) -> LibraResult<Option<Session>> {
        let Some(refresh_token) = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
        else {
            return Ok(None);
        };

        match self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(session) => {
                self.replace_session(Some(session.clone()), AuthEventKind::TokenRefreshed)
                    .await;
                Ok(Some(session))
            }
            Err(e @ BackendError::Auth { .. }) => {
                // The refresh token was revoked or already used.
                warn!(error = %e, "session refresh rejected, signing out");
                self.replace_session(None, AuthEventKind::SignedOut).await;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
