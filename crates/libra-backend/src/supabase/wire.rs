//! JSON shapes exchanged with GoTrue and PostgREST.

use chrono::{DateTime, Duration, Utc};
use libra_core::models::credentials::OAuthRequest;
use libra_core::models::session::{Session, SessionUser};
use reqwest::{Response, Url};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::BackendError;

#[derive(Debug, Deserialize)]
pub(super) struct UserResponse {
    pub id: Uuid,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl From<UserResponse> for SessionUser {
    fn from(user: UserResponse) -> Self {
        SessionUser {
            id: user.id,
            email: user.email.filter(|e| !e.is_empty()),
            user_metadata: user.user_metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    /// Unix seconds; older servers omit it.
    pub expires_at: Option<i64>,
    pub user: UserResponse,
}

impl SessionResponse {
    pub fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            issued_at: now,
            expires_at,
            user: self.user.into(),
        }
    }
}

/// `/signup` answers with a full session when email confirmation is
/// disabled and with the bare user otherwise.
pub(super) fn parse_sign_up(
    body: serde_json::Value,
    now: DateTime<Utc>,
) -> Result<Option<Session>, BackendError> {
    if body.get("access_token").is_none() {
        return Ok(None);
    }
    serde_json::from_value::<SessionResponse>(body)
        .map(|s| Some(s.into_session(now)))
        .map_err(|e| BackendError::Decode(e.to_string()))
}

/// Pull a human-readable message out of a GoTrue or PostgREST error body.
pub(super) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Pass successful responses through; turn the rest into
/// [`BackendError::Api`].
pub(super) async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Client errors from the auth service are authentication failures.
pub(super) fn as_auth_error(err: BackendError) -> BackendError {
    match err {
        BackendError::Api { status, message } if (400..500).contains(&status) => {
            BackendError::Auth { status, message }
        }
        other => other,
    }
}

pub(super) fn authorize_url(authorize_endpoint: &str, request: &OAuthRequest) -> Result<String, BackendError> {
    let mut url =
        Url::parse(authorize_endpoint).map_err(|e| BackendError::Url(e.to_string()))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("provider", request.provider.as_str());
        if let Some(redirect) = &request.redirect_to {
            query.append_pair("redirect_to", redirect);
        }
        for (key, value) in &request.query_params {
            query.append_pair(key, value);
        }
    }
    Ok(url.into())
}
