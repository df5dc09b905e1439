//! In-memory implementation of [`AuthBackend`] and [`ProfileRepository`].
//!
//! Behaves like a hosted backend from the client's point of view: it
//! keeps one current session, pushes auth events on a broadcast channel
//! and stores profile rows. Latency and failures can be injected per
//! operation, and fetches are counted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use libra_core::backend::{AuthBackend, AuthEventReceiver, ProfileRepository};
use libra_core::error::{LibraError, LibraResult};
use libra_core::models::credentials::{OAuthRequest, SignUpRequest, UserAttributes};
use libra_core::models::event::{AuthEvent, AuthEventKind};
use libra_core::models::profile::{NewProfile, Profile, ProfileUpdate};
use libra_core::models::session::{Session, SessionUser};
use tokio::sync::{Mutex, broadcast};
use tracing::debug;
use uuid::Uuid;

const ACCESS_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone)]
struct Account {
    user: SessionUser,
    password: String,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    session: Option<Session>,
    profiles: HashMap<Uuid, Profile>,
    password_resets: Vec<String>,
    session_delay: Duration,
    profile_delay: Duration,
    fail_sessions: bool,
    fail_profiles: bool,
    fail_sign_outs: bool,
}

pub struct MemoryBackend {
    state: Mutex<State>,
    events: broadcast::Sender<AuthEvent>,
    session_fetches: AtomicUsize,
    profile_fetches: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_event_capacity(64)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            state: Mutex::new(State::default()),
            events,
            session_fetches: AtomicUsize::new(0),
            profile_fetches: AtomicUsize::new(0),
        }
    }

    /// Create an identity without signing it in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> SessionUser {
        let user = SessionUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: metadata,
        };
        self.state.lock().await.accounts.insert(
            user.id,
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    pub async fn insert_profile(&self, profile: Profile) {
        self.state.lock().await.profiles.insert(profile.id, profile);
    }

    /// Replace the stored session without emitting an event, as if it had
    /// been restored from local storage before the app started.
    pub async fn set_current_session(&self, session: Option<Session>) {
        self.state.lock().await.session = session;
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.state.lock().await.session.clone()
    }

    pub async fn password_resets(&self) -> Vec<String> {
        self.state.lock().await.password_resets.clone()
    }

    /// Push an arbitrary event to listeners.
    pub fn emit(&self, event: AuthEvent) {
        debug!(event = %event.kind, "memory backend emitting auth event");
        // No receivers is not an error: the client may not be listening yet.
        let _ = self.events.send(event);
    }

    pub async fn set_session_delay(&self, delay: Duration) {
        self.state.lock().await.session_delay = delay;
    }

    pub async fn set_profile_delay(&self, delay: Duration) {
        self.state.lock().await.profile_delay = delay;
    }

    pub async fn fail_session_fetches(&self, fail: bool) {
        self.state.lock().await.fail_sessions = fail;
    }

    pub async fn fail_profile_fetches(&self, fail: bool) {
        self.state.lock().await.fail_profiles = fail;
    }

    /// Make sign-out fail without revoking the stored session.
    pub async fn fail_sign_outs(&self, fail: bool) {
        self.state.lock().await.fail_sign_outs = fail;
    }

    pub fn session_fetches(&self) -> usize {
        self.session_fetches.load(Ordering::SeqCst)
    }

    pub fn profile_fetches(&self) -> usize {
        self.profile_fetches.load(Ordering::SeqCst)
    }

    /// Mint a session for `user` valid for one hour.
    pub fn issue_session(user: &SessionUser) -> Session {
        let now = Utc::now();
        Session {
            access_token: format!("access-{}", Uuid::new_v4()),
            refresh_token: format!("refresh-{}", Uuid::new_v4()),
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(ACCESS_TOKEN_LIFETIME_SECS),
            user: user.clone(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthBackend for MemoryBackend {
    async fn get_session(&self) -> LibraResult<Option<Session>> {
        self.session_fetches.fetch_add(1, Ordering::SeqCst);
        let (delay, fail) = {
            let state = self.state.lock().await;
            (state.session_delay, state.fail_sessions)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(LibraError::Backend("session service unavailable".into()));
        }
        Ok(self.state.lock().await.session.clone())
    }

    fn subscribe(&self) -> AuthEventReceiver {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> LibraResult<Session> {
        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .values()
            .find(|a| a.user.email.as_deref() == Some(email) && a.password == password)
            .cloned()
            .ok_or_else(|| LibraError::AuthenticationFailed {
                reason: "Invalid login credentials".into(),
            })?;

        let session = Self::issue_session(&account.user);
        state.session = Some(session.clone());
        self.emit(AuthEvent::new(AuthEventKind::SignedIn, Some(session.clone())));
        Ok(session)
    }

    async fn sign_in_with_oauth(&self, request: OAuthRequest) -> LibraResult<String> {
        let mut url = format!("memory://authorize?provider={}", request.provider.as_str());
        if let Some(redirect) = &request.redirect_to {
            url.push_str(&format!("&redirect_to={redirect}"));
        }
        for (key, value) in &request.query_params {
            url.push_str(&format!("&{key}={value}"));
        }
        Ok(url)
    }

    async fn sign_up(&self, input: SignUpRequest) -> LibraResult<Option<Session>> {
        let mut state = self.state.lock().await;
        if state
            .accounts
            .values()
            .any(|a| a.user.email.as_deref() == Some(input.email.as_str()))
        {
            return Err(LibraError::AuthenticationFailed {
                reason: "User already registered".into(),
            });
        }

        let user = SessionUser {
            id: Uuid::new_v4(),
            email: Some(input.email),
            user_metadata: input.metadata,
        };
        state.accounts.insert(
            user.id,
            Account {
                user: user.clone(),
                password: input.password,
            },
        );

        let session = Self::issue_session(&user);
        state.session = Some(session.clone());
        self.emit(AuthEvent::new(AuthEventKind::SignedIn, Some(session.clone())));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> LibraResult<()> {
        let mut state = self.state.lock().await;
        if state.fail_sign_outs {
            return Err(LibraError::Backend("sign-out request failed".into()));
        }
        state.session = None;
        drop(state);
        self.emit(AuthEvent::signed_out());
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        _redirect_to: Option<&str>,
    ) -> LibraResult<()> {
        self.state
            .lock()
            .await
            .password_resets
            .push(email.to_string());
        Ok(())
    }

    async fn update_user(&self, attributes: UserAttributes) -> LibraResult<SessionUser> {
        let mut state = self.state.lock().await;
        let mut session = state.session.clone().ok_or(LibraError::NotAuthenticated)?;
        let account = state
            .accounts
            .get_mut(&session.subject())
            .ok_or_else(|| LibraError::NotFound {
                entity: "user".into(),
                id: session.subject().to_string(),
            })?;

        if let Some(email) = attributes.email {
            account.user.email = Some(email);
        }
        if let Some(password) = attributes.password {
            account.password = password;
        }
        if let Some(serde_json::Value::Object(data)) = attributes.data {
            if !account.user.user_metadata.is_object() {
                account.user.user_metadata = serde_json::json!({});
            }
            if let Some(existing) = account.user.user_metadata.as_object_mut() {
                existing.extend(data);
            }
        }

        let user = account.user.clone();
        session.user = user.clone();
        state.session = Some(session.clone());
        self.emit(AuthEvent::new(AuthEventKind::UserUpdated, Some(session)));
        Ok(user)
    }

    async fn refresh_session(&self) -> LibraResult<Option<Session>> {
        let mut state = self.state.lock().await;
        let Some(current) = state.session.as_ref() else {
            return Ok(None);
        };
        let session = Self::issue_session(&current.user);
        state.session = Some(session.clone());
        self.emit(AuthEvent::new(
            AuthEventKind::TokenRefreshed,
            Some(session.clone()),
        ));
        Ok(Some(session))
    }
}

impl ProfileRepository for MemoryBackend {
    async fn get_by_id(&self, id: Uuid) -> LibraResult<Profile> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        let (delay, fail) = {
            let state = self.state.lock().await;
            (state.profile_delay, state.fail_profiles)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(LibraError::Backend("profile query failed".into()));
        }
        self.state
            .lock()
            .await
            .profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| LibraError::NotFound {
                entity: "profile".into(),
                id: id.to_string(),
            })
    }

    async fn create(&self, input: NewProfile) -> LibraResult<Profile> {
        let mut state = self.state.lock().await;
        if state.profiles.contains_key(&input.id) {
            return Err(LibraError::Backend(format!(
                "duplicate key value violates unique constraint on users.id = {}",
                input.id
            )));
        }
        let now = Utc::now();
        let profile = Profile {
            id: input.id,
            name: input.name,
            email: input.email,
            phone: input.phone,
            role: input.role,
            created_at: now,
            updated_at: now,
        };
        state.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn update(&self, id: Uuid, input: ProfileUpdate) -> LibraResult<()> {
        let mut state = self.state.lock().await;
        let profile = state
            .profiles
            .get_mut(&id)
            .ok_or_else(|| LibraError::NotFound {
                entity: "profile".into(),
                id: id.to_string(),
            })?;
        profile.apply(&input);
        profile.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libra_core::models::role::Role;

    #[tokio::test]
    async fn sign_in_emits_event_and_stores_session() {
        let backend = MemoryBackend::new();
        let user = backend
            .register("ada@example.com", "analytical", serde_json::json!({}))
            .await;
        let mut events = backend.subscribe();

        let session = backend
            .sign_in_with_password("ada@example.com", "analytical")
            .await
            .unwrap();
        assert_eq!(session.subject(), user.id);

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, AuthEventKind::SignedIn);
        assert_eq!(event.session.unwrap().subject(), user.id);
        assert_eq!(backend.current_session().await.unwrap().subject(), user.id);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let backend = MemoryBackend::new();
        backend
            .register("ada@example.com", "analytical", serde_json::json!({}))
            .await;
        let err = backend
            .sign_in_with_password("ada@example.com", "engine")
            .await
            .unwrap_err();
        assert!(matches!(err, LibraError::AuthenticationFailed { .. }));
    }

    #[tokio::test]
    async fn update_user_merges_metadata() {
        let backend = MemoryBackend::new();
        backend
            .register(
                "ada@example.com",
                "analytical",
                serde_json::json!({ "full_name": "Ada" }),
            )
            .await;
        backend
            .sign_in_with_password("ada@example.com", "analytical")
            .await
            .unwrap();

        let user = backend
            .update_user(UserAttributes {
                data: Some(serde_json::json!({ "role": "Librarian" })),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(user.role_claim(), Some(Role::Librarian));
        assert_eq!(user.user_metadata["full_name"], "Ada");
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, LibraError::NotFound { .. }));
        assert_eq!(backend.profile_fetches(), 1);
    }
}
