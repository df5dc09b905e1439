//! Auth state synchronizer: keeps the session store consistent with the
//! backend.
//!
//! A single driver task owns every store mutation. It performs the
//! initial load, attaches the push-channel listener only once that load
//! has finished, then serializes push events and handle commands
//! (refresh, visibility changes, sign-out) in arrival order.

use std::sync::Arc;
use std::time::Duration;

use libra_core::backend::{AuthBackend, ProfileRepository};
use libra_core::error::{LibraError, LibraResult};
use libra_core::models::credentials::{
    OAuthProvider, OAuthRequest, SignUpRequest, UserAttributes,
};
use libra_core::models::event::AuthEvent;
use libra_core::models::profile::{NewProfile, ProfileUpdate};
use libra_core::models::role::Role;
use libra_core::models::session::Session;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::profile::ProfileFetcher;
use crate::store::{AuthSnapshot, SessionStore, StoreAction};
use crate::validation::{self, SignUpForm};

/// Lifecycle of the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Uninitialized,
    /// Initial load in flight.
    Resolving,
    /// Initial load finished and the push listener is attached.
    Resolved,
}

/// Whether the application is currently shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Foreground,
    Background,
}

enum Command {
    Reload(oneshot::Sender<()>),
    Visibility(Visibility, oneshot::Sender<()>),
    Apply(StoreAction, oneshot::Sender<()>),
    Shutdown,
}

/// Handle to a running synchronizer.
///
/// Dropping the handle stops the driver task.
pub struct AuthSynchronizer<A, P> {
    auth: Arc<A>,
    profiles: Arc<P>,
    store: Arc<SessionStore>,
    phase: watch::Receiver<SyncPhase>,
    commands: mpsc::Sender<Command>,
    driver: JoinHandle<()>,
    config: AuthConfig,
}

impl<A, P> AuthSynchronizer<A, P>
where
    A: AuthBackend + 'static,
    P: ProfileRepository + 'static,
{
    /// Spawn the driver task and begin the initial load.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(auth: Arc<A>, profiles: Arc<P>, config: AuthConfig) -> Self {
        let store = Arc::new(SessionStore::new());
        let (phase_tx, phase_rx) = watch::channel(SyncPhase::Uninitialized);
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer.max(1));

        let driver = Driver {
            auth: Arc::clone(&auth),
            fetcher: ProfileFetcher::new(Arc::clone(&profiles), config.profile_fetch_timeout),
            store: Arc::clone(&store),
            phase: phase_tx,
            session_timeout: config.session_fetch_timeout,
            visibility: Visibility::Foreground,
        };
        let driver = tokio::spawn(driver.run(cmd_rx));

        Self {
            auth,
            profiles,
            store,
            phase: phase_rx,
            commands: cmd_tx,
            driver,
            config,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.store.subscribe()
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Wait until the initial load has completed.
    pub async fn wait_until_resolved(&self) -> Result<(), AuthError> {
        let mut phase = self.phase.clone();
        phase
            .wait_for(|p| *p == SyncPhase::Resolved)
            .await
            .map(|_| ())
            .map_err(|_| AuthError::SynchronizerStopped)
    }

    /// Re-run the full session + profile load and wait for it to land.
    pub async fn refresh_session(&self) -> Result<(), AuthError> {
        self.request(Command::Reload).await
    }

    /// Report a visibility change. A transition back to the foreground
    /// reloads session and profile once.
    pub async fn set_visibility(&self, visibility: Visibility) -> Result<(), AuthError> {
        self.request(|ack| Command::Visibility(visibility, ack)).await
    }

    /// Stop the driver task and wait for it to exit.
    pub async fn shutdown(&mut self) {
        if self.commands.send(Command::Shutdown).await.is_ok() {
            let _ = (&mut self.driver).await;
        }
    }

    /// Password sign-in. The new session reaches the store through the
    /// push channel.
    pub async fn sign_in(&self, email: &str, password: &str) -> LibraResult<()> {
        self.auth
            .sign_in_with_password(email, password)
            .await
            .map(|_| ())
            .inspect_err(|e| warn!(error = %e, "sign-in rejected"))
    }

    /// Start an OAuth sign-in and return the URL to send the user to.
    pub async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> LibraResult<String> {
        let request = OAuthRequest {
            provider,
            redirect_to: Some(self.config.site_url.clone()),
            query_params: vec![
                ("access_type".into(), "offline".into()),
                ("prompt".into(), "consent".into()),
            ],
        };
        self.auth
            .sign_in_with_oauth(request)
            .await
            .inspect_err(|e| error!(error = %e, provider = provider.as_str(), "error logging in"))
    }

    /// Register a new account. When the backend hands out a session
    /// straight away, the profile row is created and the store reloaded.
    pub async fn sign_up(&self, form: SignUpForm) -> LibraResult<()> {
        form.validate(self.config.min_password_length)?;

        let metadata = json!({
            "full_name": form.name,
            "phone": form.phone,
            "role": form.role,
        });
        let session = self
            .auth
            .sign_up(SignUpRequest {
                email: form.email.clone(),
                password: form.password.clone(),
                metadata,
            })
            .await
            .inspect_err(|e| warn!(error = %e, "sign-up rejected"))?;

        let Some(session) = session else {
            info!("sign-up pending email confirmation");
            return Ok(());
        };

        self.profiles
            .create(NewProfile {
                id: session.subject(),
                name: form.name,
                email: form.email,
                phone: Some(form.phone),
                role: form.role,
            })
            .await?;
        self.refresh_session().await?;
        Ok(())
    }

    /// Sign out remotely and clear the store. A failed remote call is
    /// returned, but the local state is cleared either way.
    pub async fn sign_out(&self) -> LibraResult<()> {
        let remote = self
            .auth
            .sign_out()
            .await
            .inspect_err(|e| error!(error = %e, "error signing out"));
        self.request(|ack| Command::Apply(StoreAction::SignedOut, ack))
            .await?;
        remote
    }

    /// Update the current user's profile row and the local copy.
    pub async fn update_profile(&self, update: ProfileUpdate) -> LibraResult<()> {
        let subject = self.snapshot().subject().ok_or(AuthError::NotAuthenticated)?;
        validation::validate_profile_update(&update)?;
        if update.is_empty() {
            return Ok(());
        }

        self.profiles
            .update(subject, update.clone())
            .await
            .inspect_err(|e| error!(error = %e, "error updating profile"))?;
        self.request(|ack| Command::Apply(StoreAction::ProfilePatched { subject, update }, ack))
            .await?;
        Ok(())
    }

    /// Record the role chosen after an OAuth sign-in: upsert the profile
    /// row, mirror the role into the identity claims and reload.
    pub async fn select_role(&self, role: Role) -> LibraResult<()> {
        let session = self
            .snapshot()
            .session
            .ok_or(AuthError::NotAuthenticated)?;
        let subject = session.subject();

        match self.profiles.get_by_id(subject).await {
            Ok(_) => {
                self.profiles
                    .update(
                        subject,
                        ProfileUpdate {
                            role: Some(role),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
            Err(LibraError::NotFound { .. }) => {
                self.profiles.create(profile_from_session(&session, role)).await?;
            }
            Err(e) => return Err(e),
        }

        self.auth
            .update_user(UserAttributes {
                data: Some(json!({ "role": role })),
                ..Default::default()
            })
            .await?;
        self.refresh_session().await?;
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str) -> LibraResult<()> {
        validation::validate_email(email)?;
        let redirect = self.config.reset_password_url();
        self.auth
            .reset_password_for_email(email, Some(&redirect))
            .await
            .inspect_err(|e| warn!(error = %e, "password reset request failed"))
    }

    /// Set a new password for the signed-in user (reset-link landing page).
    pub async fn update_password(&self, password: &str, confirm: &str) -> LibraResult<()> {
        if self.snapshot().session.is_none() {
            return Err(AuthError::NotAuthenticated.into());
        }
        validation::validate_new_password(password, confirm, self.config.min_password_length)?;
        self.auth
            .update_user(UserAttributes {
                password: Some(password.to_string()),
                ..Default::default()
            })
            .await
            .map(|_| ())
            .inspect_err(|e| warn!(error = %e, "error updating password"))
    }

    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<()>) -> Command,
    ) -> Result<(), AuthError> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(make(ack))
            .await
            .map_err(|_| AuthError::SynchronizerStopped)?;
        done.await.map_err(|_| AuthError::SynchronizerStopped)
    }
}

impl<A, P> Drop for AuthSynchronizer<A, P> {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Initial profile row for a user who signed in through OAuth.
fn profile_from_session(session: &Session, role: Role) -> NewProfile {
    let email = session.user.email.clone().unwrap_or_default();
    let metadata = &session.user.user_metadata;
    let name = ["full_name", "name"]
        .iter()
        .find_map(|key| metadata.get(*key).and_then(serde_json::Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| email.clone());
    NewProfile {
        id: session.subject(),
        name,
        email,
        phone: None,
        role,
    }
}

/// Task-side state; the only code that dispatches store actions.
struct Driver<A, P> {
    auth: Arc<A>,
    fetcher: ProfileFetcher<P>,
    store: Arc<SessionStore>,
    phase: watch::Sender<SyncPhase>,
    session_timeout: Duration,
    visibility: Visibility,
}

impl<A: AuthBackend, P: ProfileRepository> Driver<A, P> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.phase.send_replace(SyncPhase::Resolving);
        self.load().await;
        self.phase.send_replace(SyncPhase::Resolved);

        let mut events = self.auth.subscribe();
        let mut listening = true;
        debug!("auth event listener attached");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Reload(ack)) => {
                        self.load().await;
                        let _ = ack.send(());
                    }
                    Some(Command::Visibility(visibility, ack)) => {
                        self.on_visibility(visibility).await;
                        let _ = ack.send(());
                    }
                    Some(Command::Apply(action, ack)) => {
                        self.store.dispatch(action);
                        let _ = ack.send(());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                event = events.recv(), if listening => match event {
                    Ok(event) => self.on_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth event listener lagged, reloading session");
                        self.load().await;
                    }
                    Err(RecvError::Closed) => {
                        warn!("auth event channel closed");
                        listening = false;
                    }
                },
            }
        }
        debug!("auth synchronizer stopped");
    }

    /// Session, then profile. Always ends with the resolving flag cleared.
    async fn load(&self) {
        self.store.dispatch(StoreAction::BeginLoad);

        let session = match tokio::time::timeout(self.session_timeout, self.auth.get_session()).await
        {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                error!(error = %e, "error getting session");
                self.store.dispatch(StoreAction::LoadFailed);
                return;
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.session_timeout.as_millis() as u64,
                    "session fetch timed out"
                );
                self.store.dispatch(StoreAction::LoadFailed);
                return;
            }
        };

        let profile = match &session {
            Some(s) => self.fetcher.fetch_profile(s.subject()).await,
            None => None,
        };
        self.store.dispatch(StoreAction::Loaded { session, profile });
    }

    async fn on_event(&self, event: AuthEvent) {
        info!(event = %event.kind, "auth state changed");
        let subject = event.session.as_ref().map(Session::subject);
        self.store.dispatch(StoreAction::SessionChanged(event.session));

        let profile = match subject {
            Some(id) => self.fetcher.fetch_profile(id).await,
            None => None,
        };
        self.store
            .dispatch(StoreAction::ProfileResolved { subject, profile });
    }

    async fn on_visibility(&mut self, visibility: Visibility) {
        let previous = std::mem::replace(&mut self.visibility, visibility);
        if previous == Visibility::Background && visibility == Visibility::Foreground {
            debug!("returned to foreground, reloading session");
            self.load().await;
        }
    }
}
