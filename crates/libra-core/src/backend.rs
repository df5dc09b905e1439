//! Trait definitions for the backend-as-a-service the client talks to.
//!
//! All operations are async. Implementations live in `libra-backend`;
//! the auth crate only ever sees these traits.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::LibraResult;
use crate::models::{
    credentials::{OAuthRequest, SignUpRequest, UserAttributes},
    event::AuthEvent,
    profile::{NewProfile, Profile, ProfileUpdate},
    session::{Session, SessionUser},
};

/// Receiving end of the auth push channel.
pub type AuthEventReceiver = broadcast::Receiver<AuthEvent>;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

pub trait AuthBackend: Send + Sync {
    /// Current session known to the backend client, if any.
    fn get_session(&self) -> impl Future<Output = LibraResult<Option<Session>>> + Send;

    /// Attach a listener to the push channel. Only events emitted after
    /// this call are delivered.
    fn subscribe(&self) -> AuthEventReceiver;

    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = LibraResult<Session>> + Send;

    /// Returns the provider authorization URL the user must be sent to.
    fn sign_in_with_oauth(
        &self,
        request: OAuthRequest,
    ) -> impl Future<Output = LibraResult<String>> + Send;

    /// Registers a new identity. A session is returned only when the
    /// backend does not require email confirmation.
    fn sign_up(
        &self,
        input: SignUpRequest,
    ) -> impl Future<Output = LibraResult<Option<Session>>> + Send;

    fn sign_out(&self) -> impl Future<Output = LibraResult<()>> + Send;

    fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> impl Future<Output = LibraResult<()>> + Send;

    fn update_user(
        &self,
        attributes: UserAttributes,
    ) -> impl Future<Output = LibraResult<SessionUser>> + Send;

    fn refresh_session(&self) -> impl Future<Output = LibraResult<Option<Session>>> + Send;
}

// ---------------------------------------------------------------------------
// Profiles (`users` table)
// ---------------------------------------------------------------------------

pub trait ProfileRepository: Send + Sync {
    /// Fails with `LibraError::NotFound` when no row matches.
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = LibraResult<Profile>> + Send;
    fn create(&self, input: NewProfile) -> impl Future<Output = LibraResult<Profile>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: ProfileUpdate,
    ) -> impl Future<Output = LibraResult<()>> + Send;
}
