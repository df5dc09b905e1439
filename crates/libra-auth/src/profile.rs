//! Profile fetcher — bounded lookup of the `users` row for a subject.

use std::sync::Arc;
use std::time::Duration;

use libra_core::backend::ProfileRepository;
use libra_core::error::LibraError;
use libra_core::models::profile::Profile;
use tracing::{debug, warn};
use uuid::Uuid;

/// Fetches profiles with a hard deadline.
///
/// Failures never propagate: a timeout, a missing row or a backend error
/// all yield `None` after being logged. When the deadline passes the
/// in-flight request future is dropped, so the call is cancelled rather
/// than left running.
pub struct ProfileFetcher<P> {
    repo: Arc<P>,
    timeout: Duration,
}

impl<P: ProfileRepository> ProfileFetcher<P> {
    pub fn new(repo: Arc<P>, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    pub fn repository(&self) -> &Arc<P> {
        &self.repo
    }

    pub async fn fetch_profile(&self, user_id: Uuid) -> Option<Profile> {
        match tokio::time::timeout(self.timeout, self.repo.get_by_id(user_id)).await {
            Ok(Ok(profile)) if profile.id == user_id => Some(profile),
            Ok(Ok(profile)) => {
                warn!(%user_id, profile_id = %profile.id, "profile row does not match subject");
                None
            }
            Ok(Err(LibraError::NotFound { .. })) => {
                debug!(%user_id, "no profile row for user");
                None
            }
            Ok(Err(e)) => {
                warn!(%user_id, error = %e, "error getting profile");
                None
            }
            Err(_) => {
                warn!(
                    %user_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "profile fetch timed out"
                );
                None
            }
        }
    }
}
