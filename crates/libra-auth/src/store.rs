//! Session store, the single owned container for authentication state.
//!
//! State changes only through [`reduce`]; the synchronizer is the sole
//! dispatcher. Readers take a [`SessionStore::snapshot`] or hold a
//! [`SessionStore::subscribe`] receiver that is notified on every update.

use libra_core::models::profile::{Profile, ProfileUpdate};
use libra_core::models::session::Session;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

/// Point-in-time view of the authentication state.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    /// `true` while a session load is in flight.
    pub resolving: bool,
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self {
            session: None,
            profile: None,
            resolving: true,
        }
    }
}

impl AuthSnapshot {
    pub fn subject(&self) -> Option<Uuid> {
        self.session.as_ref().map(Session::subject)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

/// Every way the store can change.
#[derive(Debug, Clone)]
pub enum StoreAction {
    BeginLoad,
    Loaded {
        session: Option<Session>,
        profile: Option<Profile>,
    },
    LoadFailed,
    SessionChanged(Option<Session>),
    /// Result of a profile fetch issued for `subject`.
    ProfileResolved {
        subject: Option<Uuid>,
        profile: Option<Profile>,
    },
    /// Local echo of a row update issued for `subject`.
    ProfilePatched {
        subject: Uuid,
        update: ProfileUpdate,
    },
    SignedOut,
}

/// Apply `action` to `state`.
pub fn reduce(state: &mut AuthSnapshot, action: StoreAction) {
    match action {
        StoreAction::BeginLoad => state.resolving = true,
        StoreAction::Loaded { session, profile } => {
            let subject = session.as_ref().map(Session::subject);
            state.profile = profile.filter(|p| Some(p.id) == subject);
            state.session = session;
            state.resolving = false;
        }
        StoreAction::LoadFailed | StoreAction::SignedOut => {
            state.session = None;
            state.profile = None;
            state.resolving = false;
        }
        StoreAction::SessionChanged(session) => {
            let subject = session.as_ref().map(Session::subject);
            if state.profile.as_ref().map(|p| p.id) != subject {
                state.profile = None;
            }
            state.session = session;
        }
        StoreAction::ProfileResolved { subject, profile } => {
            if subject == state.subject() {
                state.profile = profile.filter(|p| Some(p.id) == subject);
            } else {
                debug!("discarding profile resolved for a previous session");
            }
            state.resolving = false;
        }
        StoreAction::ProfilePatched { subject, update } => {
            if state.subject() != Some(subject) {
                debug!("discarding profile patch issued for a previous session");
                return;
            }
            match state.profile.as_mut() {
                Some(profile) if profile.id == subject => profile.apply(&update),
                _ => warn!("profile patch dropped: no profile loaded"),
            }
        }
    }
}

/// Publish/subscribe holder of the current [`AuthSnapshot`].
#[derive(Debug)]
pub struct SessionStore {
    tx: watch::Sender<AuthSnapshot>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AuthSnapshot::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.tx.subscribe()
    }

    pub(crate) fn dispatch(&self, action: StoreAction) {
        self.tx.send_modify(|state| reduce(state, action));
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use libra_core::models::role::Role;
    use libra_core::models::session::SessionUser;

    fn session(id: Uuid) -> Session {
        let now = Utc::now();
        Session {
            access_token: format!("access-{id}"),
            refresh_token: "refresh".into(),
            issued_at: now,
            expires_at: now + Duration::seconds(3600),
            user: SessionUser {
                id,
                email: Some("reader@example.com".into()),
                user_metadata: serde_json::json!({}),
            },
        }
    }

    fn profile(id: Uuid) -> Profile {
        let now = Utc::now();
        Profile {
            id,
            name: "Reader".into(),
            email: "reader@example.com".into(),
            phone: None,
            role: Role::Student,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn starts_resolving_and_empty() {
        let store = SessionStore::new();
        let snap = store.snapshot();
        assert!(snap.resolving);
        assert!(snap.session.is_none());
        assert!(snap.profile.is_none());
    }

    #[test]
    fn loaded_clears_resolving() {
        let id = Uuid::new_v4();
        let mut state = AuthSnapshot::default();
        reduce(
            &mut state,
            StoreAction::Loaded {
                session: Some(session(id)),
                profile: Some(profile(id)),
            },
        );
        assert!(!state.resolving);
        assert_eq!(state.subject(), Some(id));
        assert_eq!(state.profile.as_ref().map(|p| p.id), Some(id));
    }

    #[test]
    fn load_failure_clears_everything() {
        let id = Uuid::new_v4();
        let mut state = AuthSnapshot {
            session: Some(session(id)),
            profile: Some(profile(id)),
            resolving: true,
        };
        reduce(&mut state, StoreAction::LoadFailed);
        assert_eq!(state, AuthSnapshot { resolving: false, ..AuthSnapshot::default() });
    }

    #[test]
    fn profile_for_other_subject_is_rejected() {
        let mut state = AuthSnapshot::default();
        reduce(
            &mut state,
            StoreAction::Loaded {
                session: Some(session(Uuid::new_v4())),
                profile: Some(profile(Uuid::new_v4())),
            },
        );
        assert!(state.session.is_some());
        assert!(state.profile.is_none());
    }

    #[test]
    fn session_change_to_new_subject_drops_profile() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut state = AuthSnapshot {
            session: Some(session(a)),
            profile: Some(profile(a)),
            resolving: false,
        };

        // Same subject (token refresh) keeps the profile.
        reduce(&mut state, StoreAction::SessionChanged(Some(session(a))));
        assert!(state.profile.is_some());

        reduce(&mut state, StoreAction::SessionChanged(Some(session(b))));
        assert_eq!(state.subject(), Some(b));
        assert!(state.profile.is_none());
    }

    #[test]
    fn stale_profile_result_is_discarded_but_resolving_clears() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut state = AuthSnapshot {
            session: Some(session(b)),
            profile: None,
            resolving: true,
        };
        reduce(
            &mut state,
            StoreAction::ProfileResolved {
                subject: Some(a),
                profile: Some(profile(a)),
            },
        );
        assert!(state.profile.is_none());
        assert!(!state.resolving);
    }

    #[test]
    fn patch_merges_into_loaded_profile() {
        let id = Uuid::new_v4();
        let mut state = AuthSnapshot {
            session: Some(session(id)),
            profile: Some(profile(id)),
            resolving: false,
        };
        reduce(
            &mut state,
            StoreAction::ProfilePatched {
                subject: id,
                update: ProfileUpdate {
                    name: Some("Renamed".into()),
                    ..Default::default()
                },
            },
        );
        assert_eq!(state.profile.unwrap().name, "Renamed");
    }

    #[test]
    fn patch_for_previous_subject_is_discarded() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut state = AuthSnapshot {
            session: Some(session(b)),
            profile: Some(profile(b)),
            resolving: false,
        };
        reduce(
            &mut state,
            StoreAction::ProfilePatched {
                subject: a,
                update: ProfileUpdate {
                    name: Some("Someone Else".into()),
                    ..Default::default()
                },
            },
        );
        assert_eq!(state.profile.unwrap().name, "Reader");
    }

    #[tokio::test]
    async fn subscribers_see_every_dispatch() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();

        store.dispatch(StoreAction::LoadFailed);
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().resolving);

        store.dispatch(StoreAction::BeginLoad);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().resolving);
    }
}
