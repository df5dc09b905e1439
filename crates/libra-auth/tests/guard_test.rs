//! End-to-end route guard scenarios: synchronizer + in-memory backend +
//! guard, checked the way a router would on each navigation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use libra_auth::routes::menu_for;
use libra_auth::{AppRoute, AuthConfig, AuthSnapshot, AuthSynchronizer, GuardDecision, RouteGuard};
use libra_backend::MemoryBackend;
use libra_core::models::event::AuthEvent;
use libra_core::models::profile::Profile;
use libra_core::models::role::{ClaimedRole, Role};
use libra_core::models::session::SessionUser;
use serde_json::json;

type Synchronizer = AuthSynchronizer<MemoryBackend, MemoryBackend>;

async fn user_with(
    backend: &MemoryBackend,
    claim: Option<Role>,
    profile_role: Option<Role>,
) -> SessionUser {
    let metadata = match claim {
        Some(role) => json!({ "role": role }),
        None => json!({}),
    };
    user_with_metadata(backend, metadata, profile_role).await
}

async fn user_with_metadata(
    backend: &MemoryBackend,
    metadata: serde_json::Value,
    profile_role: Option<Role>,
) -> SessionUser {
    let user = backend
        .register("member@example.com", "s3cret-pass", metadata)
        .await;
    if let Some(role) = profile_role {
        let now = Utc::now();
        backend
            .insert_profile(Profile {
                id: user.id,
                name: "Member".into(),
                email: "member@example.com".into(),
                phone: None,
                role,
                created_at: now,
                updated_at: now,
            })
            .await;
    }
    backend
        .set_current_session(Some(MemoryBackend::issue_session(&user)))
        .await;
    user
}

fn start(backend: &Arc<MemoryBackend>) -> (Synchronizer, RouteGuard) {
    let config = AuthConfig::default();
    let guard = RouteGuard::new(&config);
    let sync = AuthSynchronizer::start(Arc::clone(backend), Arc::clone(backend), config);
    (sync, guard)
}

async fn wait_for(
    sync: &Synchronizer,
    predicate: impl FnMut(&AuthSnapshot) -> bool,
) -> AuthSnapshot {
    let mut rx = sync.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("store did not reach expected state")
        .expect("store closed");
    AuthSnapshot::clone(&snapshot)
}

#[tokio::test(start_paused = true)]
async fn loading_until_initial_load_finishes() {
    let backend = Arc::new(MemoryBackend::new());
    user_with(&backend, None, Some(Role::Student)).await;
    backend.set_session_delay(Duration::from_millis(300)).await;
    let (sync, guard) = start(&backend);

    assert_eq!(
        guard.check(&sync.snapshot(), None, "/profile"),
        GuardDecision::Loading
    );

    sync.wait_until_resolved().await.unwrap();
    assert_eq!(
        guard.check(&sync.snapshot(), None, "/profile"),
        GuardDecision::Render {
            role: ClaimedRole::Known(Role::Student)
        }
    );
}

#[tokio::test]
async fn no_session_redirects_to_login_with_origin() {
    let backend = Arc::new(MemoryBackend::new());
    let (sync, guard) = start(&backend);
    sync.wait_until_resolved().await.unwrap();

    assert_eq!(
        guard.check_location(&sync.snapshot(), "/borrowing-history"),
        GuardDecision::RedirectToLogin {
            to: "/auth/login".into(),
            from: "/borrowing-history".into(),
        }
    );
    // Public pages stay reachable.
    assert!(matches!(
        guard.check_location(&sync.snapshot(), "/auth/reset-password"),
        GuardDecision::Render { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn librarian_claim_survives_profile_timeout() {
    let backend = Arc::new(MemoryBackend::new());
    user_with(&backend, Some(Role::Librarian), Some(Role::Librarian)).await;
    backend.set_profile_delay(Duration::from_secs(30)).await;
    let (sync, guard) = start(&backend);

    sync.wait_until_resolved().await.unwrap();
    let snap = sync.snapshot();

    assert!(snap.profile.is_none());
    assert_eq!(
        guard.check(&snap, Some(&[Role::Librarian][..]), "/manage-books"),
        GuardDecision::Render {
            role: ClaimedRole::Known(Role::Librarian)
        }
    );
    assert_eq!(
        menu_for(guard.menu_role(&snap)),
        vec![
            AppRoute::Home,
            AppRoute::ManageBooks,
            AppRoute::ManageRequests,
            AppRoute::FineRules,
            AppRoute::Report,
            AppRoute::Profile,
        ]
    );
}

#[tokio::test]
async fn profile_role_applies_without_claim() {
    let backend = Arc::new(MemoryBackend::new());
    user_with(&backend, None, Some(Role::Librarian)).await;
    let (sync, guard) = start(&backend);
    sync.wait_until_resolved().await.unwrap();

    assert_eq!(
        guard.check_location(&sync.snapshot(), "/fine-rules"),
        GuardDecision::Render {
            role: ClaimedRole::Known(Role::Librarian)
        }
    );
}

#[tokio::test]
async fn student_is_sent_home_from_librarian_pages() {
    let backend = Arc::new(MemoryBackend::new());
    user_with(&backend, Some(Role::Student), Some(Role::Student)).await;
    let (sync, guard) = start(&backend);
    sync.wait_until_resolved().await.unwrap();

    assert_eq!(
        guard.check_location(&sync.snapshot(), "/report"),
        GuardDecision::RedirectToHome { to: "/".into() }
    );
    assert_eq!(
        guard.check_location(&sync.snapshot(), "/browse-books"),
        GuardDecision::Render {
            role: ClaimedRole::Known(Role::Student)
        }
    );
}

#[tokio::test]
async fn unrecognized_claim_is_refused_despite_librarian_row() {
    let backend = Arc::new(MemoryBackend::new());
    user_with_metadata(
        &backend,
        json!({ "role": "librarian_pending" }),
        Some(Role::Librarian),
    )
    .await;
    let (sync, guard) = start(&backend);
    sync.wait_until_resolved().await.unwrap();

    let snap = sync.snapshot();
    assert_eq!(snap.profile.as_ref().map(|p| p.role), Some(Role::Librarian));
    assert_eq!(
        guard.check(&snap, Some(&[Role::Librarian][..]), "/report"),
        GuardDecision::RedirectToHome { to: "/".into() }
    );
    assert_eq!(
        guard.check_location(&snap, "/manage-books"),
        GuardDecision::RedirectToHome { to: "/".into() }
    );
    assert!(matches!(
        guard.check_location(&snap, "/profile"),
        GuardDecision::Render { .. }
    ));
}

#[tokio::test]
async fn missing_claim_and_profile_defaults_to_student() {
    let backend = Arc::new(MemoryBackend::new());
    user_with(&backend, None, None).await;
    let (sync, guard) = start(&backend);
    sync.wait_until_resolved().await.unwrap();

    let snap = sync.snapshot();
    assert!(snap.session.is_some());
    assert_eq!(guard.resolve_role(&snap), ClaimedRole::Known(Role::Student));
    assert_eq!(
        guard.check(&snap, Some(&[Role::Librarian][..]), "/manage-requests"),
        GuardDecision::RedirectToHome { to: "/".into() }
    );
}

#[tokio::test]
async fn sign_out_event_redirects_next_check() {
    let backend = Arc::new(MemoryBackend::new());
    user_with(&backend, Some(Role::Student), Some(Role::Student)).await;
    let (sync, guard) = start(&backend);
    sync.wait_until_resolved().await.unwrap();
    assert!(matches!(
        guard.check_location(&sync.snapshot(), "/profile"),
        GuardDecision::Render { .. }
    ));

    backend.emit(AuthEvent::signed_out());
    let snap = wait_for(&sync, |s| s.session.is_none()).await;

    assert_eq!(
        guard.check_location(&snap, "/profile"),
        GuardDecision::RedirectToLogin {
            to: "/auth/login".into(),
            from: "/profile".into(),
        }
    );
}
