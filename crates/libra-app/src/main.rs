//! Libra — headless client entry point.
//!
//! Connects to a Supabase project, keeps the auth state synchronized and
//! logs what a router would do with it until interrupted.

mod config;

use std::process::ExitCode;
use std::sync::Arc;

use libra_auth::routes::{menu_for, redirect_for_event};
use libra_auth::{AuthError, AuthSnapshot, AuthSynchronizer, RouteGuard};
use libra_backend::{BackendError, SupabaseClient};
use libra_core::backend::AuthBackend;
use libra_core::error::LibraError;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, ConfigError, StartupLogin};

#[derive(Debug, Error)]
enum AppError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("backend: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Libra(#[from] LibraError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("libra=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();

    info!("Starting Libra client...");
    match run().await {
        Ok(()) => {
            info!("Libra client stopped.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Libra client failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let client = Arc::new(SupabaseClient::new(config.supabase.clone())?);

    match &config.login {
        Some(StartupLogin::Password { email, password }) => {
            client.sign_in_with_password(email, password).await?;
        }
        Some(StartupLogin::RefreshToken(token)) => {
            client.recover_session(token).await?;
        }
        None => {}
    }

    let mut sync = AuthSynchronizer::start(
        Arc::clone(&client),
        Arc::clone(&client),
        config.auth.clone(),
    );
    let guard = RouteGuard::new(sync.config());
    sync.wait_until_resolved().await?;

    let mut location = config.location.clone();
    let mut snapshots = sync.subscribe();
    let mut events = client.subscribe();
    log_snapshot(&guard, &sync.snapshot(), &location);

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("session store closed");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                log_snapshot(&guard, &snapshot, &location);
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(target) = redirect_for_event(event.kind, &location, sync.config()) {
                        info!(event = %event.kind, from = %location, to = %target, "navigating");
                        location = target;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed auth events"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                break;
            }
        }
    }

    sync.shutdown().await;
    Ok(())
}

fn log_snapshot(guard: &RouteGuard, snapshot: &AuthSnapshot, location: &str) {
    let role = guard.resolve_role(snapshot);
    let menu: Vec<&str> = menu_for(guard.menu_role(snapshot))
        .iter()
        .map(|route| route.label())
        .collect();
    info!(
        signed_in = snapshot.is_authenticated(),
        resolving = snapshot.resolving,
        user_id = ?snapshot.subject(),
        profile = snapshot.profile.as_ref().map(|p| p.name.as_str()),
        %role,
        ?menu,
        location,
        decision = ?guard.check_location(snapshot, location),
        "auth state"
    );
}
