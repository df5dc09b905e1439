//! Libra Auth — client-side session store, auth state synchronization,
//! route gating and form validation.

pub mod config;
pub mod error;
pub mod guard;
pub mod profile;
pub mod routes;
pub mod store;
pub mod sync;
pub mod validation;

pub use config::AuthConfig;
pub use error::AuthError;
pub use guard::{GuardDecision, RouteGuard};
pub use profile::ProfileFetcher;
pub use routes::AppRoute;
pub use store::{AuthSnapshot, SessionStore};
pub use sync::{AuthSynchronizer, SyncPhase, Visibility};
