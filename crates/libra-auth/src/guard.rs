//! Route guard — decides, per navigation, whether a view may render.

use libra_core::models::role::{ClaimedRole, Role};

use crate::config::AuthConfig;
use crate::routes::{Access, AppRoute};
use crate::store::AuthSnapshot;

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Auth state is still resolving; show a placeholder.
    Loading,
    Render { role: ClaimedRole },
    /// `from` is the location the user tried to open, to return to after
    /// signing in.
    RedirectToLogin { to: String, from: String },
    RedirectToHome { to: String },
}

/// Effective role for `snapshot`: the session claim wins, then the
/// profile row, then `default_role`. A claim naming no known role still
/// wins, so it cannot be widened by the profile.
pub fn resolve_role(snapshot: &AuthSnapshot, default_role: Role) -> ClaimedRole {
    snapshot
        .session
        .as_ref()
        .and_then(|s| s.claimed_role())
        .or_else(|| snapshot.profile.as_ref().map(|p| p.role.into()))
        .unwrap_or(ClaimedRole::Known(default_role))
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
    home_path: String,
    default_role: Role,
}

impl RouteGuard {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            login_path: config.login_path.clone(),
            home_path: config.home_path.clone(),
            default_role: config.default_role,
        }
    }

    pub fn resolve_role(&self, snapshot: &AuthSnapshot) -> ClaimedRole {
        resolve_role(snapshot, self.default_role)
    }

    /// Role whose menu is shown; unrecognized claims get the default menu.
    pub fn menu_role(&self, snapshot: &AuthSnapshot) -> Role {
        self.resolve_role(snapshot)
            .known()
            .unwrap_or(self.default_role)
    }

    /// Check access to a protected view. `allowed_roles = None` admits any
    /// signed-in user.
    pub fn check(
        &self,
        snapshot: &AuthSnapshot,
        allowed_roles: Option<&[Role]>,
        location: &str,
    ) -> GuardDecision {
        if snapshot.resolving {
            return GuardDecision::Loading;
        }
        if snapshot.session.is_none() {
            return GuardDecision::RedirectToLogin {
                to: self.login_path.clone(),
                from: location.to_string(),
            };
        }

        let role = self.resolve_role(snapshot);
        match allowed_roles {
            Some(allowed) if !role.is_any_of(allowed) => GuardDecision::RedirectToHome {
                to: self.home_path.clone(),
            },
            _ => GuardDecision::Render { role },
        }
    }

    /// Check access to `location` using the application route table.
    /// Public routes render without consulting the session.
    pub fn check_location(&self, snapshot: &AuthSnapshot, location: &str) -> GuardDecision {
        match AppRoute::from_path(location).access() {
            Access::Public => GuardDecision::Render {
                role: self.resolve_role(snapshot),
            },
            Access::Authenticated => self.check(snapshot, None, location),
            Access::Roles(roles) => self.check(snapshot, Some(roles), location),
        }
    }
}
