//! Application route table, side-menu entries and auth-event navigation.

use libra_core::models::event::AuthEventKind;
use libra_core::models::role::Role;

use crate::config::AuthConfig;

const LIBRARIAN_ONLY: &[Role] = &[Role::Librarian];
const STUDENT_ONLY: &[Role] = &[Role::Student];

/// Who may open a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Any signed-in user.
    Authenticated,
    Roles(&'static [Role]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppRoute {
    Login,
    ResetPassword,
    Home,
    Profile,
    BrowseBooks,
    BorrowingHistory,
    ManageBooks,
    ManageRequests,
    FineRules,
    Report,
}

impl AppRoute {
    pub const ALL: [AppRoute; 10] = [
        AppRoute::Login,
        AppRoute::ResetPassword,
        AppRoute::Home,
        AppRoute::Profile,
        AppRoute::BrowseBooks,
        AppRoute::BorrowingHistory,
        AppRoute::ManageBooks,
        AppRoute::ManageRequests,
        AppRoute::FineRules,
        AppRoute::Report,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            AppRoute::Login => "/auth/login",
            AppRoute::ResetPassword => "/auth/reset-password",
            AppRoute::Home => "/",
            AppRoute::Profile => "/profile",
            AppRoute::BrowseBooks => "/browse-books",
            AppRoute::BorrowingHistory => "/borrowing-history",
            AppRoute::ManageBooks => "/manage-books",
            AppRoute::ManageRequests => "/manage-requests",
            AppRoute::FineRules => "/fine-rules",
            AppRoute::Report => "/report",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AppRoute::Login => "Login",
            AppRoute::ResetPassword => "Reset Password",
            AppRoute::Home => "Home",
            AppRoute::Profile => "Profile",
            AppRoute::BrowseBooks => "Browse Books",
            AppRoute::BorrowingHistory => "My Borrows",
            AppRoute::ManageBooks => "Manage Books",
            AppRoute::ManageRequests => "Manage Requests",
            AppRoute::FineRules => "Fine Rules",
            AppRoute::Report => "Reports",
        }
    }

    pub fn access(&self) -> Access {
        match self {
            AppRoute::Login | AppRoute::ResetPassword => Access::Public,
            AppRoute::Home | AppRoute::Profile => Access::Authenticated,
            AppRoute::BrowseBooks | AppRoute::BorrowingHistory => Access::Roles(STUDENT_ONLY),
            AppRoute::ManageBooks
            | AppRoute::ManageRequests
            | AppRoute::FineRules
            | AppRoute::Report => Access::Roles(LIBRARIAN_ONLY),
        }
    }

    /// Resolve a location to a route. Query strings and trailing slashes
    /// are ignored; anything unknown falls back to home.
    pub fn from_path(location: &str) -> AppRoute {
        let path = location.split(['?', '#']).next().unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        // `/login` is kept as an alias of the login page.
        if path == "/login" {
            return AppRoute::Login;
        }
        Self::ALL
            .into_iter()
            .find(|route| route.path() == path)
            .unwrap_or(AppRoute::Home)
    }
}

/// Side-menu entries shown to `role`, in display order.
pub fn menu_for(role: Role) -> Vec<AppRoute> {
    let mut items = vec![AppRoute::Home];
    match role {
        Role::Librarian => items.extend([
            AppRoute::ManageBooks,
            AppRoute::ManageRequests,
            AppRoute::FineRules,
            AppRoute::Report,
        ]),
        Role::Student => items.extend([AppRoute::BrowseBooks, AppRoute::BorrowingHistory]),
    }
    items.push(AppRoute::Profile);
    items
}

/// Navigation triggered by an auth event while the user is on
/// `current_path`. `None` means stay put.
pub fn redirect_for_event(
    kind: AuthEventKind,
    current_path: &str,
    config: &AuthConfig,
) -> Option<String> {
    match kind {
        AuthEventKind::SignedIn if current_path != config.home_path => {
            Some(config.home_path.clone())
        }
        AuthEventKind::SignedOut if current_path != config.login_path => {
            Some(config.login_path.clone())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_round_trip_through_lookup() {
        for route in AppRoute::ALL {
            assert_eq!(AppRoute::from_path(route.path()), route);
        }
    }

    #[test]
    fn lookup_normalizes_locations() {
        assert_eq!(AppRoute::from_path("/report/"), AppRoute::Report);
        assert_eq!(AppRoute::from_path("/report?year=2024"), AppRoute::Report);
        assert_eq!(AppRoute::from_path("/login"), AppRoute::Login);
        assert_eq!(AppRoute::from_path(""), AppRoute::Home);
        assert_eq!(AppRoute::from_path("/no-such-page"), AppRoute::Home);
    }

    #[test]
    fn librarian_menu() {
        assert_eq!(
            menu_for(Role::Librarian),
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

    #[test]
    fn student_menu_has_no_librarian_pages() {
        let menu = menu_for(Role::Student);
        assert!(menu.contains(&AppRoute::BrowseBooks));
        assert!(
            menu.iter()
                .all(|r| r.access() != Access::Roles(LIBRARIAN_ONLY))
        );
    }

    #[test]
    fn event_navigation() {
        let config = AuthConfig::default();
        assert_eq!(
            redirect_for_event(AuthEventKind::SignedIn, "/auth/login", &config).as_deref(),
            Some("/")
        );
        assert_eq!(redirect_for_event(AuthEventKind::SignedIn, "/", &config), None);
        assert_eq!(
            redirect_for_event(AuthEventKind::SignedOut, "/report", &config).as_deref(),
            Some("/auth/login")
        );
        assert_eq!(
            redirect_for_event(AuthEventKind::TokenRefreshed, "/report", &config),
            None
        );
    }
}
