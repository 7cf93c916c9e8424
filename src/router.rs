//! Top-level view selection from the request path and the session snapshot.

use tokio::sync::watch;

use crate::session::{Session, SessionStatus};
use crate::types::Role;

const ADMIN_PREFIX: &str = "/admin";

/// The five top-level screens of the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Loading,
    ClientLogin,
    AdminLogin,
    ClientPortal,
    AdminDashboard,
}

impl View {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::ClientLogin => "client-login",
            Self::AdminLogin => "admin-login",
            Self::ClientPortal => "client-portal",
            Self::AdminDashboard => "admin-dashboard",
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `path` belongs to the agency side of the portal.
///
/// Any path beginning with `/admin` does.
#[must_use]
pub fn is_admin_path(path: &str) -> bool {
    path.starts_with(ADMIN_PREFIX)
}

/// Select the view for `path` under `session`.
///
/// `Loading` wins regardless of path. Otherwise the path picks the area and
/// the role must match it exactly; any other role (or none) gets that area's
/// login screen.
#[must_use]
pub fn route(path: &str, session: &Session) -> View {
    if session.status() == SessionStatus::Loading {
        return View::Loading;
    }

    match (is_admin_path(path), session.role()) {
        (true, Some(Role::Admin)) => View::AdminDashboard,
        (true, _) => View::AdminLogin,
        (false, Some(Role::Client)) => View::ClientPortal,
        (false, _) => View::ClientLogin,
    }
}

/// Keeps the selected view in step with session changes and navigation.
pub struct ViewRouter {
    session: watch::Receiver<Session>,
    path: String,
}

impl ViewRouter {
    #[must_use]
    pub fn new(session: watch::Receiver<Session>, path: impl Into<String>) -> Self {
        Self {
            session,
            path: path.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// View for the current path and the latest session snapshot.
    #[must_use]
    pub fn current(&self) -> View {
        route(&self.path, &self.session.borrow())
    }

    /// Move to another path and return the view it resolves to.
    pub fn navigate(&mut self, path: impl Into<String>) -> View {
        self.path = path.into();
        let view = self.current();
        tracing::debug!(path = %self.path, view = %view, "Navigated");
        view
    }

    /// Wait for the next session change and return the re-evaluated view.
    ///
    /// Returns `None` once the session manager is gone.
    pub async fn changed(&mut self) -> Option<View> {
        self.session.changed().await.ok()?;
        let view = route(&self.path, &self.session.borrow_and_update());
        Some(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Credentials;
    use crate::types::UserProfile;

    fn signed_in(role: Role) -> Session {
        Session::authenticated(
            Credentials {
                token: "t".into(),
                role,
            },
            UserProfile::new().with_name("someone"),
        )
    }

    #[test]
    fn loading_wins_on_every_path() {
        for path in ["/", "/admin", "/admin/clients", "/materials"] {
            assert_eq!(route(path, &Session::loading()), View::Loading);
        }
    }

    #[test]
    fn anonymous_admin_path_is_admin_login() {
        assert_eq!(route("/admin", &Session::anonymous()), View::AdminLogin);
        assert_eq!(route("/admin/campaigns", &Session::anonymous()), View::AdminLogin);
    }

    #[test]
    fn client_role_on_admin_path_is_admin_login() {
        assert_eq!(route("/admin", &signed_in(Role::Client)), View::AdminLogin);
    }

    #[test]
    fn admin_role_on_client_path_is_client_login() {
        assert_eq!(route("/", &signed_in(Role::Admin)), View::ClientLogin);
    }

    #[test]
    fn matching_roles_reach_their_area() {
        assert_eq!(route("/admin", &signed_in(Role::Admin)), View::AdminDashboard);
        assert_eq!(route("/", &signed_in(Role::Client)), View::ClientPortal);
        assert_eq!(route("/calendar", &signed_in(Role::Client)), View::ClientPortal);
    }

    #[test]
    fn anonymous_client_path_is_client_login() {
        assert_eq!(route("/", &Session::anonymous()), View::ClientLogin);
        assert_eq!(route("", &Session::anonymous()), View::ClientLogin);
    }

    #[test]
    fn admin_prefix_is_a_plain_prefix() {
        assert!(is_admin_path("/admin"));
        assert!(is_admin_path("/admin/"));
        assert!(is_admin_path("/administration"));
        assert!(!is_admin_path("/"));
        assert!(!is_admin_path("/portal/admin"));
    }

    #[test]
    fn navigate_re_evaluates() {
        let (_tx, rx) = watch::channel(signed_in(Role::Client));
        let mut router = ViewRouter::new(rx, "/");
        assert_eq!(router.current(), View::ClientPortal);

        assert_eq!(router.navigate("/admin"), View::AdminLogin);
        assert_eq!(router.path(), "/admin");
    }

    #[tokio::test]
    async fn session_changes_re_evaluate() {
        let (tx, rx) = watch::channel(Session::loading());
        let mut router = ViewRouter::new(rx, "/admin");
        assert_eq!(router.current(), View::Loading);

        tx.send_replace(Session::anonymous());
        assert_eq!(router.changed().await, Some(View::AdminLogin));

        tx.send_replace(signed_in(Role::Admin));
        assert_eq!(router.changed().await, Some(View::AdminDashboard));

        drop(tx);
        assert_eq!(router.changed().await, None);
    }
}
