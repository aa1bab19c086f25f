//! Path-level navigation through the route guard.

use certportal_auth::{
    GuardDecision, RouteAccess, RouteRequirements, RouteTable, authorize, resolve_dashboard_path,
    routes::{GENERIC_DASHBOARD_PATH, LOGIN_PATH},
};

use crate::credentials::SessionReader;

/// Evaluates every navigation against a fresh session snapshot.
#[derive(Debug, Clone)]
pub struct Navigator {
    session: SessionReader,
    routes: RouteTable,
}

impl Navigator {
    pub fn new(session: SessionReader, routes: RouteTable) -> Self {
        Self { session, routes }
    }

    /// Decide what happens when the user navigates to `path`.
    pub fn visit(&self, path: &str) -> GuardDecision {
        match self.routes.access(path) {
            RouteAccess::Public => GuardDecision::Allow,
            RouteAccess::Protected(requirements) => self.check(&requirements),
        }
    }

    pub fn check(&self, requirements: &RouteRequirements) -> GuardDecision {
        let decision = authorize(&self.session.snapshot(), requirements);
        if let GuardDecision::Redirect(to) = &decision {
            tracing::debug!(to, "navigation redirected");
        }
        decision
    }

    /// Where the current user should land: their dashboard, or the login page.
    pub fn landing_path(&self) -> &'static str {
        let session = self.session.snapshot();
        if !session.is_authenticated() {
            return LOGIN_PATH;
        }
        session
            .user()
            .map(resolve_dashboard_path)
            .unwrap_or(GENERIC_DASHBOARD_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use certportal_auth::{AuthToken, Session, User};
    use certportal_core::UserId;

    use crate::authenticator::Authenticator;
    use crate::credentials::CredentialStore;
    use crate::memory::MemoryPortalApi;
    use crate::storage::MemoryStorage;

    async fn signed_in(role: &'static str, is_admin: bool) -> (Authenticator, Navigator) {
        let api = MemoryPortalApi::new().with_account(
            "user",
            "pw",
            User::new(UserId::new("5").unwrap(), "User")
                .with_role(role)
                .with_admin(is_admin),
        );
        let store = CredentialStore::rehydrate(Arc::new(MemoryStorage::new()))
            .await
            .unwrap();
        let auth = Authenticator::new(Arc::new(api), store);
        auth.login("user", "pw").await.unwrap();
        let nav = Navigator::new(auth.session(), RouteTable::portal());
        (auth, nav)
    }

    #[tokio::test]
    async fn company_on_broker_route_falls_back_to_companies_dashboard() {
        let (_auth, nav) = signed_in("company", false).await;
        assert_eq!(
            nav.visit("/brokers/dashboard"),
            GuardDecision::Redirect("/companies/dashboard")
        );
        assert_eq!(nav.landing_path(), "/company/dashboard");
    }

    #[tokio::test]
    async fn broker_on_admin_route_is_unauthorized() {
        let (_auth, nav) = signed_in("broker", false).await;
        assert_eq!(
            nav.visit("/admin/dashboard"),
            GuardDecision::Redirect("/unauthorized")
        );
        assert!(nav.visit("/brokers/dashboard").is_allowed());
    }

    #[tokio::test]
    async fn logout_revokes_access_on_next_navigation() {
        let (auth, nav) = signed_in("broker", false).await;
        assert!(nav.visit("/certificates").is_allowed());

        auth.logout().await;

        assert_eq!(nav.visit("/certificates"), GuardDecision::Redirect("/login"));
        assert!(nav.visit("/login").is_allowed());
        assert_eq!(nav.landing_path(), "/login");
    }

    #[tokio::test]
    async fn token_without_profile_lands_on_generic_dashboard() {
        let api = Arc::new(MemoryPortalApi::new());
        let storage = Arc::new(MemoryStorage::new());
        let store = CredentialStore::rehydrate(storage).await.unwrap();
        store
            .store(Session::from_parts(Some(AuthToken::new("t")), None))
            .await
            .unwrap();
        let auth = Authenticator::new(api, store);
        let nav = Navigator::new(auth.session(), RouteTable::portal());

        assert_eq!(nav.landing_path(), "/dashboard");
    }
}
