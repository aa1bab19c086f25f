//! Per-navigation route guard.
//!
//! - No IO
//! - No caching: callers evaluate against the session snapshot of the render
//!   in progress, so a logout between navigations revokes access at once.

use crate::routes::{ADMIN_DASHBOARD_PATH, LOGIN_PATH, UNAUTHORIZED_PATH, guard_fallback_path};
use crate::{Role, Session};

/// What a protected route declares about who may render it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRequirements {
    pub admin_only: bool,
    pub required_role: Option<Role>,
    /// On role mismatch, send the user to their own dashboard instead of the
    /// unauthorized page.
    pub fallback_to_dashboard: bool,
}

impl RouteRequirements {
    /// Any signed-in user.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn admin_only() -> Self {
        Self {
            admin_only: true,
            ..Self::default()
        }
    }

    pub fn role(role: impl Into<Role>) -> Self {
        Self {
            required_role: Some(role.into()),
            ..Self::default()
        }
    }

    pub fn with_fallback(mut self) -> Self {
        self.fallback_to_dashboard = true;
        self
    }
}

/// Outcome of a guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

/// Decide whether `session` may render a route with `route` requirements.
///
/// Rules, first match wins:
/// 1. no session → login;
/// 2. admin-only route, non-admin user → unauthorized;
/// 3. required role not satisfied → own dashboard (with fallback; admins go
///    to the admin dashboard) or unauthorized;
/// 4. allow.
pub fn authorize(session: &Session, route: &RouteRequirements) -> GuardDecision {
    if !session.is_authenticated() {
        return GuardDecision::Redirect(LOGIN_PATH);
    }

    if route.admin_only && !session.is_admin() {
        tracing::debug!("admin-only route denied");
        return GuardDecision::Redirect(UNAUTHORIZED_PATH);
    }

    if let Some(required) = &route.required_role {
        let role = session.role();
        let satisfied = role.is_some_and(|r| r.satisfies(required));
        if !satisfied {
            tracing::debug!(
                required = %required,
                actual = role.map(Role::as_str).unwrap_or("<none>"),
                fallback = route.fallback_to_dashboard,
                "role mismatch"
            );
            return if route.fallback_to_dashboard && session.is_admin() {
                GuardDecision::Redirect(ADMIN_DASHBOARD_PATH)
            } else if route.fallback_to_dashboard {
                GuardDecision::Redirect(guard_fallback_path(role))
            } else {
                GuardDecision::Redirect(UNAUTHORIZED_PATH)
            };
        }
    }

    GuardDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthToken, User};
    use certportal_core::UserId;
    use proptest::prelude::*;

    fn session(role: &'static str, is_admin: bool) -> Session {
        let user = User::new(UserId::new("u1").unwrap(), "Test User")
            .with_role(role)
            .with_admin(is_admin);
        Session::authenticated(AuthToken::new("token"), user)
    }

    #[test]
    fn unauthenticated_sessions_go_to_login() {
        let decision = authorize(&Session::anonymous(), &RouteRequirements::authenticated());
        assert_eq!(decision, GuardDecision::Redirect("/login"));
    }

    #[test]
    fn login_check_precedes_admin_check() {
        let decision = authorize(&Session::anonymous(), &RouteRequirements::admin_only());
        assert_eq!(decision, GuardDecision::Redirect("/login"));
    }

    #[test]
    fn non_admins_are_unauthorized_on_admin_routes() {
        let decision = authorize(&session("company", false), &RouteRequirements::admin_only());
        assert_eq!(decision, GuardDecision::Redirect("/unauthorized"));
    }

    #[test]
    fn admins_pass_admin_routes() {
        assert!(authorize(&session("company", true), &RouteRequirements::admin_only()).is_allowed());
    }

    #[test]
    fn role_mismatch_with_fallback_goes_to_own_dashboard() {
        let route = RouteRequirements::role("broker").with_fallback();
        let decision = authorize(&session("company", false), &route);
        assert_eq!(decision, GuardDecision::Redirect("/companies/dashboard"));
    }

    #[test]
    fn admin_fallback_goes_to_admin_dashboard() {
        let broker_route = RouteRequirements::role("broker").with_fallback();
        let company_route = RouteRequirements::role("company").with_fallback();

        let mut user = User::new(UserId::new("u2").unwrap(), "Root").with_admin(true);
        let no_role = Session::authenticated(AuthToken::new("token"), user.clone());
        assert_eq!(
            authorize(&no_role, &broker_route),
            GuardDecision::Redirect("/admin/dashboard")
        );

        user = user.with_role("broker");
        let broker_admin = Session::authenticated(AuthToken::new("token"), user);
        assert_eq!(
            authorize(&broker_admin, &company_route),
            GuardDecision::Redirect("/admin/dashboard")
        );
        assert!(authorize(&broker_admin, &broker_route).is_allowed());
    }

    #[test]
    fn aliased_role_falls_back_through_its_kind() {
        let route = RouteRequirements::role("broker").with_fallback();
        let decision = authorize(&session("companies", false), &route);
        assert_eq!(decision, GuardDecision::Redirect("/companies/dashboard"));
    }

    #[test]
    fn role_mismatch_without_fallback_is_unauthorized() {
        let route = RouteRequirements::role("broker");
        let decision = authorize(&session("company", false), &route);
        assert_eq!(decision, GuardDecision::Redirect("/unauthorized"));
    }

    #[test]
    fn insuredclient_falls_back_to_customer_dashboard() {
        let route = RouteRequirements::role("broker").with_fallback();
        let decision = authorize(&session("insuredclient", false), &route);
        assert_eq!(decision, GuardDecision::Redirect("/customer/dashboard"));
    }

    #[test]
    fn matching_role_is_allowed_case_insensitively() {
        let route = RouteRequirements::role("Broker");
        assert!(authorize(&session(" BROKER ", false), &route).is_allowed());
    }

    #[test]
    fn token_without_user_fails_role_checks() {
        let session = Session::from_parts(Some(AuthToken::new("t")), None);
        assert!(authorize(&session, &RouteRequirements::authenticated()).is_allowed());
        assert_eq!(
            authorize(&session, &RouteRequirements::role("broker").with_fallback()),
            GuardDecision::Redirect("/dashboard")
        );
    }

    fn any_role() -> impl Strategy<Value = Option<&'static str>> {
        prop::option::of(prop::sample::select(vec![
            "company", "broker", "client", "customer", "insuredclient", "admin", "auditor",
        ]))
    }

    proptest! {
        /// Property: an admin-only route never allows a non-admin, whatever
        /// the rest of the session or route looks like.
        #[test]
        fn admin_only_never_allows_non_admins(
            authenticated in any::<bool>(),
            role in any_role(),
            required in any_role(),
            fallback in any::<bool>(),
        ) {
            let session = if authenticated {
                let mut user = User::new(UserId::new("p").unwrap(), "p");
                user.role = role.map(Role::new);
                Session::authenticated(AuthToken::new("t"), user)
            } else {
                Session::anonymous()
            };
            let route = RouteRequirements {
                admin_only: true,
                required_role: required.map(Role::new),
                fallback_to_dashboard: fallback,
            };

            prop_assert_ne!(authorize(&session, &route), GuardDecision::Allow);
        }

        /// Property: authentication is exactly token presence.
        #[test]
        fn authenticated_iff_token_present(has_token in any::<bool>(), has_user in any::<bool>()) {
            let token = has_token.then(|| AuthToken::new("t"));
            let user = has_user.then(|| User::new(UserId::new("p").unwrap(), "p"));
            let session = Session::from_parts(token, user);
            prop_assert_eq!(session.is_authenticated(), has_token);
        }
    }
}
