//! Role → dashboard path resolution and the portal's protected route surface.
//!
//! Two role tables are in use and they do not agree:
//! - the landing table, used right after login;
//! - the guard fallback table, used when a signed-in user hits a route meant
//!   for another role.
//!
//! Both are defined here so there is exactly one place to reconcile them.

use crate::{Role, RouteRequirements, User};

pub const LOGIN_PATH: &str = "/login";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";
pub const ADMIN_DASHBOARD_PATH: &str = "/admin/dashboard";
pub const GENERIC_DASHBOARD_PATH: &str = "/dashboard";

/// Landing table consulted after login.
const LANDING_TABLE: &[(&str, &str)] = &[
    ("broker", "/brokers/dashboard"),
    ("customer", "/customer/dashboard"),
    ("company", "/company/dashboard"),
];

/// Fallback table consulted by the route guard. Unlike the landing table it
/// knows the `client`/`insuredclient` aliases and uses `/companies/...`.
const GUARD_FALLBACK_TABLE: &[(&str, &str)] = &[
    ("broker", "/brokers/dashboard"),
    ("company", "/companies/dashboard"),
    ("customer", "/customer/dashboard"),
    ("client", "/customer/dashboard"),
    ("insuredclient", "/customer/dashboard"),
    ("admin", ADMIN_DASHBOARD_PATH),
];

fn find(table: &[(&str, &'static str)], name: &str) -> Option<&'static str> {
    table.iter().find(|(key, _)| *key == name).map(|(_, path)| *path)
}

fn lookup(table: &[(&str, &'static str)], role: Option<&Role>) -> &'static str {
    role.and_then(|role| find(table, role.as_str()))
        .unwrap_or(GENERIC_DASHBOARD_PATH)
}

/// Where a user lands right after login.
///
/// Admin always wins over role, even when a role is also set.
pub fn resolve_dashboard_path(user: &User) -> &'static str {
    if user.is_admin {
        return ADMIN_DASHBOARD_PATH;
    }
    lookup(LANDING_TABLE, user.role.as_ref())
}

/// The user's own dashboard, as the route guard sees it.
///
/// Aliases resolve through their [`RoleKind`](crate::RoleKind) first, so
/// `companies` lands where `company` does. The admin flag is not consulted
/// here; the guard checks it before calling this.
pub fn guard_fallback_path(role: Option<&Role>) -> &'static str {
    role.and_then(Role::kind)
        .and_then(|kind| find(GUARD_FALLBACK_TABLE, kind.as_str()))
        .unwrap_or_else(|| lookup(GUARD_FALLBACK_TABLE, role))
}

/// How a path may be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    /// Rendered without a session (login, unauthorized, root).
    Public,
    /// Guarded by the given requirements.
    Protected(RouteRequirements),
}

/// Path-prefix → access table for the portal.
///
/// Prefixes match on whole path segments (`/company` does not match
/// `/companies`). The longest matching prefix wins; unknown paths require an
/// authenticated session.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<(String, RouteAccess)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn with(mut self, prefix: impl Into<String>, access: RouteAccess) -> Self {
        self.entries.push((prefix.into(), access));
        self
    }

    /// The routes the portal actually serves.
    pub fn portal() -> Self {
        Self::new()
            .with("/", RouteAccess::Public)
            .with(LOGIN_PATH, RouteAccess::Public)
            .with(UNAUTHORIZED_PATH, RouteAccess::Public)
            .with("/admin", RouteAccess::Protected(RouteRequirements::admin_only()))
            .with(
                "/brokers",
                RouteAccess::Protected(RouteRequirements::role("broker").with_fallback()),
            )
            .with(
                "/company",
                RouteAccess::Protected(RouteRequirements::role("company").with_fallback()),
            )
            .with(
                "/companies",
                RouteAccess::Protected(RouteRequirements::role("company").with_fallback()),
            )
            .with(
                "/customer",
                RouteAccess::Protected(RouteRequirements::role("client").with_fallback()),
            )
            .with(
                GENERIC_DASHBOARD_PATH,
                RouteAccess::Protected(RouteRequirements::authenticated()),
            )
            .with(
                "/certificates",
                RouteAccess::Protected(RouteRequirements::authenticated()),
            )
            .with(
                "/settings",
                RouteAccess::Protected(RouteRequirements::authenticated()),
            )
    }

    pub fn access(&self, path: &str) -> RouteAccess {
        let path = normalize_path(path);
        self.entries
            .iter()
            .filter(|(prefix, _)| prefix_matches(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, access)| access.clone())
            .unwrap_or_else(|| RouteAccess::Protected(RouteRequirements::authenticated()))
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::portal()
    }
}

fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path == "/";
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
