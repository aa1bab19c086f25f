//! `certportal-auth`: pure session/authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: it models who is signed in,
//! where they land after login, and whether they may render a given route.

pub mod guard;
pub mod roles;
pub mod routes;
pub mod session;
pub mod user;

pub use guard::{GuardDecision, RouteRequirements, authorize};
pub use roles::{Role, RoleKind};
pub use routes::{RouteAccess, RouteTable, guard_fallback_path, resolve_dashboard_path};
pub use session::{AuthToken, Session};
pub use user::User;
