//! Authenticated user profile.

use serde::{Deserialize, Serialize};

use certportal_core::UserId;

use crate::{AuthToken, Role, RoleKind};

/// A signed-in portal user.
///
/// `role` is issued by the backend and never changed client-side. `is_admin`
/// is an orthogonal flag: routing checks it before looking at the role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(default, alias = "is_admin")]
    pub is_admin: bool,

    #[serde(default, alias = "display_name", alias = "name")]
    pub display_name: String,

    /// Bearer token the profile was issued with (merged in at login).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<AuthToken>,
}

impl User {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            role: None,
            is_admin: false,
            display_name: display_name.into(),
            token: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<Role>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn role_kind(&self) -> Option<RoleKind> {
        self.role.as_ref().and_then(Role::kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_backend_profile_shapes() {
        let user: User = serde_json::from_str(
            r#"{"id": 12, "role": "Broker", "is_admin": false, "name": "Jane Broker"}"#,
        )
        .unwrap();

        assert_eq!(user.id.as_str(), "12");
        assert_eq!(user.role_kind(), Some(RoleKind::Broker));
        assert_eq!(user.display_name, "Jane Broker");
        assert!(user.token.is_none());
    }

    #[test]
    fn missing_flags_default_to_non_admin_without_role() {
        let user: User = serde_json::from_str(r#"{"id": "u1"}"#).unwrap();
        assert!(!user.is_admin);
        assert!(user.role.is_none());
        assert!(user.display_name.is_empty());
    }
}
