//! The current session: token + user, replaced as a whole on every write.

use serde::{Deserialize, Serialize};

use crate::{Role, User};

/// Opaque bearer token.
///
/// `Debug` is redacted so sessions can be logged without leaking credentials.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// Session snapshot.
///
/// # Invariants
/// - `is_authenticated()` is true iff a token is present.
/// - A session is never mutated field-by-field once published; writers build
///   a new value and replace the old one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    token: Option<AuthToken>,
    user: Option<User>,
}

impl Session {
    /// The empty, signed-out session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session for a freshly authenticated user. The token is merged into
    /// the user profile.
    pub fn authenticated(token: AuthToken, mut user: User) -> Self {
        user.token = Some(token.clone());
        Self {
            token: Some(token),
            user: Some(user),
        }
    }

    /// Rebuild a session from independently persisted parts.
    pub fn from_parts(token: Option<AuthToken>, user: Option<User>) -> Self {
        Self { token, user }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn role(&self) -> Option<&Role> {
        self.user.as_ref().and_then(|u| u.role.as_ref())
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_admin)
    }
}
