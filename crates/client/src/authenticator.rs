//! Login, logout, password change and session expiry.
//!
//! The authenticator is the only writer of the [`CredentialStore`].

use std::sync::Arc;

use thiserror::Error;

use certportal_auth::{AuthToken, Session, User};

use crate::api::{ApiError, PortalApi};
use crate::credentials::{CredentialStore, SessionReader};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("username and password are required")]
    MissingCredentials,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("cannot reach the server: {0}")]
    Unreachable(String),

    #[error("login failed: {0}")]
    Rejected(String),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("current and new password are required")]
    MissingPassword,

    #[error("failed to update password")]
    PasswordUpdateFailed,
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => AuthError::InvalidCredentials,
            ApiError::Network(msg) => AuthError::Unreachable(msg),
            ApiError::Api { status: 403, .. } => AuthError::InvalidCredentials,
            ApiError::Api { message, .. } => AuthError::Rejected(message),
            ApiError::Parse(msg) => AuthError::Rejected(format!("unexpected response ({msg})")),
        }
    }
}

pub struct Authenticator {
    api: Arc<dyn PortalApi>,
    credentials: CredentialStore,
}

impl Authenticator {
    pub fn new(api: Arc<dyn PortalApi>, credentials: CredentialStore) -> Self {
        Self { api, credentials }
    }

    pub fn session(&self) -> SessionReader {
        self.credentials.reader()
    }

    pub fn current(&self) -> Arc<Session> {
        self.credentials.snapshot()
    }

    /// Exchange credentials for a token and persist the resulting session.
    ///
    /// On failure the current session is left as it was.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.trim().is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let resp = self.api.login(username, password).await.map_err(|err| {
            tracing::warn!(username, error = %err, "login failed");
            AuthError::from(err)
        })?;

        let mut user = resp.user;
        if user.role.is_none() {
            user.role = resp.role;
        }

        let session = Session::authenticated(resp.token, user);
        let user = session.user().cloned().ok_or(AuthError::NotAuthenticated)?;

        if let Err(err) = self.credentials.store(session).await {
            // Signed in for this process; the next start asks again.
            tracing::warn!(error = %err, "failed to persist session");
        }

        tracing::info!(
            user_id = %user.id,
            role = user.role.as_ref().map(|r| r.as_str()).unwrap_or("<none>"),
            is_admin = user.is_admin,
            "logged in"
        );
        Ok(user)
    }

    /// Drop the session. Safe to call any number of times.
    pub async fn logout(&self) {
        let was_authenticated = self.current().is_authenticated();
        if let Err(err) = self.credentials.clear().await {
            tracing::warn!(error = %err, "failed to wipe stored credentials");
        }
        if was_authenticated {
            tracing::info!("logged out");
        }
    }

    /// Clear the session after the backend rejected its token.
    pub async fn expire_session(&self, rejected: &AuthToken, reason: &str) {
        match self.credentials.clear_if_current(rejected).await {
            Ok(true) => tracing::info!(reason, "session expired"),
            Ok(false) => tracing::debug!(reason, "ignoring rejection of a superseded token"),
            Err(err) => {
                tracing::info!(reason, "session expired");
                tracing::warn!(error = %err, "failed to wipe stored credentials");
            }
        }
    }

    /// Change the signed-in user's password.
    ///
    /// Backend detail is logged at debug level; callers only ever see
    /// [`AuthError::PasswordUpdateFailed`].
    pub async fn update_password(&self, old: &str, new: &str) -> Result<(), AuthError> {
        let session = self.current();
        let token = session.token().ok_or(AuthError::NotAuthenticated)?;
        if old.is_empty() || new.is_empty() {
            return Err(AuthError::MissingPassword);
        }

        match self.api.change_password(token, old, new).await {
            Ok(rotated) => {
                if let Some(token) = rotated {
                    self.rotate_token(&session, token).await;
                }
                tracing::info!("password updated");
                Ok(())
            }
            Err(ApiError::Unauthorized) => {
                self.expire_session(token, "password change rejected the token")
                    .await;
                Err(AuthError::PasswordUpdateFailed)
            }
            Err(err) => {
                tracing::debug!(error = %err, "password update failed");
                Err(AuthError::PasswordUpdateFailed)
            }
        }
    }

    async fn rotate_token(&self, session: &Session, token: AuthToken) {
        let next = match session.user() {
            Some(user) => Session::authenticated(token, user.clone()),
            None => Session::from_parts(Some(token), None),
        };
        if let Err(err) = self.credentials.store(next).await {
            tracing::warn!(error = %err, "failed to persist rotated token");
        }
    }
}
