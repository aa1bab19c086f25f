//! Shared handles passed to every shell and editor.

use std::sync::Arc;

use anyhow::Context;

use certportal_auth::{AuthToken, RouteTable, Session};

use crate::api::{ApiError, HttpPortalApi, PortalApi};
use crate::authenticator::Authenticator;
use crate::config::PortalConfig;
use crate::credentials::{CredentialStore, SessionReader};
use crate::navigator::Navigator;
use crate::storage::{CredentialStorage, SqliteStorage, StorageError};

/// Backend API plus the authenticator that owns the session.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct PortalContext {
    api: Arc<dyn PortalApi>,
    auth: Arc<Authenticator>,
}

impl PortalContext {
    /// Production wiring: HTTP backend, SQLite credential storage under the
    /// configured data directory.
    pub async fn from_config(config: &PortalConfig) -> anyhow::Result<Self> {
        let api = HttpPortalApi::new(&config.api_url, config.request_timeout)
            .context("failed to build HTTP client")?;
        let storage = SqliteStorage::at(config.credentials_path());
        Self::with_parts(Arc::new(api), Arc::new(storage))
            .await
            .context("failed to load stored credentials")
    }

    pub async fn with_parts(
        api: Arc<dyn PortalApi>,
        storage: Arc<dyn CredentialStorage>,
    ) -> Result<Self, StorageError> {
        let credentials = CredentialStore::rehydrate(storage).await?;
        let auth = Arc::new(Authenticator::new(api.clone(), credentials));
        Ok(Self { api, auth })
    }

    pub fn api(&self) -> &Arc<dyn PortalApi> {
        &self.api
    }

    pub fn auth(&self) -> &Authenticator {
        &self.auth
    }

    pub fn session(&self) -> SessionReader {
        self.auth.session()
    }

    pub fn current(&self) -> Arc<Session> {
        self.auth.current()
    }

    pub fn navigator(&self) -> Navigator {
        Navigator::new(self.session(), RouteTable::portal())
    }

    pub(crate) fn token(&self) -> Option<AuthToken> {
        self.current().token().cloned()
    }

    /// Expire the session if `err` is a 401 for `token`. Returns whether it
    /// was a 401; a session that has since moved to another token survives.
    pub(crate) async fn expire_on_unauthorized(
        &self,
        token: &AuthToken,
        err: &ApiError,
        during: &str,
    ) -> bool {
        if err.is_unauthorized() {
            self.auth
                .expire_session(token, &format!("backend rejected token during {during}"))
                .await;
            true
        } else {
            false
        }
    }
}

impl core::fmt::Debug for PortalContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PortalContext")
            .field("session", &self.current())
            .finish_non_exhaustive()
    }
}
