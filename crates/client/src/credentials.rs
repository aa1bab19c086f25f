//! Single-writer session store.
//!
//! The [`CredentialStore`] owns the session. Every write builds a fresh
//! [`Session`] and publishes it whole, so readers never observe a token
//! without its user (or the reverse). Readers hold a [`SessionReader`] and
//! either take a snapshot or wait for the next change.

use std::sync::Arc;

use tokio::sync::watch;

use certportal_auth::{AuthToken, Role, Session, User};

use crate::storage::{CredentialStorage, ROLE_KEY, StorageError, TOKEN_KEY, USER_KEY};

pub struct CredentialStore {
    storage: Arc<dyn CredentialStorage>,
    sender: watch::Sender<Arc<Session>>,
}

impl core::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("session", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Read the persisted session once and start publishing it.
    ///
    /// An unreadable user record is dropped with a warning; the token alone
    /// still authenticates. A role stored on its own fills in a user that
    /// arrived without one.
    pub async fn rehydrate(storage: Arc<dyn CredentialStorage>) -> Result<Self, StorageError> {
        let token = storage.get(TOKEN_KEY).await?.map(AuthToken::new);
        let role = storage.get(ROLE_KEY).await?.map(Role::new);

        let user = match storage.get(USER_KEY).await? {
            Some(raw) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(err) => {
                    tracing::warn!(error = %err, "discarding unreadable stored user");
                    None
                }
            },
            None => None,
        };

        let user = user.map(|mut user| {
            if user.role.is_none() {
                user.role = role;
            }
            if user.token.is_none() {
                user.token = token.clone();
            }
            user
        });

        let session = Session::from_parts(token, user);
        tracing::debug!(authenticated = session.is_authenticated(), "session rehydrated");

        let (sender, _) = watch::channel(Arc::new(session));
        Ok(Self { storage, sender })
    }

    pub fn reader(&self) -> SessionReader {
        SessionReader {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn snapshot(&self) -> Arc<Session> {
        self.sender.borrow().clone()
    }

    /// Publish `session`, then persist it.
    ///
    /// Readers see the new session even if persisting fails; the error is
    /// returned so the caller can decide how loud to be about it.
    pub(crate) async fn store(&self, session: Session) -> Result<(), StorageError> {
        let session = Arc::new(session);
        self.sender.send_replace(session.clone());

        match session.token() {
            Some(token) => self.storage.set(TOKEN_KEY, token.as_str()).await?,
            None => self.storage.remove(TOKEN_KEY).await?,
        }

        match session.user() {
            Some(user) => {
                let encoded = serde_json::to_string(user)
                    .map_err(|e| StorageError::Backend(format!("failed to encode user: {e}")))?;
                self.storage.set(USER_KEY, &encoded).await?;
            }
            None => self.storage.remove(USER_KEY).await?,
        }

        match session.role() {
            Some(role) => self.storage.set(ROLE_KEY, role.as_str()).await?,
            None => self.storage.remove(ROLE_KEY).await?,
        }

        Ok(())
    }

    /// Publish the anonymous session and wipe every persisted key.
    ///
    /// The in-memory session is cleared first and unconditionally; a storage
    /// failure only leaves stale keys behind.
    pub(crate) async fn clear(&self) -> Result<(), StorageError> {
        self.sender.send_replace(Arc::new(Session::anonymous()));
        self.wipe().await
    }

    /// Clear only if the published session still carries `token`. Returns
    /// whether it did; a newer session is left alone.
    pub(crate) async fn clear_if_current(&self, token: &AuthToken) -> Result<bool, StorageError> {
        let cleared = self.sender.send_if_modified(|session| {
            if session.token() == Some(token) {
                *session = Arc::new(Session::anonymous());
                true
            } else {
                false
            }
        });
        if cleared {
            self.wipe().await?;
        }
        Ok(cleared)
    }

    async fn wipe(&self) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in [TOKEN_KEY, USER_KEY, ROLE_KEY] {
            if let Err(err) = self.storage.remove(key).await {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Read-only handle on the published session.
#[derive(Debug, Clone)]
pub struct SessionReader {
    receiver: watch::Receiver<Arc<Session>>,
}

impl SessionReader {
    pub fn snapshot(&self) -> Arc<Session> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next published session. Returns `None` once the store is
    /// gone.
    pub async fn changed(&mut self) -> Option<Arc<Session>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}
