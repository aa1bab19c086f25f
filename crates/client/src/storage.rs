//! Durable client storage for the session (token, user, role).

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use thiserror::Error;

/// Fixed storage keys for the persisted session.
pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const ROLE_KEY: &str = "role";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("credential storage unavailable: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for StorageError {
    fn from(err: anyhow::Error) -> Self {
        StorageError::Backend(format!("{err:#}"))
    }
}

/// Key/value storage that survives restarts.
#[async_trait]
pub trait CredentialStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local storage (tests, throwaway sessions).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CredentialStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// SQLite-backed credential storage.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    options: SqliteConnectOptions,
    /// Lazily initialized on first use, shared by clones.
    pool: Arc<tokio::sync::Mutex<Option<SqlitePool>>>,
}

impl SqliteStorage {
    /// Storage in a database file (created if missing).
    pub fn at(path: impl AsRef<Path>) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        Self::with_options(options)
    }

    /// Private in-memory database; contents vanish with the process.
    pub fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("invalid in-memory SQLite options")?;
        Ok(Self::with_options(options))
    }

    fn with_options(options: SqliteConnectOptions) -> Self {
        Self {
            options,
            pool: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Initialize the database connection (called lazily on first use).
    async fn get_pool(&self) -> anyhow::Result<SqlitePool> {
        let mut pool_guard = self.pool.lock().await;
        if let Some(pool) = pool_guard.as_ref() {
            return Ok(pool.clone());
        }

        if let Some(parent) = self.options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create credential directory at {:?}", parent)
                })?;
            }
        }

        // A single connection keeps `sqlite::memory:` to one database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(self.options.clone())
            .await
            .context("failed to open credential database")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                stored_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create credentials table")?;

        *pool_guard = Some(pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl CredentialStorage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let pool = self.get_pool().await?;
        let row = sqlx::query("SELECT value FROM credentials WHERE key = ?1")
            .bind(key)
            .fetch_optional(&pool)
            .await
            .with_context(|| format!("failed to read credential '{key}'"))?;

        match row {
            Some(row) => {
                let value: String = row
                    .try_get("value")
                    .with_context(|| format!("failed to decode credential '{key}'"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            INSERT INTO credentials (key, value, stored_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key)
            DO UPDATE SET
                value = excluded.value,
                stored_at = excluded.stored_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .with_context(|| format!("failed to store credential '{key}'"))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let pool = self.get_pool().await?;
        sqlx::query("DELETE FROM credentials WHERE key = ?1")
            .bind(key)
            .execute(&pool)
            .await
            .with_context(|| format!("failed to remove credential '{key}'"))?;
        Ok(())
    }
}
