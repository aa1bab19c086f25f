//! `certportal-client`
//!
//! **Responsibility:** the portal's client-side core.
//!
//! This crate provides:
//! - Durable credential storage and the single-writer session store
//! - The authenticator (login, logout, password change, session expiry)
//! - Route navigation through the guard
//! - Per-role dashboard shells with selection and bulk review commands
//! - The certificate editor (create / view / edit)
//!
//! The backend remains the authority; this crate is a **thin shell** around
//! its REST API.

pub mod api;
pub mod authenticator;
pub mod config;
pub mod context;
pub mod credentials;
pub mod editor;
pub mod memory;
pub mod navigator;
pub mod shell;
pub mod storage;

pub use api::{ApiError, HttpPortalApi, PortalApi, ReviewDecision};
pub use authenticator::{AuthError, Authenticator};
pub use config::PortalConfig;
pub use context::PortalContext;
pub use credentials::{CredentialStore, SessionReader};
pub use editor::{CertificateEditor, EditorError, SubmitOutcome};
pub use memory::MemoryPortalApi;
pub use navigator::Navigator;
pub use shell::{BulkAction, BulkOutcome, DashboardScope, DashboardShell, LoadState, ShellError};
pub use storage::{CredentialStorage, MemoryStorage, SqliteStorage, StorageError};
