//! `certportal-core`: shared building blocks for the portal client core.
//!
//! This crate contains **pure** primitives (no IO, no transport concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CertificateId, UserId};
