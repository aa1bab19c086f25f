//! Strongly-typed identifiers used across the portal.
//!
//! Identifiers are issued by the backend and are opaque here. The backend is
//! not consistent about sending them as JSON strings or numbers, so both are
//! accepted on deserialization and normalized to their decimal/string form.

use core::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DomainError;

/// Identifier of a certificate (or proposal) record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CertificateId(String);

/// Identifier of a portal user (company, broker, client or admin account).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Unsigned(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Int(n) => n.to_string(),
            RawId::Unsigned(n) => n.to_string(),
        }
    }
}

macro_rules! impl_opaque_id {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Build an identifier, rejecting blank values.
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(format!("{}: empty", $name)));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl From<u64> for $t {
            fn from(value: u64) -> Self {
                Self(value.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $t {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = RawId::deserialize(deserializer)?;
                Self::new(raw.into_string()).map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_opaque_id!(CertificateId, "CertificateId");
impl_opaque_id!(UserId, "UserId");

impl CertificateId {
    /// Interpret a loose JSON scalar (string or number) as a certificate id.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, DomainError> {
        match value {
            serde_json::Value::String(s) => Self::new(s.as_str()),
            serde_json::Value::Number(n) => Self::new(n.to_string()),
            other => Err(DomainError::invalid_id(format!(
                "CertificateId: expected string or number, got {other}"
            ))),
        }
    }
}
