use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier as issued by the backend.
///
/// Roles arrive as loosely formatted strings (`"Broker"`, `" company "`,
/// `"insuredClient"`). The stored form is always trimmed and lower-cased so
/// lookups never need to re-normalize.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        let normalized = name.trim();
        if normalized.len() == name.len() && !normalized.chars().any(char::is_uppercase) {
            return Self(name);
        }
        Self(Cow::Owned(normalized.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Typed view of this role, resolving known aliases.
    pub fn kind(&self) -> Option<RoleKind> {
        RoleKind::from_alias(self.as_str())
    }

    /// Whether `self` satisfies a route that requires `required`.
    ///
    /// Known roles compare by kind (so `customer` satisfies `client`); unknown
    /// roles fall back to comparing the normalized strings.
    pub fn satisfies(&self, required: &Role) -> bool {
        match (self.kind(), required.kind()) {
            (Some(have), Some(want)) => have == want,
            _ => self.as_str() == required.as_str(),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&'static str> for Role {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.0.into_owned()
    }
}

impl From<RoleKind> for Role {
    fn from(value: RoleKind) -> Self {
        Self::new(value.as_str())
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of user classes the portal knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Company,
    Broker,
    Client,
    Admin,
}

impl RoleKind {
    /// Resolve a normalized role string, including the aliases the backend
    /// has been observed to send.
    pub fn from_alias(name: &str) -> Option<Self> {
        match name {
            "company" | "companies" | "insurancecompany" => Some(RoleKind::Company),
            "broker" | "brokers" => Some(RoleKind::Broker),
            "client" | "clients" | "customer" | "insuredclient" => Some(RoleKind::Client),
            "admin" | "administrator" => Some(RoleKind::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Company => "company",
            RoleKind::Broker => "broker",
            RoleKind::Client => "client",
            RoleKind::Admin => "admin",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_case_folded_and_trimmed() {
        assert_eq!(Role::new("  Broker ").as_str(), "broker");
        assert_eq!(Role::new("COMPANY"), Role::new("company"));
    }

    #[test]
    fn deserialization_normalizes() {
        let role: Role = serde_json::from_str("\" InsuredClient \"").unwrap();
        assert_eq!(role.as_str(), "insuredclient");
        assert_eq!(role.kind(), Some(RoleKind::Client));
    }

    #[test]
    fn aliases_satisfy_their_canonical_role() {
        assert!(Role::new("customer").satisfies(&Role::new("client")));
        assert!(Role::new("insuredclient").satisfies(&Role::new("customer")));
        assert!(!Role::new("broker").satisfies(&Role::new("company")));
    }

    #[test]
    fn unknown_roles_compare_by_string() {
        assert!(Role::new("Auditor").satisfies(&Role::new("auditor")));
        assert!(!Role::new("auditor").satisfies(&Role::new("broker")));
    }
}
