//! Status tabs and text search over a loaded collection.

use serde::{Deserialize, Serialize};

use certportal_core::DomainError;

use crate::{Certificate, CertificateStatus};

/// Dashboard tab, one per status plus "all".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTab {
    #[default]
    All,
    Pending,
    Approved,
    Rejected,
}

impl StatusTab {
    pub fn matches(&self, certificate: &Certificate) -> bool {
        match self {
            StatusTab::All => true,
            StatusTab::Pending => certificate.status == CertificateStatus::Pending,
            StatusTab::Approved => certificate.status == CertificateStatus::Approved,
            StatusTab::Rejected => certificate.status == CertificateStatus::Rejected,
        }
    }
}

impl core::str::FromStr for StatusTab {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(StatusTab::All),
            "pending" => Ok(StatusTab::Pending),
            "approved" => Ok(StatusTab::Approved),
            "rejected" => Ok(StatusTab::Rejected),
            other => Err(DomainError::validation(format!("unknown tab '{other}'"))),
        }
    }
}

/// What part of the collection is currently visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateFilter {
    pub tab: StatusTab,
    pub search: String,
}

impl CertificateFilter {
    pub fn matches(&self, certificate: &Certificate) -> bool {
        self.tab.matches(certificate) && certificate.matches_text(&self.search)
    }

    pub fn apply<'a>(&self, certificates: &'a [Certificate]) -> Vec<&'a Certificate> {
        certificates.iter().filter(|c| self.matches(c)).collect()
    }
}
