//! Certificate records: raw backend shape, typed model, display row.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use certportal_core::{CertificateId, DomainError, DomainResult, Entity};

use crate::display::{
    format_date, format_money, format_rate, format_text, parse_date, parse_number, parse_text,
};

/// Certificate status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CertificateStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Pending => "PENDING",
            CertificateStatus::Approved => "APPROVED",
            CertificateStatus::Rejected => "REJECTED",
        }
    }
}

impl core::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for CertificateStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(CertificateStatus::Pending),
            "APPROVED" => Ok(CertificateStatus::Approved),
            "REJECTED" => Ok(CertificateStatus::Rejected),
            other => Err(DomainError::malformed(format!("unknown certificate status '{other}'"))),
        }
    }
}

/// A certificate record exactly as the backend (or a previous normalization)
/// produced it.
///
/// Scalars are kept as loose JSON values: the backend mixes numbers and
/// strings, and normalized rows carry formatted strings. Unknown fields,
/// including the `field1..field10` / `field101..field109` extension slots,
/// are passed through in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCertificate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, alias = "cert_no", skip_serializing_if = "Option::is_none")]
    pub cert_no: Option<Value>,
    #[serde(default, alias = "broker_id", skip_serializing_if = "Option::is_none")]
    pub broker_id: Option<Value>,
    #[serde(default, alias = "client_id", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Value>,
    #[serde(default, alias = "ins_company_id", skip_serializing_if = "Option::is_none")]
    pub ins_company_id: Option<Value>,
    #[serde(default, alias = "insured_name", skip_serializing_if = "Option::is_none")]
    pub insured_name: Option<Value>,
    #[serde(default, alias = "policy_no", skip_serializing_if = "Option::is_none")]
    pub policy_no: Option<Value>,
    #[serde(default, alias = "trans_date", skip_serializing_if = "Option::is_none")]
    pub trans_date: Option<Value>,
    #[serde(default, alias = "submit_date", skip_serializing_if = "Option::is_none")]
    pub submit_date: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Value>,
    #[serde(default, alias = "insured_value", skip_serializing_if = "Option::is_none")]
    pub insured_value: Option<Value>,
    #[serde(default, alias = "gross_premium", skip_serializing_if = "Option::is_none")]
    pub gross_premium: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Typed certificate as held by a dashboard shell.
#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    pub id: CertificateId,
    pub cert_no: Option<String>,
    pub broker_id: Option<String>,
    pub client_id: Option<String>,
    pub ins_company_id: Option<String>,
    pub insured_name: Option<String>,
    pub policy_no: Option<String>,
    pub trans_date: Option<NaiveDate>,
    pub submit_date: Option<NaiveDate>,
    /// Percentage, e.g. `12.5` for 12.5 %.
    pub rate: f64,
    pub insured_value: f64,
    pub gross_premium: f64,
    pub status: CertificateStatus,
    pub extra: BTreeMap<String, Value>,
}

fn text(value: &Option<Value>) -> Option<String> {
    value.as_ref().and_then(parse_text)
}

fn number(value: &Option<Value>) -> f64 {
    value.as_ref().and_then(parse_number).unwrap_or(0.0)
}

fn date(value: &Option<Value>) -> Option<NaiveDate> {
    value.as_ref().and_then(parse_date)
}

impl Certificate {
    /// Interpret a raw record. Only the id is mandatory; missing numbers read
    /// as zero and a missing status reads as pending.
    pub fn from_raw(raw: &RawCertificate) -> DomainResult<Self> {
        let id = raw
            .id
            .as_ref()
            .ok_or_else(|| DomainError::malformed("certificate record has no id"))
            .and_then(CertificateId::from_json)?;

        let status = match raw.status.as_ref().and_then(parse_text) {
            Some(s) => s.parse()?,
            None => CertificateStatus::default(),
        };

        Ok(Self {
            id,
            cert_no: text(&raw.cert_no),
            broker_id: text(&raw.broker_id),
            client_id: text(&raw.client_id),
            ins_company_id: text(&raw.ins_company_id),
            insured_name: text(&raw.insured_name),
            policy_no: text(&raw.policy_no),
            trans_date: date(&raw.trans_date),
            submit_date: date(&raw.submit_date),
            rate: number(&raw.rate),
            insured_value: number(&raw.insured_value),
            gross_premium: number(&raw.gross_premium),
            status,
            extra: raw.extra.clone(),
        })
    }

    /// Presentational form of this certificate.
    pub fn to_row(&self) -> CertificateRow {
        CertificateRow {
            id: self.id.to_string(),
            cert_no: format_text(self.cert_no.as_deref()),
            broker_id: format_text(self.broker_id.as_deref()),
            client_id: format_text(self.client_id.as_deref()),
            ins_company_id: format_text(self.ins_company_id.as_deref()),
            insured_name: format_text(self.insured_name.as_deref()),
            policy_no: format_text(self.policy_no.as_deref()),
            trans_date: format_date(self.trans_date),
            submit_date: format_date(self.submit_date),
            rate: format_rate(self.rate),
            insured_value: format_money(self.insured_value),
            gross_premium: format_money(self.gross_premium),
            status: self.status,
            extra: self.extra.clone(),
        }
    }

    /// Case-insensitive match against the fields users search by.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [&self.cert_no, &self.insured_name, &self.policy_no]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

impl Entity for Certificate {
    type Id = CertificateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Normalized, display-ready certificate.
///
/// Field names match [`RawCertificate`] so a row can be fed back through
/// [`normalize`] unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRow {
    pub id: String,
    pub cert_no: String,
    pub broker_id: String,
    pub client_id: String,
    pub ins_company_id: String,
    pub insured_name: String,
    pub policy_no: String,
    pub trans_date: String,
    pub submit_date: String,
    pub rate: String,
    pub insured_value: String,
    pub gross_premium: String,
    pub status: CertificateStatus,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl From<CertificateRow> for RawCertificate {
    fn from(row: CertificateRow) -> Self {
        let s = |v: String| Some(Value::String(v));
        RawCertificate {
            id: s(row.id),
            cert_no: s(row.cert_no),
            broker_id: s(row.broker_id),
            client_id: s(row.client_id),
            ins_company_id: s(row.ins_company_id),
            insured_name: s(row.insured_name),
            policy_no: s(row.policy_no),
            trans_date: s(row.trans_date),
            submit_date: s(row.submit_date),
            rate: s(row.rate),
            insured_value: s(row.insured_value),
            gross_premium: s(row.gross_premium),
            status: s(row.status.as_str().to_string()),
            extra: row.extra,
        }
    }
}

/// Normalize a raw record into its display row.
///
/// Idempotent: `normalize(&row.into())` returns `row` again.
pub fn normalize(raw: &RawCertificate) -> DomainResult<CertificateRow> {
    Ok(Certificate::from_raw(raw)?.to_row())
}
