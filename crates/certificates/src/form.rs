//! Certificate lifecycle form: one field set, three modes.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use certportal_core::{CertificateId, DomainError, DomainResult};

use crate::display::{parse_date, parse_number};
use crate::{Certificate, CertificateStatus};

/// Which form the user is looking at, resolved once on entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    View(CertificateId),
    Edit(CertificateId),
}

impl FormMode {
    /// Resolve from the route: an id with the view flag is a read-only view,
    /// an id without it is an edit, and no id is a create (the view flag
    /// alone has nothing to show).
    pub fn resolve(view_flag: bool, route_id: Option<CertificateId>) -> Self {
        match route_id {
            Some(id) if view_flag => FormMode::View(id),
            Some(id) => FormMode::Edit(id),
            None => FormMode::Create,
        }
    }

    pub fn certificate_id(&self) -> Option<&CertificateId> {
        match self {
            FormMode::Create => None,
            FormMode::View(id) | FormMode::Edit(id) => Some(id),
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, FormMode::View(_))
    }
}

/// Auto-generated certificate number for new certificates.
pub fn generate_cert_no(now: DateTime<Utc>) -> String {
    format!("CERT-{}", now.format("%Y%m%d-%H%M%S"))
}

/// Every field the form renders, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    CertNo,
    BrokerId,
    ClientId,
    InsCompanyId,
    InsuredName,
    PolicyNo,
    TransDate,
    SubmitDate,
    Rate,
    InsuredValue,
    GrossPremium,
    Status,
}

impl FormField {
    pub const ALL: [FormField; 12] = [
        FormField::CertNo,
        FormField::BrokerId,
        FormField::ClientId,
        FormField::InsCompanyId,
        FormField::InsuredName,
        FormField::PolicyNo,
        FormField::TransDate,
        FormField::SubmitDate,
        FormField::Rate,
        FormField::InsuredValue,
        FormField::GrossPremium,
        FormField::Status,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FormField::CertNo => "Certificate No.",
            FormField::BrokerId => "Broker",
            FormField::ClientId => "Client",
            FormField::InsCompanyId => "Insurance Company",
            FormField::InsuredName => "Insured Name",
            FormField::PolicyNo => "Policy No.",
            FormField::TransDate => "Transaction Date",
            FormField::SubmitDate => "Submit Date",
            FormField::Rate => "Rate (%)",
            FormField::InsuredValue => "Insured Value",
            FormField::GrossPremium => "Gross Premium",
            FormField::Status => "Status",
        }
    }

    /// Wire name of the field, as sent in payloads.
    pub fn key(&self) -> &'static str {
        match self {
            FormField::CertNo => "certNo",
            FormField::BrokerId => "brokerId",
            FormField::ClientId => "clientId",
            FormField::InsCompanyId => "insCompanyId",
            FormField::InsuredName => "insuredName",
            FormField::PolicyNo => "policyNo",
            FormField::TransDate => "transDate",
            FormField::SubmitDate => "submitDate",
            FormField::Rate => "rate",
            FormField::InsuredValue => "insuredValue",
            FormField::GrossPremium => "grossPremium",
            FormField::Status => "status",
        }
    }

    /// Derived fields are computed on submit and never typed in.
    pub fn is_derived(&self) -> bool {
        matches!(self, FormField::GrossPremium)
    }
}

impl core::str::FromStr for FormField {
    type Err = DomainError;

    /// Accepts the wire name in camelCase or snake_case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.trim().chars().filter(|c| *c != '_').collect();
        FormField::ALL
            .iter()
            .find(|field| field.key().eq_ignore_ascii_case(&wanted))
            .copied()
            .ok_or_else(|| DomainError::validation(format!("unknown field '{}'", s.trim())))
    }
}

/// Whether `key` collides with a payload field (`id` or any form field,
/// camelCase or snake_case).
fn is_reserved_key(key: &str) -> bool {
    key.trim().eq_ignore_ascii_case("id") || key.parse::<FormField>().is_ok()
}

/// One rendered field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldView {
    pub field: FormField,
    pub label: &'static str,
    pub value: String,
    pub editable: bool,
}

/// Local form state. Text fields use the empty string for "not set".
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateDraft {
    pub cert_no: String,
    pub broker_id: String,
    pub client_id: String,
    pub ins_company_id: String,
    pub insured_name: String,
    pub policy_no: String,
    pub trans_date: Option<NaiveDate>,
    pub submit_date: Option<NaiveDate>,
    pub rate: f64,
    pub insured_value: f64,
    pub status: CertificateStatus,
    pub extra: BTreeMap<String, Value>,
}

impl CertificateDraft {
    /// Defaults for a brand new certificate.
    pub fn new(cert_no: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            cert_no: cert_no.into(),
            broker_id: String::new(),
            client_id: String::new(),
            ins_company_id: String::new(),
            insured_name: String::new(),
            policy_no: String::new(),
            trans_date: Some(today),
            submit_date: None,
            rate: 0.0,
            insured_value: 0.0,
            status: CertificateStatus::Pending,
            extra: BTreeMap::new(),
        }
    }

    pub fn from_certificate(certificate: &Certificate) -> Self {
        let owned = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            cert_no: owned(&certificate.cert_no),
            broker_id: owned(&certificate.broker_id),
            client_id: owned(&certificate.client_id),
            ins_company_id: owned(&certificate.ins_company_id),
            insured_name: owned(&certificate.insured_name),
            policy_no: owned(&certificate.policy_no),
            trans_date: certificate.trans_date,
            submit_date: certificate.submit_date,
            rate: certificate.rate,
            insured_value: certificate.insured_value,
            status: certificate.status,
            extra: certificate.extra.clone(),
        }
    }

    /// `insured_value × (rate / 100)`, unrounded.
    pub fn gross_premium(&self) -> f64 {
        self.insured_value * (self.rate / 100.0)
    }

    pub fn value_of(&self, field: FormField) -> String {
        let date = |d: Option<NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        match field {
            FormField::CertNo => self.cert_no.clone(),
            FormField::BrokerId => self.broker_id.clone(),
            FormField::ClientId => self.client_id.clone(),
            FormField::InsCompanyId => self.ins_company_id.clone(),
            FormField::InsuredName => self.insured_name.clone(),
            FormField::PolicyNo => self.policy_no.clone(),
            FormField::TransDate => date(self.trans_date),
            FormField::SubmitDate => date(self.submit_date),
            FormField::Rate => self.rate.to_string(),
            FormField::InsuredValue => self.insured_value.to_string(),
            FormField::GrossPremium => self.gross_premium().to_string(),
            FormField::Status => self.status.to_string(),
        }
    }

    /// Apply user input to a field.
    pub fn set(&mut self, field: FormField, input: &str) -> DomainResult<()> {
        let input = input.trim();
        let number = |name: &str| {
            if input.is_empty() {
                return Ok(0.0);
            }
            parse_number(&Value::String(input.to_string()))
                .ok_or_else(|| DomainError::validation(format!("{name} must be a number")))
        };
        let date = |name: &str| {
            if input.is_empty() {
                return Ok(None);
            }
            parse_date(&Value::String(input.to_string()))
                .map(Some)
                .ok_or_else(|| DomainError::validation(format!("{name} must be a date")))
        };

        match field {
            FormField::CertNo => self.cert_no = input.to_string(),
            FormField::BrokerId => self.broker_id = input.to_string(),
            FormField::ClientId => self.client_id = input.to_string(),
            FormField::InsCompanyId => self.ins_company_id = input.to_string(),
            FormField::InsuredName => self.insured_name = input.to_string(),
            FormField::PolicyNo => self.policy_no = input.to_string(),
            FormField::TransDate => self.trans_date = date("transaction date")?,
            FormField::SubmitDate => self.submit_date = date("submit date")?,
            FormField::Rate => self.rate = number("rate")?,
            FormField::InsuredValue => self.insured_value = number("insured value")?,
            FormField::Status => self.status = input.parse()?,
            FormField::GrossPremium => {
                return Err(DomainError::not_permitted(
                    "gross premium is derived from insured value and rate",
                ));
            }
        }
        Ok(())
    }

    /// Set a backend extension slot (`field1`, `field101`, ...).
    ///
    /// Keys naming a form field or the record id are rejected: they would
    /// shadow the typed value in the payload.
    pub fn set_extra(&mut self, key: impl Into<String>, value: Value) -> DomainResult<()> {
        let key = key.into();
        if is_reserved_key(&key) {
            return Err(DomainError::not_permitted(format!(
                "'{}' is a certificate field, not an extension slot",
                key.trim()
            )));
        }
        self.extra.insert(key, value);
        Ok(())
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.cert_no.trim().is_empty() {
            return Err(DomainError::validation("certificate number is required"));
        }
        if self.insured_name.trim().is_empty() {
            return Err(DomainError::validation("insured name is required"));
        }
        if !(self.rate.is_finite() && self.rate >= 0.0) {
            return Err(DomainError::validation("rate must be a non-negative number"));
        }
        if !(self.insured_value.is_finite() && self.insured_value >= 0.0) {
            return Err(DomainError::validation("insured value must be a non-negative number"));
        }
        Ok(())
    }

    pub fn to_payload(&self) -> CertificatePayload {
        let opt = |s: &str| (!s.trim().is_empty()).then(|| s.trim().to_string());
        CertificatePayload {
            cert_no: self.cert_no.trim().to_string(),
            broker_id: opt(&self.broker_id),
            client_id: opt(&self.client_id),
            ins_company_id: opt(&self.ins_company_id),
            insured_name: self.insured_name.trim().to_string(),
            policy_no: opt(&self.policy_no),
            trans_date: self.trans_date,
            submit_date: self.submit_date,
            rate: self.rate,
            insured_value: self.insured_value,
            gross_premium: self.gross_premium(),
            status: self.status,
            extra: self
                .extra
                .iter()
                .filter(|(key, _)| !is_reserved_key(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }
}

/// Body sent on create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificatePayload {
    pub cert_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ins_company_id: Option<String>,
    pub insured_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_no: Option<String>,
    pub trans_date: Option<NaiveDate>,
    pub submit_date: Option<NaiveDate>,
    pub rate: f64,
    pub insured_value: f64,
    pub gross_premium: f64,
    pub status: CertificateStatus,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Form state machine: a mode plus the single draft every field renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateForm {
    mode: FormMode,
    draft: CertificateDraft,
}

impl CertificateForm {
    /// A create-mode form with defaults.
    pub fn create(now: DateTime<Utc>) -> Self {
        Self {
            mode: FormMode::Create,
            draft: CertificateDraft::new(generate_cert_no(now), now.date_naive()),
        }
    }

    /// A view/edit form populated from a fetched record.
    pub fn loaded(mode: FormMode, certificate: &Certificate) -> DomainResult<Self> {
        match mode.certificate_id() {
            None => return Err(DomainError::invariant("create mode does not load a record")),
            Some(id) if *id != certificate.id => {
                return Err(DomainError::invariant(format!(
                    "form opened for certificate {id} but record {} was loaded",
                    certificate.id
                )));
            }
            Some(_) => {}
        }
        Ok(Self {
            draft: CertificateDraft::from_certificate(certificate),
            mode,
        })
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn draft(&self) -> &CertificateDraft {
        &self.draft
    }

    /// The same field set in every mode; only editability differs.
    pub fn fields(&self) -> Vec<FieldView> {
        let read_only = self.mode.is_read_only();
        FormField::ALL
            .iter()
            .map(|field| FieldView {
                field: *field,
                label: field.label(),
                value: self.draft.value_of(*field),
                editable: !read_only && !field.is_derived(),
            })
            .collect()
    }

    pub fn set(&mut self, field: FormField, input: &str) -> DomainResult<()> {
        if self.mode.is_read_only() {
            return Err(DomainError::not_permitted("certificate is open read-only"));
        }
        self.draft.set(field, input)
    }

    pub fn set_extra(&mut self, key: impl Into<String>, value: Value) -> DomainResult<()> {
        if self.mode.is_read_only() {
            return Err(DomainError::not_permitted("certificate is open read-only"));
        }
        self.draft.set_extra(key, value)
    }

    /// Validated payload ready to send, with the derived premium filled in.
    pub fn payload(&self) -> DomainResult<CertificatePayload> {
        if self.mode.is_read_only() {
            return Err(DomainError::not_permitted("nothing to submit in view mode"));
        }
        self.draft.validate()?;
        Ok(self.draft.to_payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RawCertificate;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 15).unwrap()
    }

    fn fetched(id: u64) -> Certificate {
        let raw: RawCertificate = serde_json::from_value(json!({
            "id": id,
            "certNo": "CERT-77",
            "insuredName": "Harbour Freight Ltd",
            "rate": 0.5,
            "insuredValue": 200000,
            "grossPremium": 1000,
            "status": "PENDING"
        }))
        .unwrap();
        Certificate::from_raw(&raw).unwrap()
    }

    #[test]
    fn mode_resolution() {
        let id = CertificateId::from(4);
        assert_eq!(FormMode::resolve(true, Some(id.clone())), FormMode::View(id.clone()));
        assert_eq!(FormMode::resolve(false, Some(id.clone())), FormMode::Edit(id));
        assert_eq!(FormMode::resolve(false, None), FormMode::Create);
        assert_eq!(FormMode::resolve(true, None), FormMode::Create);
    }

    #[test]
    fn fields_parse_from_wire_names() {
        assert_eq!("insuredName".parse::<FormField>(), Ok(FormField::InsuredName));
        assert_eq!("insured_value".parse::<FormField>(), Ok(FormField::InsuredValue));
        assert_eq!("RATE".parse::<FormField>(), Ok(FormField::Rate));
        assert!("premium".parse::<FormField>().is_err());
    }

    #[test]
    fn create_mode_starts_from_defaults() {
        let form = CertificateForm::create(now());
        assert_eq!(form.draft().cert_no, "CERT-20240601-093015");
        assert_eq!(form.draft().trans_date, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(form.draft().status, CertificateStatus::Pending);
    }

    #[test]
    fn field_set_is_identical_across_modes() {
        let cert = fetched(9);
        let view = CertificateForm::loaded(FormMode::View(cert.id.clone()), &cert).unwrap();
        let edit = CertificateForm::loaded(FormMode::Edit(cert.id.clone()), &cert).unwrap();
        let create = CertificateForm::create(now());

        let names = |f: &CertificateForm| f.fields().iter().map(|v| v.field).collect::<Vec<_>>();
        assert_eq!(names(&view), names(&edit));
        assert_eq!(names(&view), names(&create));

        assert!(view.fields().iter().all(|f| !f.editable));
        let locked: Vec<_> = edit.fields().into_iter().filter(|f| !f.editable).map(|f| f.field).collect();
        assert_eq!(locked, vec![FormField::GrossPremium]);
    }

    #[test]
    fn view_mode_rejects_edits_and_submission() {
        let cert = fetched(9);
        let mut view = CertificateForm::loaded(FormMode::View(cert.id.clone()), &cert).unwrap();
        assert!(matches!(view.set(FormField::InsuredName, "x"), Err(DomainError::NotPermitted(_))));
        assert!(view.payload().is_err());
    }

    #[test]
    fn loaded_rejects_mismatched_record() {
        let cert = fetched(9);
        assert!(CertificateForm::loaded(FormMode::Edit(CertificateId::from(10)), &cert).is_err());
        assert!(CertificateForm::loaded(FormMode::Create, &cert).is_err());
    }

    #[test]
    fn gross_premium_is_not_editable() {
        let mut form = CertificateForm::create(now());
        let err = form.set(FormField::GrossPremium, "5").unwrap_err();
        assert!(matches!(err, DomainError::NotPermitted(_)));
    }

    #[test]
    fn payload_carries_derived_premium() {
        let mut form = CertificateForm::create(now());
        form.set(FormField::InsuredName, "Atlas Marine").unwrap();
        form.set(FormField::InsuredValue, "$1,000,000").unwrap();
        form.set(FormField::Rate, "0.25").unwrap();
        form.set_extra("field101", json!("hull")).unwrap();

        let payload = form.payload().unwrap();
        assert_eq!(payload.gross_premium, 1_000_000.0 * (0.25 / 100.0));
        assert_eq!(payload.extra.get("field101"), Some(&json!("hull")));

        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["transDate"], json!("2024-06-01"));
        assert_eq!(body["status"], json!("PENDING"));
        assert_eq!(body["field101"], json!("hull"));
    }

    #[test]
    fn extension_slots_cannot_shadow_payload_fields() {
        let mut form = CertificateForm::create(now());
        form.set(FormField::InsuredName, "Atlas Marine").unwrap();
        form.set(FormField::InsuredValue, "1000").unwrap();
        form.set(FormField::Rate, "10").unwrap();

        for key in ["grossPremium", "gross_premium", "status", "id"] {
            let err = form.set_extra(key, json!(5)).unwrap_err();
            assert!(matches!(err, DomainError::NotPermitted(_)), "{key}");
        }

        let payload = form.payload().unwrap();
        assert_eq!(payload.gross_premium, 100.0);
        assert!(payload.extra.is_empty());
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["grossPremium"], json!(100.0));
        assert_eq!(body["status"], json!("PENDING"));
    }

    #[test]
    fn reserved_slots_inserted_directly_are_not_sent() {
        let mut draft = CertificateDraft::new("CERT-1", now().date_naive());
        draft.insured_name = "Insured".to_string();
        draft.insured_value = 1000.0;
        draft.rate = 10.0;
        draft.extra.insert("grossPremium".to_string(), json!(5));
        draft.extra.insert("field7".to_string(), json!("x"));

        let body = serde_json::to_value(draft.to_payload()).unwrap();
        assert_eq!(body["grossPremium"], json!(100.0));
        assert_eq!(body["field7"], json!("x"));
    }

    #[test]
    fn missing_required_fields_fail_before_dispatch() {
        let form = CertificateForm::create(now());
        assert!(matches!(form.payload(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn bad_numeric_input_is_a_validation_error() {
        let mut form = CertificateForm::create(now());
        assert!(matches!(form.set(FormField::Rate, "abc"), Err(DomainError::Validation(_))));
        assert!(matches!(form.set(FormField::TransDate, "someday"), Err(DomainError::Validation(_))));
    }

    proptest! {
        /// Property: the transmitted gross premium is exactly V * (R / 100).
        #[test]
        fn derived_premium_law(value in 0.0f64..1.0e12, rate in 0.0f64..100.0) {
            let mut draft = CertificateDraft::new("CERT-1", now().date_naive());
            draft.insured_name = "Insured".to_string();
            draft.insured_value = value;
            draft.rate = rate;

            let payload = draft.to_payload();
            prop_assert_eq!(payload.gross_premium, value * (rate / 100.0));
        }
    }
}
