//! Create / view / edit a single certificate against the backend.

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use certportal_auth::AuthToken;
use certportal_certificates::{Certificate, CertificateForm, FieldView, FormField, FormMode};
use certportal_core::{CertificateId, DomainError};

use crate::api::ApiError;
use crate::context::PortalContext;
use crate::shell::DashboardScope;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("session expired, please sign in again")]
    SessionExpired,

    #[error("not signed in")]
    NotAuthenticated,

    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("{0}")]
    Request(String),
}

/// Where to go after a successful submit. There is no create → view hop:
/// the user always returns to their list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Id of the stored record, when the backend reported one.
    pub certificate_id: Option<CertificateId>,
    pub return_to: &'static str,
}

pub struct CertificateEditor {
    ctx: PortalContext,
    scope: DashboardScope,
    form: CertificateForm,
}

impl CertificateEditor {
    /// Open the form. View and edit modes fetch the record first.
    pub async fn open(
        ctx: PortalContext,
        mode: FormMode,
        scope: DashboardScope,
    ) -> Result<Self, EditorError> {
        let form = match mode.certificate_id().cloned() {
            None => CertificateForm::create(Utc::now()),
            Some(id) => {
                let token = ctx.token().ok_or(EditorError::NotAuthenticated)?;
                let raw = match ctx.api().get_certificate(&token, &id).await {
                    Ok(raw) => raw,
                    Err(err) => return Err(request_failed(&ctx, &token, err, "certificate load").await),
                };
                let certificate = Certificate::from_raw(&raw)?;
                CertificateForm::loaded(mode, &certificate)?
            }
        };

        Ok(Self { ctx, scope, form })
    }

    pub fn form(&self) -> &CertificateForm {
        &self.form
    }

    pub fn fields(&self) -> Vec<FieldView> {
        self.form.fields()
    }

    pub fn set(&mut self, field: FormField, input: &str) -> Result<(), EditorError> {
        Ok(self.form.set(field, input)?)
    }

    pub fn set_extra(&mut self, key: impl Into<String>, value: Value) -> Result<(), EditorError> {
        Ok(self.form.set_extra(key, value)?)
    }

    /// Validate and send the draft. Create posts, edit puts.
    pub async fn submit(&self) -> Result<SubmitOutcome, EditorError> {
        let payload = self.form.payload()?;
        let token = self.ctx.token().ok_or(EditorError::NotAuthenticated)?;
        let api = self.ctx.api();

        let result = match self.form.mode() {
            FormMode::Create => api.create_certificate(&token, &payload).await,
            FormMode::Edit(id) => api.update_certificate(&token, id, &payload).await,
            FormMode::View(_) => {
                return Err(DomainError::not_permitted("nothing to submit in view mode").into());
            }
        };

        let stored = match result {
            Ok(stored) => stored,
            Err(err) => return Err(request_failed(&self.ctx, &token, err, "certificate submit").await),
        };

        let certificate_id = stored
            .and_then(|raw| raw.id)
            .and_then(|id| CertificateId::from_json(&id).ok())
            .or_else(|| self.form.mode().certificate_id().cloned());

        tracing::info!(
            cert_no = %payload.cert_no,
            certificate_id = certificate_id.as_ref().map(|id| id.as_str()).unwrap_or("<unknown>"),
            "certificate saved"
        );

        Ok(SubmitOutcome {
            certificate_id,
            return_to: self.scope.dashboard_path(),
        })
    }
}

async fn request_failed(
    ctx: &PortalContext,
    token: &AuthToken,
    err: ApiError,
    during: &str,
) -> EditorError {
    if ctx.expire_on_unauthorized(token, &err, during).await {
        return EditorError::SessionExpired;
    }
    tracing::warn!(error = %err, "{during} failed");
    EditorError::Request(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use certportal_auth::User;
    use certportal_certificates::{CertificateStatus, RawCertificate};
    use certportal_core::UserId;
    use serde_json::json;

    use crate::memory::MemoryPortalApi;
    use crate::storage::MemoryStorage;

    async fn context(api: Arc<MemoryPortalApi>) -> PortalContext {
        let ctx = PortalContext::with_parts(api, Arc::new(MemoryStorage::new()))
            .await
            .unwrap();
        ctx.auth().login("acme", "pw").await.unwrap();
        ctx
    }

    fn backend() -> Arc<MemoryPortalApi> {
        let seeded: RawCertificate = serde_json::from_value(json!({
            "id": 10,
            "certNo": "CERT-10",
            "insuredName": "Blue Cargo",
            "rate": 2,
            "insuredValue": 5000,
            "status": "APPROVED"
        }))
        .unwrap();
        Arc::new(
            MemoryPortalApi::new()
                .with_account(
                    "acme",
                    "pw",
                    User::new(UserId::new("1").unwrap(), "Acme").with_role("company"),
                )
                .with_certificate(seeded),
        )
    }

    #[tokio::test]
    async fn create_mode_starts_from_defaults() {
        let ctx = context(backend()).await;
        let editor = CertificateEditor::open(ctx, FormMode::Create, DashboardScope::Company)
            .await
            .unwrap();

        let draft = editor.form().draft();
        assert!(draft.cert_no.starts_with("CERT-"));
        assert_eq!(draft.status, CertificateStatus::Pending);
        assert!(draft.trans_date.is_some());
    }

    #[tokio::test]
    async fn view_mode_is_read_only() {
        let ctx = context(backend()).await;
        let mut editor = CertificateEditor::open(
            ctx,
            FormMode::View(CertificateId::from(10)),
            DashboardScope::Company,
        )
        .await
        .unwrap();

        assert!(editor.fields().iter().all(|f| !f.editable));
        assert!(matches!(
            editor.set(FormField::InsuredName, "x"),
            Err(EditorError::Invalid(DomainError::NotPermitted(_)))
        ));
        assert!(editor.submit().await.is_err());
    }

    #[tokio::test]
    async fn edit_mode_puts_changes() {
        let api = backend();
        let ctx = context(api.clone()).await;
        let mut editor = CertificateEditor::open(
            ctx,
            FormMode::Edit(CertificateId::from(10)),
            DashboardScope::Company,
        )
        .await
        .unwrap();

        editor.set(FormField::InsuredValue, "10000").unwrap();
        let outcome = editor.submit().await.unwrap();

        assert_eq!(outcome.certificate_id, Some(CertificateId::from(10)));
        assert_eq!(outcome.return_to, "/company/dashboard");
        let stored = api.certificate(&CertificateId::from(10)).unwrap();
        assert_eq!(stored.gross_premium, Some(json!(200.0)));
    }

    #[tokio::test]
    async fn missing_record_is_a_request_error() {
        let ctx = context(backend()).await;
        let result = CertificateEditor::open(
            ctx,
            FormMode::Edit(CertificateId::from(404)),
            DashboardScope::Company,
        )
        .await;
        assert!(matches!(result, Err(EditorError::Request(_))));
    }

    #[tokio::test]
    async fn revoked_token_expires_session_on_open() {
        let api = backend();
        let ctx = context(api.clone()).await;
        api.revoke_tokens();

        let result = CertificateEditor::open(
            ctx.clone(),
            FormMode::View(CertificateId::from(10)),
            DashboardScope::Company,
        )
        .await;

        assert!(matches!(result, Err(EditorError::SessionExpired)));
        assert!(!ctx.current().is_authenticated());
    }
}
