//! End-to-end portal flows against the in-memory backend.

use std::sync::Arc;

use certportal_auth::{GuardDecision, User};
use certportal_certificates::{FormField, FormMode, RawCertificate, StatusTab};
use certportal_client::{
    CertificateEditor, CredentialStorage, DashboardScope, DashboardShell, EditorError,
    MemoryPortalApi, MemoryStorage, PortalContext, ShellError, SqliteStorage,
};
use certportal_core::{CertificateId, UserId};
use serde_json::json;

fn certificate(id: u64, status: &str) -> RawCertificate {
    serde_json::from_value(json!({
        "id": id,
        "certNo": format!("CERT-{id}"),
        "insuredName": format!("Insured {id}"),
        "rate": 1,
        "insuredValue": 1000,
        "status": status,
        "field3": "hull"
    }))
    .unwrap()
}

fn backend() -> Arc<MemoryPortalApi> {
    Arc::new(
        MemoryPortalApi::new()
            .with_account(
                "jane",
                "secret",
                User::new(UserId::new("42").unwrap(), "Jane Broker").with_role("Broker"),
            )
            .with_account(
                "acme",
                "secret",
                User::new(UserId::new("7").unwrap(), "Acme Insurance").with_role("company"),
            )
            .with_account(
                "root",
                "secret",
                User::new(UserId::new("1").unwrap(), "Root")
                    .with_role("broker")
                    .with_admin(true),
            )
            .with_certificate(certificate(1, "PENDING"))
            .with_certificate(certificate(2, "PENDING"))
            .with_certificate(certificate(3, "APPROVED"))
            .with_certificate(certificate(4, "REJECTED"))
            .with_certificate(certificate(5, "PENDING")),
    )
}

async fn signed_in(api: Arc<MemoryPortalApi>, username: &str) -> PortalContext {
    let ctx = PortalContext::with_parts(api, Arc::new(MemoryStorage::new()))
        .await
        .unwrap();
    ctx.auth().login(username, "secret").await.unwrap();
    ctx
}

#[tokio::test]
async fn broker_login_lands_on_broker_dashboard() {
    let ctx = signed_in(backend(), "jane").await;
    let nav = ctx.navigator();

    assert_eq!(nav.landing_path(), "/brokers/dashboard");
    assert!(nav.visit("/brokers/dashboard").is_allowed());
    assert_eq!(
        nav.visit("/company/dashboard"),
        GuardDecision::Redirect("/brokers/dashboard")
    );
}

#[tokio::test]
async fn admin_flag_beats_role() {
    let ctx = signed_in(backend(), "root").await;
    assert_eq!(ctx.navigator().landing_path(), "/admin/dashboard");
    assert!(ctx.navigator().visit("/admin/users").is_allowed());

    let shell = DashboardShell::for_session(ctx).unwrap();
    assert_eq!(shell.scope(), DashboardScope::Admin);
}

#[tokio::test]
async fn logout_twice_matches_logout_once() {
    let ctx = signed_in(backend(), "jane").await;

    ctx.auth().logout().await;
    let once = ctx.current();
    ctx.auth().logout().await;

    assert_eq!(ctx.current(), once);
    assert_eq!(
        ctx.navigator().visit("/brokers/dashboard"),
        GuardDecision::Redirect("/login")
    );
}

#[tokio::test]
async fn created_certificate_views_back_identically() {
    let api = backend();
    let ctx = signed_in(api.clone(), "acme").await;

    let mut editor = CertificateEditor::open(ctx.clone(), FormMode::Create, DashboardScope::Company)
        .await
        .unwrap();
    editor.set(FormField::InsuredName, "Harbour Freight Ltd").unwrap();
    editor.set(FormField::PolicyNo, "POL-9").unwrap();
    editor.set(FormField::Rate, "12.5").unwrap();
    editor.set(FormField::InsuredValue, "8000").unwrap();
    editor.set_extra("field101", json!("marine")).unwrap();
    let submitted = editor.form().draft().clone();

    let outcome = editor.submit().await.unwrap();
    assert_eq!(outcome.return_to, "/company/dashboard");
    let id = outcome.certificate_id.unwrap();

    let view = CertificateEditor::open(ctx, FormMode::resolve(true, Some(id)), DashboardScope::Company)
        .await
        .unwrap();
    let viewed = view.form().draft();

    assert_eq!(viewed.cert_no, submitted.cert_no);
    assert_eq!(viewed.insured_name, "Harbour Freight Ltd");
    assert_eq!(viewed.policy_no, "POL-9");
    assert_eq!(viewed.rate, 12.5);
    assert_eq!(viewed.insured_value, 8000.0);
    assert_eq!(viewed.gross_premium(), 1000.0);
    assert_eq!(viewed.status, submitted.status);
    assert_eq!(viewed.extra.get("field101"), Some(&json!("marine")));
}

#[tokio::test]
async fn filtered_select_all_then_tab_switch_empties_selection() {
    let ctx = signed_in(backend(), "acme").await;
    let mut shell = DashboardShell::for_session(ctx).unwrap();
    shell.enter("/companies/dashboard").await.unwrap();

    shell.set_tab(StatusTab::Pending);
    shell.select_all_visible();
    assert_eq!(shell.visible().len(), 3);
    assert_eq!(
        shell.selection().to_vec(),
        vec![
            CertificateId::from(1),
            CertificateId::from(2),
            CertificateId::from(5)
        ]
    );

    shell.set_tab(StatusTab::Approved);
    assert!(shell.selection().is_empty());
}

#[tokio::test]
async fn unauthorized_fetch_clears_session_and_redirects_to_login() {
    let api = backend();
    let ctx = signed_in(api.clone(), "acme").await;
    let nav = ctx.navigator();
    let mut shell = DashboardShell::for_session(ctx.clone()).unwrap();
    shell.refresh().await.unwrap();
    shell.toggle(&CertificateId::from(1));

    api.revoke_tokens();
    let err = shell.refresh().await.unwrap_err();

    assert_eq!(err, ShellError::SessionExpired);
    assert!(shell.certificates().is_empty());
    assert!(shell.selection().is_empty());
    assert!(!ctx.current().is_authenticated());
    assert_eq!(nav.visit("/company/dashboard"), GuardDecision::Redirect("/login"));
}

#[tokio::test]
async fn partial_bulk_failure_is_reported() {
    let api = backend();
    api.fail_mutations_for(CertificateId::from(2));
    let ctx = signed_in(api.clone(), "acme").await;
    let mut shell = DashboardShell::for_session(ctx).unwrap();
    shell.refresh().await.unwrap();
    shell.set_tab(StatusTab::Pending);
    shell.select_all_visible();

    let outcome = shell.reject().await.unwrap();

    assert_eq!(
        outcome.succeeded,
        vec![CertificateId::from(1), CertificateId::from(5)]
    );
    assert_eq!(outcome.failed.len(), 1);
    assert!(shell.selection().is_empty());
    let pending: Vec<_> = shell.visible().iter().map(|c| c.id.clone()).collect();
    assert_eq!(pending, vec![CertificateId::from(2)]);
}

#[tokio::test]
async fn editing_after_revocation_reports_expiry() {
    let api = backend();
    let ctx = signed_in(api.clone(), "acme").await;
    let mut editor = CertificateEditor::open(
        ctx.clone(),
        FormMode::Edit(CertificateId::from(1)),
        DashboardScope::Company,
    )
    .await
    .unwrap();
    editor.set(FormField::Rate, "3").unwrap();

    api.revoke_tokens();

    assert_eq!(editor.submit().await, Err(EditorError::SessionExpired));
    assert!(!ctx.current().is_authenticated());
}

#[tokio::test]
async fn session_survives_restart_with_sqlite_storage() {
    let api = backend();
    let storage: Arc<dyn CredentialStorage> = Arc::new(SqliteStorage::in_memory().unwrap());

    let first = PortalContext::with_parts(api.clone(), storage.clone())
        .await
        .unwrap();
    first.auth().login("jane", "secret").await.unwrap();

    let second = PortalContext::with_parts(api, storage).await.unwrap();
    let session = second.current();
    assert!(session.is_authenticated());
    assert_eq!(session.user().map(|u| u.display_name.as_str()), Some("Jane Broker"));
    assert_eq!(second.navigator().landing_path(), "/brokers/dashboard");
}
