//! Subcommand handlers.

use std::collections::BTreeSet;
use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};
use serde_json::Value;

use certportal_auth::{GuardDecision, routes::LOGIN_PATH};
use certportal_certificates::{CertificateRow, FormField, FormMode, StatusTab};
use certportal_client::{
    BulkAction, CertificateEditor, DashboardScope, DashboardShell, PortalContext,
};
use certportal_core::CertificateId;

fn prompt(label: &str) -> Result<String> {
    eprint!("{label}: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// The signed-in user's scope, or a hint to sign in.
fn require_scope(ctx: &PortalContext) -> Result<DashboardScope> {
    let session = ctx.current();
    if !session.is_authenticated() {
        bail!("not signed in; run `certportal login <username>` first");
    }
    DashboardScope::for_session(&session).context("this account has no dashboard")
}

/// Pass the guard for `path` the same way a page load would.
fn enter(ctx: &PortalContext, path: &str) -> Result<()> {
    match ctx.navigator().visit(path) {
        GuardDecision::Allow => Ok(()),
        GuardDecision::Redirect(LOGIN_PATH) => {
            bail!("not signed in; run `certportal login <username>` first")
        }
        GuardDecision::Redirect(to) => bail!("access to {path} denied (redirected to {to})"),
    }
}

pub async fn login(ctx: &PortalContext, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt("Password")?,
    };
    let user = ctx.auth().login(username, &password).await?;
    let role = user.role.as_ref().map(|r| r.as_str()).unwrap_or("no role");
    println!("Signed in as {} ({role})", user.display_name);
    println!("Dashboard: {}", ctx.navigator().landing_path());
    Ok(())
}

pub async fn logout(ctx: &PortalContext) -> Result<()> {
    ctx.auth().logout().await;
    println!("Signed out");
    Ok(())
}

pub fn whoami(ctx: &PortalContext) -> Result<()> {
    let session = ctx.current();
    if !session.is_authenticated() {
        println!("Not signed in");
        return Ok(());
    }
    match session.user() {
        Some(user) => {
            println!("User:      {} (id {})", user.display_name, user.id);
            println!(
                "Role:      {}",
                user.role.as_ref().map(|r| r.as_str()).unwrap_or("-")
            );
            println!("Admin:     {}", if user.is_admin { "yes" } else { "no" });
        }
        None => println!("Signed in (no stored profile)"),
    }
    println!("Dashboard: {}", ctx.navigator().landing_path());
    Ok(())
}

pub async fn passwd(ctx: &PortalContext, old: Option<String>, new: Option<String>) -> Result<()> {
    if !ctx.current().is_authenticated() {
        bail!("not signed in; run `certportal login <username>` first");
    }
    let old = match old {
        Some(old) => old,
        None => prompt("Current password")?,
    };
    let new = match new {
        Some(new) => new,
        None => prompt("New password")?,
    };
    ctx.auth().update_password(&old, &new).await?;
    println!("Password updated");
    Ok(())
}

pub fn visit(ctx: &PortalContext, path: &str) -> Result<()> {
    match ctx.navigator().visit(path) {
        GuardDecision::Allow => println!("{path}: allowed"),
        GuardDecision::Redirect(to) => println!("{path}: redirected to {to}"),
    }
    Ok(())
}

async fn open_shell(ctx: &PortalContext) -> Result<DashboardShell> {
    let scope = require_scope(ctx)?;
    enter(ctx, scope.dashboard_path())?;
    let mut shell = DashboardShell::new(ctx.clone(), scope);
    shell.enter(scope.dashboard_path()).await?;
    Ok(shell)
}

pub async fn certificates(
    ctx: &PortalContext,
    tab: StatusTab,
    search: Option<String>,
) -> Result<()> {
    let mut shell = open_shell(ctx).await?;
    shell.set_tab(tab);
    if let Some(search) = search {
        shell.set_search(search);
    }

    let rows = shell.rows();
    if rows.is_empty() {
        println!("No certificates");
        return Ok(());
    }
    print_rows(&rows);
    println!("{} of {} certificate(s)", rows.len(), shell.certificates().len());
    Ok(())
}

fn print_rows(rows: &[CertificateRow]) {
    println!(
        "{:<8} {:<22} {:<28} {:<14} {:<12} {:>8} {:>16} {:>14} {:<9}",
        "ID", "CERT NO", "INSURED", "POLICY", "TRANS DATE", "RATE", "INSURED VALUE", "PREMIUM", "STATUS"
    );
    for row in rows {
        println!(
            "{:<8} {:<22} {:<28} {:<14} {:<12} {:>8} {:>16} {:>14} {:<9}",
            row.id,
            row.cert_no,
            row.insured_name,
            row.policy_no,
            row.trans_date,
            row.rate,
            row.insured_value,
            row.gross_premium,
            row.status.as_str(),
        );
    }
}

pub async fn show(ctx: &PortalContext, id: CertificateId) -> Result<()> {
    let scope = require_scope(ctx)?;
    enter(ctx, "/certificates")?;
    let editor = CertificateEditor::open(ctx.clone(), FormMode::resolve(true, Some(id)), scope).await?;

    for field in editor.fields() {
        println!("{:<18} {}", field.label, field.value);
    }
    for (key, value) in &editor.form().draft().extra {
        println!("{:<18} {}", key, value);
    }
    Ok(())
}

/// Create (`id == None`) or edit a certificate from `FIELD=VALUE` pairs.
/// Keys that are not form fields go to the extension slots.
pub async fn save(ctx: &PortalContext, id: Option<CertificateId>, fields: &[String]) -> Result<()> {
    let scope = require_scope(ctx)?;
    enter(ctx, "/certificates")?;
    let mut editor = CertificateEditor::open(ctx.clone(), FormMode::resolve(false, id), scope).await?;

    for pair in fields {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("expected FIELD=VALUE, got '{pair}'"))?;
        match key.parse::<FormField>() {
            Ok(field) => editor
                .set(field, value)
                .with_context(|| format!("invalid value for {key}"))?,
            Err(_) => editor.set_extra(key.trim(), Value::String(value.to_string()))?,
        }
    }

    let outcome = editor.submit().await?;
    match outcome.certificate_id {
        Some(id) => println!("Saved certificate {id}"),
        None => println!("Saved certificate"),
    }
    println!("Back to {}", outcome.return_to);
    Ok(())
}

pub async fn bulk(ctx: &PortalContext, action: BulkAction, ids: Vec<CertificateId>) -> Result<()> {
    let mut shell = open_shell(ctx).await?;

    let wanted: BTreeSet<CertificateId> = ids.into_iter().collect();
    for id in &wanted {
        if !shell.toggle(id) {
            bail!("certificate {id} is not on your dashboard");
        }
    }

    let outcome = match action {
        BulkAction::Approve => shell.approve().await?,
        BulkAction::Reject => shell.reject().await?,
        BulkAction::Delete => shell.delete().await?,
    };

    println!("{}", outcome.summary());
    if !outcome.is_complete() {
        bail!("{} of {} certificate(s) failed", outcome.failed.len(), wanted.len());
    }
    Ok(())
}
