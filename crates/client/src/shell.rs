//! Per-role dashboard shell.
//!
//! A shell owns one scope's certificate collection, its filter, its
//! selection and its load state. Mutations go through commands (`approve`,
//! `reject`, `delete`, `refresh`); the shell alone prunes the selection.

use thiserror::Error;

use certportal_auth::{AuthToken, RoleKind, Session};
use certportal_certificates::{
    Certificate, CertificateFilter, CertificateRow, SelectionSet, StatusTab,
};
use certportal_core::CertificateId;

use crate::api::{ApiError, ReviewDecision};
use crate::context::PortalContext;

/// Which dashboard a session is entitled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardScope {
    Company,
    Broker,
    Client,
    Admin,
}

impl DashboardScope {
    /// Admin flag first, then role.
    pub fn for_session(session: &Session) -> Option<Self> {
        if !session.is_authenticated() {
            return None;
        }
        if session.is_admin() {
            return Some(DashboardScope::Admin);
        }
        match session.role().and_then(|r| r.kind())? {
            RoleKind::Company => Some(DashboardScope::Company),
            RoleKind::Broker => Some(DashboardScope::Broker),
            RoleKind::Client => Some(DashboardScope::Client),
            RoleKind::Admin => Some(DashboardScope::Admin),
        }
    }

    /// URL sections owned by this scope.
    pub fn sections(&self) -> &'static [&'static str] {
        match self {
            DashboardScope::Company => &["/company", "/companies"],
            DashboardScope::Broker => &["/brokers"],
            DashboardScope::Client => &["/customer"],
            DashboardScope::Admin => &["/admin"],
        }
    }

    pub fn dashboard_path(&self) -> &'static str {
        match self {
            DashboardScope::Company => "/company/dashboard",
            DashboardScope::Broker => "/brokers/dashboard",
            DashboardScope::Client => "/customer/dashboard",
            DashboardScope::Admin => "/admin/dashboard",
        }
    }

    pub fn owns(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        self.sections().iter().any(|section| {
            path == *section
                || path
                    .strip_prefix(section)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Only insurers and admins approve, reject or delete.
    pub fn can_review(&self) -> bool {
        matches!(self, DashboardScope::Company | DashboardScope::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DashboardScope::Company => "company",
            DashboardScope::Broker => "broker",
            DashboardScope::Client => "client",
            DashboardScope::Admin => "admin",
        }
    }
}

impl core::fmt::Display for DashboardScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShellError {
    #[error("session expired, please sign in again")]
    SessionExpired,

    #[error("not signed in")]
    NotAuthenticated,

    #[error("no dashboard for this account")]
    NoDashboard,

    #[error("the {0} dashboard cannot review certificates")]
    Forbidden(DashboardScope),

    #[error("no certificates selected")]
    EmptySelection,

    #[error("{0}")]
    Request(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(ShellError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkAction {
    Approve,
    Reject,
    Delete,
}

impl BulkAction {
    fn past_tense(&self) -> &'static str {
        match self {
            BulkAction::Approve => "approved",
            BulkAction::Reject => "rejected",
            BulkAction::Delete => "deleted",
        }
    }
}

impl core::fmt::Display for BulkAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            BulkAction::Approve => "approve",
            BulkAction::Reject => "reject",
            BulkAction::Delete => "delete",
        })
    }
}

/// Per-id result of a bulk action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    pub action: BulkAction,
    pub succeeded: Vec<CertificateId>,
    pub failed: Vec<(CertificateId, String)>,
    /// Set when the follow-up refetch failed; the loaded rows may be stale.
    pub refresh_error: Option<ShellError>,
}

impl BulkOutcome {
    fn new(action: BulkAction) -> Self {
        Self {
            action,
            succeeded: Vec::new(),
            failed: Vec::new(),
            refresh_error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        let total = self.succeeded.len() + self.failed.len();
        let mut out = format!(
            "{} {} of {} certificate(s)",
            self.action.past_tense(),
            self.succeeded.len(),
            total
        );
        if !self.failed.is_empty() {
            let failures: Vec<String> = self
                .failed
                .iter()
                .map(|(id, reason)| format!("{id} ({reason})"))
                .collect();
            out.push_str(&format!("; failed: {}", failures.join(", ")));
        }
        if let Some(err) = &self.refresh_error {
            out.push_str(&format!("; list not refreshed: {err}"));
        }
        out
    }
}

pub struct DashboardShell {
    ctx: PortalContext,
    scope: DashboardScope,
    certificates: Vec<Certificate>,
    filter: CertificateFilter,
    selection: SelectionSet,
    state: LoadState,
    inside: bool,
}

impl DashboardShell {
    pub fn new(ctx: PortalContext, scope: DashboardScope) -> Self {
        Self {
            ctx,
            scope,
            certificates: Vec::new(),
            filter: CertificateFilter::default(),
            selection: SelectionSet::new(),
            state: LoadState::Idle,
            inside: false,
        }
    }

    /// The shell for the signed-in user's own dashboard.
    pub fn for_session(ctx: PortalContext) -> Result<Self, ShellError> {
        let session = ctx.current();
        if !session.is_authenticated() {
            return Err(ShellError::NotAuthenticated);
        }
        let scope = DashboardScope::for_session(&session).ok_or(ShellError::NoDashboard)?;
        Ok(Self::new(ctx, scope))
    }

    /// Track navigation. Entering the scope's section fetches the collection;
    /// moving around inside it does not. Returns whether a fetch happened.
    pub async fn enter(&mut self, path: &str) -> Result<bool, ShellError> {
        if !self.scope.owns(path) {
            self.inside = false;
            return Ok(false);
        }
        if self.inside {
            return Ok(false);
        }
        self.inside = true;
        self.refresh().await?;
        Ok(true)
    }

    /// Refetch the collection. Returns the number of certificates loaded.
    pub async fn refresh(&mut self) -> Result<usize, ShellError> {
        self.state = LoadState::Loading;

        let Some(token) = self.ctx.token() else {
            self.reset();
            return Err(self.fail(ShellError::NotAuthenticated));
        };

        let raw = match self.ctx.api().list_certificates(&token).await {
            Ok(raw) => raw,
            Err(err) => return Err(self.request_failed(&token, err, "certificate fetch").await),
        };

        let mut certificates = Vec::with_capacity(raw.len());
        for record in &raw {
            match Certificate::from_raw(record) {
                Ok(certificate) => certificates.push(certificate),
                Err(err) => tracing::warn!(error = %err, "skipping malformed certificate record"),
            }
        }

        let pruned = self.selection.retain_loaded(&certificates);
        if pruned > 0 {
            tracing::debug!(pruned, "dropped stale selections");
        }
        self.certificates = certificates;
        self.state = LoadState::Ready;

        tracing::debug!(scope = %self.scope, count = self.certificates.len(), "collection loaded");
        Ok(self.certificates.len())
    }

    pub async fn retry(&mut self) -> Result<usize, ShellError> {
        self.refresh().await
    }

    pub fn dismiss_error(&mut self) {
        if matches!(self.state, LoadState::Failed(_)) {
            self.state = if self.certificates.is_empty() {
                LoadState::Idle
            } else {
                LoadState::Ready
            };
        }
    }

    /// Toggle a loaded certificate. Unknown ids are ignored.
    pub fn toggle(&mut self, id: &CertificateId) -> bool {
        if !self.certificates.iter().any(|c| &c.id == id) {
            return false;
        }
        self.selection.toggle(id)
    }

    /// Select exactly the certificates visible under the current filter.
    pub fn select_all_visible(&mut self) {
        let visible = self.filter.apply(&self.certificates);
        self.selection.select_all(visible);
    }

    pub fn all_visible_selected(&self) -> bool {
        self.selection.covers(self.filter.apply(&self.certificates))
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Switching tabs drops the selection.
    pub fn set_tab(&mut self, tab: StatusTab) {
        if self.filter.tab != tab {
            self.selection.clear();
        }
        self.filter.tab = tab;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.filter.search = search.into();
    }

    pub async fn approve(&mut self) -> Result<BulkOutcome, ShellError> {
        self.bulk(BulkAction::Approve).await
    }

    pub async fn reject(&mut self) -> Result<BulkOutcome, ShellError> {
        self.bulk(BulkAction::Reject).await
    }

    /// Delete the selection. Rows disappear before the backend confirms; the
    /// follow-up refresh brings back any that failed.
    pub async fn delete(&mut self) -> Result<BulkOutcome, ShellError> {
        self.bulk(BulkAction::Delete).await
    }

    async fn bulk(&mut self, action: BulkAction) -> Result<BulkOutcome, ShellError> {
        if !self.scope.can_review() {
            return Err(ShellError::Forbidden(self.scope));
        }
        if self.selection.is_empty() {
            return Err(ShellError::EmptySelection);
        }
        let Some(token) = self.ctx.token() else {
            self.reset();
            return Err(ShellError::NotAuthenticated);
        };

        let targets = self.selection.to_vec();
        if action == BulkAction::Delete {
            self.certificates.retain(|c| !self.selection.contains(&c.id));
        }

        let api = self.ctx.api().clone();
        let mut outcome = BulkOutcome::new(action);
        for id in targets {
            let result = match action {
                BulkAction::Approve => {
                    api.review_certificate(&token, &id, ReviewDecision::Approve)
                        .await
                }
                BulkAction::Reject => api.review_certificate(&token, &id, ReviewDecision::Reject).await,
                BulkAction::Delete => api.delete_certificate(&token, &id).await,
            };
            match result {
                Ok(()) => outcome.succeeded.push(id),
                Err(err) => {
                    if self.ctx.expire_on_unauthorized(&token, &err, "bulk action").await {
                        self.reset();
                        self.state = LoadState::Failed(ShellError::SessionExpired);
                        return Err(ShellError::SessionExpired);
                    }
                    tracing::warn!(certificate_id = %id, %action, error = %err, "bulk action failed");
                    outcome.failed.push((id, err.to_string()));
                }
            }
        }

        self.selection.clear();
        tracing::info!(
            scope = %self.scope,
            %action,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "bulk action finished"
        );

        match self.refresh().await {
            Ok(_) => {}
            Err(ShellError::SessionExpired) => return Err(ShellError::SessionExpired),
            Err(err) => {
                tracing::warn!(%action, error = %err, "refetch after bulk action failed");
                outcome.refresh_error = Some(err);
            }
        }
        Ok(outcome)
    }

    async fn request_failed(&mut self, token: &AuthToken, err: ApiError, during: &str) -> ShellError {
        if self.ctx.expire_on_unauthorized(token, &err, during).await {
            self.reset();
            return self.fail(ShellError::SessionExpired);
        }
        tracing::warn!(error = %err, "{during} failed");
        self.fail(ShellError::Request(err.to_string()))
    }

    fn fail(&mut self, err: ShellError) -> ShellError {
        self.state = LoadState::Failed(err.clone());
        err
    }

    fn reset(&mut self) {
        self.certificates.clear();
        self.selection.clear();
        self.inside = false;
    }

    pub fn scope(&self) -> DashboardScope {
        self.scope
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn filter(&self) -> &CertificateFilter {
        &self.filter
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    pub fn visible(&self) -> Vec<&Certificate> {
        self.filter.apply(&self.certificates)
    }

    /// Display rows for the visible certificates.
    pub fn rows(&self) -> Vec<CertificateRow> {
        self.visible().into_iter().map(Certificate::to_row).collect()
    }
}
