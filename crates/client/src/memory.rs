//! In-process `PortalApi` backend.
//!
//! Holds accounts and certificates in memory and follows the same wire
//! conventions as the HTTP backend: login answers with the role next to the
//! profile, stale tokens get [`ApiError::Unauthorized`], ids are assigned on
//! create. Used by the integration tests and for offline demos.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use certportal_auth::{AuthToken, User};
use certportal_certificates::{CertificatePayload, RawCertificate};
use certportal_core::CertificateId;

use crate::api::{ApiError, LoginResponse, PortalApi, ReviewDecision};

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: User,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    /// token → username
    tokens: HashMap<String, String>,
    certificates: BTreeMap<CertificateId, RawCertificate>,
    failing: BTreeSet<CertificateId>,
    next_id: u64,
    issued: u64,
    unreachable: bool,
    listing_down: bool,
}

#[derive(Debug, Default)]
pub struct MemoryPortalApi {
    state: Mutex<State>,
}

impl MemoryPortalApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_account(self, username: &str, password: &str, user: User) -> Self {
        self.state().accounts.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
                user,
            },
        );
        self
    }

    /// Seed a certificate. Its id is taken from the record.
    pub fn with_certificate(self, raw: RawCertificate) -> Self {
        if let Some(id) = raw.id.as_ref().and_then(|v| CertificateId::from_json(v).ok()) {
            let mut state = self.state();
            if let Ok(n) = id.as_str().parse::<u64>() {
                state.next_id = state.next_id.max(n);
            }
            state.certificates.insert(id, raw);
        }
        self
    }

    /// Invalidate every issued token; the next authenticated call gets a 401.
    pub fn revoke_tokens(&self) {
        self.state().tokens.clear();
    }

    /// Make every mutation of `id` fail with a 500.
    pub fn fail_mutations_for(&self, id: CertificateId) {
        self.state().failing.insert(id);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Make collection fetches fail with a 503 while other calls succeed.
    pub fn set_listing_unavailable(&self, down: bool) {
        self.state().listing_down = down;
    }

    pub fn certificate(&self, id: &CertificateId) -> Option<RawCertificate> {
        self.state().certificates.get(id).cloned()
    }

    fn authorize(&self, token: &AuthToken) -> Result<MutexGuard<'_, State>, ApiError> {
        let state = self.state();
        if state.unreachable {
            return Err(ApiError::Network("connection refused".into()));
        }
        if !state.tokens.contains_key(token.as_str()) {
            return Err(ApiError::Unauthorized);
        }
        Ok(state)
    }
}

fn not_found(id: &CertificateId) -> ApiError {
    ApiError::Api {
        status: 404,
        message: format!("certificate {id} not found"),
    }
}

fn check_mutable(state: &State, id: &CertificateId) -> Result<(), ApiError> {
    if state.failing.contains(id) {
        return Err(ApiError::Api {
            status: 500,
            message: format!("could not update certificate {id}"),
        });
    }
    if !state.certificates.contains_key(id) {
        return Err(not_found(id));
    }
    Ok(())
}

fn to_raw(payload: &CertificatePayload) -> Result<RawCertificate, ApiError> {
    serde_json::to_value(payload)
        .and_then(serde_json::from_value)
        .map_err(|e| ApiError::Parse(e.to_string()))
}

#[async_trait]
impl PortalApi for MemoryPortalApi {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let mut state = self.state();
        if state.unreachable {
            return Err(ApiError::Network("connection refused".into()));
        }

        let account = match state.accounts.get(username) {
            Some(account) if account.password == password => account.clone(),
            _ => return Err(ApiError::Unauthorized),
        };

        state.issued += 1;
        let token = format!("mem-{}-{}", username, state.issued);
        state.tokens.insert(token.clone(), username.to_string());

        let mut user = account.user;
        let role = user.role.take();
        Ok(LoginResponse {
            token: AuthToken::new(token),
            user,
            role,
        })
    }

    async fn change_password(
        &self,
        token: &AuthToken,
        old_password: &str,
        new_password: &str,
    ) -> Result<Option<AuthToken>, ApiError> {
        let mut state = self.authorize(token)?;
        let username = state
            .tokens
            .get(token.as_str())
            .cloned()
            .ok_or(ApiError::Unauthorized)?;
        let account = state
            .accounts
            .get_mut(&username)
            .ok_or(ApiError::Unauthorized)?;

        if account.password != old_password {
            return Err(ApiError::Api {
                status: 400,
                message: "current password is incorrect".into(),
            });
        }
        account.password = new_password.to_string();
        Ok(None)
    }

    async fn list_certificates(&self, token: &AuthToken) -> Result<Vec<RawCertificate>, ApiError> {
        let state = self.authorize(token)?;
        if state.listing_down {
            return Err(ApiError::Api {
                status: 503,
                message: "certificate listing unavailable".into(),
            });
        }
        Ok(state.certificates.values().cloned().collect())
    }

    async fn get_certificate(
        &self,
        token: &AuthToken,
        id: &CertificateId,
    ) -> Result<RawCertificate, ApiError> {
        let state = self.authorize(token)?;
        state.certificates.get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn create_certificate(
        &self,
        token: &AuthToken,
        payload: &CertificatePayload,
    ) -> Result<Option<RawCertificate>, ApiError> {
        let mut state = self.authorize(token)?;
        state.next_id += 1;
        let id = CertificateId::from(state.next_id);

        let mut raw = to_raw(payload)?;
        raw.id = Some(Value::from(state.next_id));
        state.certificates.insert(id, raw.clone());
        Ok(Some(raw))
    }

    async fn update_certificate(
        &self,
        token: &AuthToken,
        id: &CertificateId,
        payload: &CertificatePayload,
    ) -> Result<Option<RawCertificate>, ApiError> {
        let mut state = self.authorize(token)?;
        check_mutable(&state, id)?;

        let mut raw = to_raw(payload)?;
        raw.id = Some(Value::String(id.to_string()));
        state.certificates.insert(id.clone(), raw.clone());
        Ok(Some(raw))
    }

    async fn review_certificate(
        &self,
        token: &AuthToken,
        id: &CertificateId,
        decision: ReviewDecision,
    ) -> Result<(), ApiError> {
        let mut state = self.authorize(token)?;
        check_mutable(&state, id)?;

        let status = match decision {
            ReviewDecision::Approve => "APPROVED",
            ReviewDecision::Reject => "REJECTED",
        };
        if let Some(raw) = state.certificates.get_mut(id) {
            raw.status = Some(Value::from(status));
        }
        Ok(())
    }

    async fn delete_certificate(
        &self,
        token: &AuthToken,
        id: &CertificateId,
    ) -> Result<(), ApiError> {
        let mut state = self.authorize(token)?;
        check_mutable(&state, id)?;
        state.certificates.remove(id);
        Ok(())
    }
}
