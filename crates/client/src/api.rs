//! Backend REST API.
//!
//! The backend is the authority for users and certificates; this module only
//! moves JSON across the wire and classifies failures. A 401 from any
//! authenticated endpoint surfaces as [`ApiError::Unauthorized`] so callers
//! can expire the session.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use certportal_auth::{AuthToken, Role, User};
use certportal_certificates::{CertificatePayload, RawCertificate};
use certportal_core::CertificateId;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Successful login body: `{token, user, role?}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: AuthToken,
    pub user: User,
    /// Some backends send the role next to the profile instead of inside it.
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange<'a> {
    pub old_password: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("session expired")]
    Unauthorized,

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

/// Review decision on a pending certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Approve => "approve",
            ReviewDecision::Reject => "reject",
        }
    }
}

#[async_trait]
pub trait PortalApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError>;

    /// Change the password of the token's owner. Returns a replacement token
    /// when the backend rotates it.
    async fn change_password(
        &self,
        token: &AuthToken,
        old_password: &str,
        new_password: &str,
    ) -> Result<Option<AuthToken>, ApiError>;

    async fn list_certificates(&self, token: &AuthToken) -> Result<Vec<RawCertificate>, ApiError>;

    async fn get_certificate(
        &self,
        token: &AuthToken,
        id: &CertificateId,
    ) -> Result<RawCertificate, ApiError>;

    /// Create a certificate. Returns the stored record when the backend echoes
    /// it back.
    async fn create_certificate(
        &self,
        token: &AuthToken,
        payload: &CertificatePayload,
    ) -> Result<Option<RawCertificate>, ApiError>;

    async fn update_certificate(
        &self,
        token: &AuthToken,
        id: &CertificateId,
        payload: &CertificatePayload,
    ) -> Result<Option<RawCertificate>, ApiError>;

    async fn review_certificate(
        &self,
        token: &AuthToken,
        id: &CertificateId,
        decision: ReviewDecision,
    ) -> Result<(), ApiError>;

    async fn delete_certificate(&self, token: &AuthToken, id: &CertificateId)
    -> Result<(), ApiError>;
}

/// `PortalApi` over HTTP (reqwest).
#[derive(Debug, Clone)]
pub struct HttpPortalApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPortalApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn certificate_url(&self, id: &CertificateId) -> String {
        self.url(&format!("/certificates/{id}"))
    }

    /// Send a request and return the body of a 2xx response.
    async fn send(&self, req: RequestBuilder) -> Result<String, ApiError> {
        let resp = req.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!(body = %body, "backend answered 401");
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let message = flatten_error_body(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }
}

fn parse_json(body: &str) -> Result<Value, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Unwrap `{data: ..}` / `{certificate: ..}` / `{certificates: ..}` envelopes.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            for key in ["data", "certificates", "certificate"] {
                if let Some(inner) = map.remove(key) {
                    if inner.is_object() || inner.is_array() {
                        return inner;
                    }
                    map.insert(key.to_string(), inner);
                }
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn parse_certificate(body: &str) -> Result<RawCertificate, ApiError> {
    let value = unwrap_envelope(parse_json(body)?);
    serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))
}

fn parse_optional_certificate(body: &str) -> Result<Option<RawCertificate>, ApiError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    match unwrap_envelope(parse_json(body)?) {
        value @ Value::Object(_) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ApiError::Parse(e.to_string())),
        _ => Ok(None),
    }
}

/// Collapse a backend error body into one human-readable line.
///
/// Recognized shapes, in order: `{"errors": {field: [msgs]}}`,
/// `{"errors": [msgs]}`, `{"message": ..}`, `{"error": ..}`. A non-JSON body
/// is returned as-is.
pub fn flatten_error_body(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return Some(body.to_string()),
    };

    match value.get("errors") {
        Some(Value::Object(fields)) if !fields.is_empty() => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(field, msgs)| format!("{field}: {}", messages(msgs).join(", ")))
                .collect();
            return Some(parts.join("; "));
        }
        Some(Value::Array(items)) if !items.is_empty() => {
            let parts: Vec<String> = items.iter().flat_map(messages).collect();
            return Some(parts.join("; "));
        }
        _ => {}
    }

    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .or_else(|| value.as_str().map(str::to_string))
}

fn messages(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(messages).collect(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

#[async_trait]
impl PortalApi for HttpPortalApi {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let req = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest { username, password });
        let body = self.send(req).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn change_password(
        &self,
        token: &AuthToken,
        old_password: &str,
        new_password: &str,
    ) -> Result<Option<AuthToken>, ApiError> {
        let req = self
            .client
            .post(self.url("/auth/change-password"))
            .bearer_auth(token.as_str())
            .json(&PasswordChange {
                old_password,
                new_password,
            });
        let body = self.send(req).await?;

        let rotated = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("token").and_then(Value::as_str).map(AuthToken::new));
        Ok(rotated)
    }

    async fn list_certificates(&self, token: &AuthToken) -> Result<Vec<RawCertificate>, ApiError> {
        let req = self
            .client
            .get(self.url("/certificates"))
            .bearer_auth(token.as_str());
        let body = self.send(req).await?;

        match unwrap_envelope(parse_json(&body)?) {
            value @ Value::Array(_) => {
                serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))
            }
            other => Err(ApiError::Parse(format!(
                "expected a list of certificates, got {}",
                kind_of(&other)
            ))),
        }
    }

    async fn get_certificate(
        &self,
        token: &AuthToken,
        id: &CertificateId,
    ) -> Result<RawCertificate, ApiError> {
        let req = self
            .client
            .get(self.certificate_url(id))
            .bearer_auth(token.as_str());
        let body = self.send(req).await?;
        parse_certificate(&body)
    }

    async fn create_certificate(
        &self,
        token: &AuthToken,
        payload: &CertificatePayload,
    ) -> Result<Option<RawCertificate>, ApiError> {
        let req = self
            .client
            .post(self.url("/certificates"))
            .bearer_auth(token.as_str())
            .json(payload);
        let body = self.send(req).await?;
        parse_optional_certificate(&body)
    }

    async fn update_certificate(
        &self,
        token: &AuthToken,
        id: &CertificateId,
        payload: &CertificatePayload,
    ) -> Result<Option<RawCertificate>, ApiError> {
        let req = self
            .client
            .put(self.certificate_url(id))
            .bearer_auth(token.as_str())
            .json(payload);
        let body = self.send(req).await?;
        parse_optional_certificate(&body)
    }

    async fn review_certificate(
        &self,
        token: &AuthToken,
        id: &CertificateId,
        decision: ReviewDecision,
    ) -> Result<(), ApiError> {
        let req = self
            .client
            .post(self.url(&format!("/certificates/{id}/{}", decision.as_str())))
            .bearer_auth(token.as_str());
        self.send(req).await.map(|_| ())
    }

    async fn delete_certificate(
        &self,
        token: &AuthToken,
        id: &CertificateId,
    ) -> Result<(), ApiError> {
        let req = self
            .client
            .delete(self.certificate_url(id))
            .bearer_auth(token.as_str());
        self.send(req).await.map(|_| ())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
