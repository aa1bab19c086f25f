//! Runtime configuration, read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

pub const API_URL_VAR: &str = "CERTPORTAL_API_URL";
pub const DATA_DIR_VAR: &str = "CERTPORTAL_DATA_DIR";
pub const REQUEST_TIMEOUT_VAR: &str = "CERTPORTAL_REQUEST_TIMEOUT_SECS";

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub api_url: String,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
}

impl PortalConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = get(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let data_dir = match get(DATA_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let request_timeout = match get(REQUEST_TIMEOUT_VAR) {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{REQUEST_TIMEOUT_VAR} must be whole seconds, got '{raw}'"))?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            api_url,
            data_dir,
            request_timeout,
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("credentials.db")
    }
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let mut dir = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory")?;
    dir.push("certportal");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn explicit_values_win() {
        let config = PortalConfig::from_lookup(lookup(&[
            (API_URL_VAR, "https://portal.example"),
            (DATA_DIR_VAR, "/tmp/certportal"),
            (REQUEST_TIMEOUT_VAR, "5"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://portal.example");
        assert_eq!(
            config.credentials_path(),
            PathBuf::from("/tmp/certportal/credentials.db")
        );
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = PortalConfig::from_lookup(lookup(&[
            (API_URL_VAR, "  "),
            (DATA_DIR_VAR, "/data"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn bad_timeout_is_an_error() {
        let err = PortalConfig::from_lookup(lookup(&[
            (DATA_DIR_VAR, "/data"),
            (REQUEST_TIMEOUT_VAR, "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(REQUEST_TIMEOUT_VAR));
    }
}
