//! Client configuration, from a config file section or the environment.

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::auth::session::{DEFAULT_ACCESS_DENIED_PATH, DEFAULT_LOGIN_PATH};

pub const BASE_URL_VAR: &str = "BACKOFFICE_API_URL";
pub const REFRESH_LEAD_VAR: &str = "BACKOFFICE_REFRESH_LEAD_SECS";
pub const REQUEST_TIMEOUT_VAR: &str = "BACKOFFICE_REQUEST_TIMEOUT_SECS";
pub const LOGIN_PATH_VAR: &str = "BACKOFFICE_LOGIN_PATH";
pub const ACCESS_DENIED_PATH_VAR: &str = "BACKOFFICE_ACCESS_DENIED_PATH";

/// How long before expiry an access token is refreshed.
const DEFAULT_REFRESH_LEAD_SECS: u64 = 120;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub base_url: String,
    #[serde(default = "default_refresh_lead_secs")]
    pub refresh_lead_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_access_denied_path")]
    pub access_denied_path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("env var {0} is not set")]
    Missing(&'static str),
    #[error("env var {key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("invalid base url {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },
}

fn default_refresh_lead_secs() -> u64 {
    DEFAULT_REFRESH_LEAD_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_owned()
}

fn default_access_denied_path() -> String {
    DEFAULT_ACCESS_DENIED_PATH.to_owned()
}

impl Config {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_lead_secs: DEFAULT_REFRESH_LEAD_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            login_path: default_login_path(),
            access_denied_path: default_access_denied_path(),
        }
    }

    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the `BACKOFFICE_*` variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let base_url = lookup(BASE_URL_VAR)
            .filter(|value| !value.trim().is_empty())
            .ok_or(Error::Missing(BASE_URL_VAR))?;
        let mut config = Self::new(base_url);

        if let Some(secs) = parse_secs(&lookup, REFRESH_LEAD_VAR)? {
            config.refresh_lead_secs = secs;
        }
        if let Some(secs) = parse_secs(&lookup, REQUEST_TIMEOUT_VAR)? {
            config.request_timeout_secs = secs;
        }
        if let Some(path) = lookup(LOGIN_PATH_VAR) {
            config.login_path = path;
        }
        if let Some(path) = lookup(ACCESS_DENIED_PATH_VAR) {
            config.access_denied_path = path;
        }

        config.base_url()?;
        Ok(config)
    }

    pub fn base_url(&self) -> Result<Url, Error> {
        let invalid = |reason: String| Error::BaseUrl {
            url: self.base_url.clone(),
            reason,
        };
        let url = Url::parse(&self.base_url).map_err(|err| invalid(err.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(invalid(format!("unsupported scheme {scheme}"))),
        }
    }

    pub fn refresh_lead_time(&self) -> Duration {
        Duration::from_secs(self.refresh_lead_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, Error> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| Error::Invalid { key, value })
        })
        .transpose()
}
