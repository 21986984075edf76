//! Node connection settings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default node endpoint (mainnet RPC port on localhost).
const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8332";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Node RPC configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Node URL
    pub url: String,
    /// Basic-auth user
    pub user: Option<String>,
    /// Basic-auth password
    pub password: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RPC_URL.into(),
            user: None,
            password: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RpcConfig {
    /// Creates a configuration for `url` with no credentials.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets basic-auth credentials.
    pub fn with_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Reads `OBSCURITY_RPC_URL`, `OBSCURITY_RPC_USER`,
    /// `OBSCURITY_RPC_PASSWORD` and `OBSCURITY_RPC_TIMEOUT`, loading a `.env`
    /// file first if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            url: lookup("OBSCURITY_RPC_URL").unwrap_or(defaults.url),
            user: lookup("OBSCURITY_RPC_USER").filter(|u| !u.is_empty()),
            password: lookup("OBSCURITY_RPC_PASSWORD"),
            timeout_seconds: lookup("OBSCURITY_RPC_TIMEOUT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_seconds),
        }
    }
}

impl fmt::Debug for RpcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}
