//! Endpoint configuration for [`LokiClient`](crate::LokiClient).
//!
//! A [`LokiConfig`] is built either in code:
//!
//! ```rust
//! use std::time::Duration;
//! use loki_client::{Credentials, LokiConfig};
//!
//! let config = LokiConfig::new("https://logs.example.com")
//!     .with_credentials(Credentials::basic("reader", "s3cret"))
//!     .with_org_id("team-a")
//!     .with_timeout(Duration::from_secs(10));
//! ```
//!
//! or from the environment with [`LokiConfig::from_env`]:
//!
//! - `LOKI_URL`: base URL (default `http://127.0.0.1:3100`)
//! - `LOKI_USERNAME` / `LOKI_PASSWORD`: HTTP basic auth
//! - `LOKI_BEARER_TOKEN`: bearer token (wins over basic auth)
//! - `LOKI_ORG_ID`: tenant sent as `X-Scope-OrgID`
//! - `LOKI_TIMEOUT_SECS`: request timeout in seconds
//! - `LOKI_TLS_INSECURE`: set to "true" to skip certificate verification

use std::fmt;
use std::time::Duration;

use reqwest::Url;

use crate::error::{LokiError, Result};

/// Default Loki address (local single-binary install).
pub const DEFAULT_LOKI_URL: &str = "http://127.0.0.1:3100";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Entry limit used when a query does not name one. Matches Loki's server default.
pub const DEFAULT_LIMIT: u32 = 100;

const ENV_URL: &str = "LOKI_URL";
const ENV_USERNAME: &str = "LOKI_USERNAME";
const ENV_PASSWORD: &str = "LOKI_PASSWORD";
const ENV_BEARER_TOKEN: &str = "LOKI_BEARER_TOKEN";
const ENV_ORG_ID: &str = "LOKI_ORG_ID";
const ENV_TIMEOUT_SECS: &str = "LOKI_TIMEOUT_SECS";
const ENV_TLS_INSECURE: &str = "LOKI_TLS_INSECURE";

/// Authentication sent with every request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// HTTP basic auth.
    Basic {
        username: String,
        password: Option<String>,
    },
    /// `Authorization: Bearer <token>`.
    Bearer(String),
}

impl Credentials {
    /// Basic auth with a password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: Some(password.into()),
        }
    }

    /// Bearer token auth.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }
}

// Secrets never end up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

/// Configuration for the Loki client
#[derive(Debug, Clone)]
pub struct LokiConfig {
    /// Base URL for the Loki API. May include a path prefix (e.g. behind a gateway).
    pub base_url: String,
    /// Optional authentication
    pub credentials: Option<Credentials>,
    /// Tenant id for multi-tenant Loki (`X-Scope-OrgID`)
    pub org_id: Option<String>,
    /// Extra headers sent with every request
    pub headers: Vec<(String, String)>,
    /// Per-request timeout; `None` leaves it to the transport
    pub timeout: Option<Duration>,
    /// Skip TLS certificate verification
    pub disable_tls_verification: bool,
    /// Decode the body of non-2xx responses instead of failing
    pub ignore_http_errors: bool,
    /// Entry limit for queries that don't specify one
    pub default_limit: u32,
}

impl Default for LokiConfig {
    fn default() -> Self {
        Self::new(std::env::var(ENV_URL).unwrap_or_else(|_| DEFAULT_LOKI_URL.to_string()))
    }
}

impl LokiConfig {
    /// Configuration for `base_url` with default settings.
    ///
    /// The URL is validated when the client is built, not here.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: None,
            org_id: None,
            headers: Vec::new(),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            disable_tls_verification: false,
            ignore_http_errors: false,
            default_limit: DEFAULT_LIMIT,
        }
    }

    /// Build a configuration from `LOKI_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(token) = env_non_empty(ENV_BEARER_TOKEN) {
            config.credentials = Some(Credentials::Bearer(token));
        } else if let Some(username) = env_non_empty(ENV_USERNAME) {
            config.credentials = Some(Credentials::Basic {
                username,
                password: env_non_empty(ENV_PASSWORD),
            });
        }

        config.org_id = env_non_empty(ENV_ORG_ID);

        if let Some(raw) = env_non_empty(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.parse().map_err(|_| {
                LokiError::config(format!(
                    "{ENV_TIMEOUT_SECS} must be a whole number of seconds, got {raw:?}"
                ))
            })?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        config.disable_tls_verification = env_non_empty(ENV_TLS_INSECURE)
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");

        Ok(config)
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    #[must_use]
    pub fn disable_tls_verification(mut self, disable: bool) -> Self {
        self.disable_tls_verification = disable;
        self
    }

    #[must_use]
    pub fn ignore_http_errors(mut self, ignore: bool) -> Self {
        self.ignore_http_errors = ignore;
        self
    }

    #[must_use]
    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit;
        self
    }

    /// Check the base URL and return it without a trailing slash.
    pub fn validated_base_url(&self) -> Result<String> {
        validate_base_url(&self.base_url)
    }
}

/// Validate a Loki base URL.
///
/// Accepts absolute `http`/`https` URLs with a host. Query strings and
/// fragments are rejected because endpoint paths are appended to the URL.
pub fn validate_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LokiError::config("base URL is empty"));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| LokiError::config(format!("base URL {trimmed:?} is malformed: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(LokiError::config(format!(
            "base URL scheme must be http or https, got {:?}",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(LokiError::config(format!("base URL {trimmed:?} has no host")));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(LokiError::config(format!(
            "base URL {trimmed:?} must not carry a query or fragment"
        )));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
