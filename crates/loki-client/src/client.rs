//! Async client for the Loki HTTP API.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loki_client::{LokiClient, LokiConfig, RangeQuery, TimeRange};
//!
//! let client = LokiClient::new(LokiConfig::new("http://loki.logging.svc:3100"))?;
//!
//! let range = TimeRange::last(chrono::Duration::minutes(10))?;
//! let response = client
//!     .query_range(&RangeQuery::new(r#"{namespace="cto"}"#, range).limit(500))
//!     .await?;
//!
//! for entry in response.entries() {
//!     println!("[{}] {}", entry.timestamp, entry.line);
//! }
//! ```

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{Credentials, LokiConfig};
use crate::error::{LokiError, Result};
use crate::logs::LogEntry;
use crate::types::{
    ApiResponse, Envelope, InstantQuery, Labels, PushRequest, QueryResponse, RangeQuery, Stream,
    TimeRange, SUCCESS_STATUS,
};

const READY_PATH: &str = "/ready";
const QUERY_PATH: &str = "/loki/api/v1/query";
const QUERY_RANGE_PATH: &str = "/loki/api/v1/query_range";
const LABELS_PATH: &str = "/loki/api/v1/labels";
const SERIES_PATH: &str = "/loki/api/v1/series";
const PUSH_PATH: &str = "/loki/api/v1/push";

/// Tenant header understood by multi-tenant Loki.
const ORG_ID_HEADER: &str = "X-Scope-OrgID";

/// Client for a single Loki host.
///
/// Holds no per-request state. Cloning shares the underlying connection pool,
/// and calls may be issued concurrently from any number of tasks.
#[derive(Debug, Clone)]
pub struct LokiClient {
    base_url: String,
    config: LokiConfig,
    client: Client,
}

impl LokiClient {
    /// Create a new Loki client with the given configuration
    pub fn new(config: LokiConfig) -> Result<Self> {
        let base_url = config.validated_base_url()?;
        let headers = default_headers(&config)?;

        let mut builder = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(config.disable_tls_verification);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| LokiError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            config,
            client,
        })
    }

    /// Create a client configured from `LOKI_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(LokiConfig::from_env()?)
    }

    /// Normalized base URL (no trailing slash).
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn config(&self) -> &LokiConfig {
        &self.config
    }

    /// Check if the Loki host is ready to accept traffic (`GET /ready`).
    ///
    /// Any non-2xx status is `Ok(false)`. Failing to reach the host is an error.
    pub async fn ready(&self) -> Result<bool> {
        let response = self.request(Method::GET, READY_PATH).send().await?;
        let status = response.status();
        debug!(status = %status, "Loki readiness probe");
        Ok(status.is_success())
    }

    /// Run an instant query (`GET /loki/api/v1/query`).
    pub async fn query(&self, query: &InstantQuery) -> Result<QueryResponse> {
        let params = query.to_params(self.config.default_limit)?;
        debug!(query = %query.query, direction = %query.direction, "Querying Loki (instant)");
        self.get_json(QUERY_PATH, &params, true).await
    }

    /// Run a range query (`GET /loki/api/v1/query_range`).
    pub async fn query_range(&self, query: &RangeQuery) -> Result<QueryResponse> {
        let params = query.to_params(self.config.default_limit)?;
        debug!(
            query = %query.query,
            start = %query.range.start(),
            end = %query.range.end(),
            limit = ?query.limit,
            "Querying Loki"
        );
        self.get_json(QUERY_RANGE_PATH, &params, true).await
    }

    /// Run a log selector over `range` and return entries sorted by timestamp (oldest first).
    ///
    /// `limit` of `None` or `Some(0)` uses the configured default.
    pub async fn query_logs(
        &self,
        selector: &str,
        range: TimeRange,
        limit: Option<u32>,
    ) -> Result<Vec<LogEntry>> {
        let mut query = RangeQuery::new(selector, range);
        query.limit = limit;

        let entries = self.query_range(&query).await?.entries();
        debug!(entries = entries.len(), "Retrieved log entries from Loki");
        Ok(entries)
    }

    /// List known label names (`GET /loki/api/v1/labels`).
    pub async fn labels(&self, range: Option<TimeRange>) -> Result<Vec<String>> {
        let params = range_params(range);
        let response: ApiResponse<Vec<String>> =
            self.get_json(LABELS_PATH, &params, false).await?;
        Ok(response.data.unwrap_or_default())
    }

    /// List values of one label (`GET /loki/api/v1/label/<name>/values`).
    pub async fn label_values(&self, name: &str, range: Option<TimeRange>) -> Result<Vec<String>> {
        validate_label_name(name)?;
        let path = format!("/loki/api/v1/label/{name}/values");
        let params = range_params(range);
        let response: ApiResponse<Vec<String>> = self.get_json(&path, &params, false).await?;
        Ok(response.data.unwrap_or_default())
    }

    /// List streams matching any of `matchers` (`GET /loki/api/v1/series`).
    pub async fn series(
        &self,
        matchers: &[&str],
        range: Option<TimeRange>,
    ) -> Result<Vec<Labels>> {
        if matchers.is_empty() || matchers.iter().any(|m| m.trim().is_empty()) {
            return Err(LokiError::invalid(
                "series needs at least one non-empty matcher",
            ));
        }

        let mut params: Vec<(String, String)> = matchers
            .iter()
            .map(|m| ("match[]".to_string(), (*m).to_string()))
            .collect();
        params.extend(range_params(range));

        let response: ApiResponse<Vec<Labels>> =
            self.get_json(SERIES_PATH, &params, false).await?;
        Ok(response.data.unwrap_or_default())
    }

    /// Push log lines (`POST /loki/api/v1/push`).
    pub async fn push(&self, streams: Vec<Stream>) -> Result<()> {
        if streams.iter().all(|s| s.values.is_empty()) {
            return Err(LokiError::invalid("push needs at least one log line"));
        }

        let lines: usize = streams.iter().map(|s| s.values.len()).sum();
        debug!(streams = streams.len(), lines, "Pushing to Loki");

        let body = PushRequest { streams };
        let response = self
            .request(Method::POST, PUSH_PATH)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || self.config.ignore_http_errors {
            return Ok(());
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, status = %status, "Failed to read Loki push rejection body");
                String::new()
            }
        };
        Err(LokiError::Response {
            status: status.as_u16(),
            body,
        })
    }

    /// Build a request with the configured credentials attached.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        debug!(method = method.as_str(), url = %url, "Loki request");

        let builder = self.client.request(method, url);
        match &self.config.credentials {
            Some(Credentials::Basic { username, password }) => {
                builder.basic_auth(username, password.as_ref())
            }
            Some(Credentials::Bearer(token)) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        require_data: bool,
    ) -> Result<ApiResponse<T>> {
        let response = self.request(Method::GET, path).query(params).send().await?;
        self.handle_response(response, require_data).await
    }

    /// Check the status, verify Loki's envelope status and decode the body.
    ///
    /// With `ignore_http_errors`, non-2xx replies are decoded and returned as is,
    /// so the caller sees `status`, `errorType` and `error`.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        require_data: bool,
    ) -> Result<ApiResponse<T>> {
        let status = response.status();
        let text = response.text().await?;

        let tolerated = !status.is_success() && self.config.ignore_http_errors;
        if !status.is_success() && !tolerated {
            return Err(LokiError::Response {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: Envelope = decode(&text, status)?;
        if !tolerated && envelope.status != SUCCESS_STATUS {
            return Err(LokiError::Response {
                status: status.as_u16(),
                body: text,
            });
        }

        let decoded: ApiResponse<T> = decode(&text, status)?;
        if require_data && decoded.is_success() && decoded.data.is_none() {
            warn!(status = %status, "Loki response has no data");
            return Err(LokiError::Decode {
                source: serde::de::Error::missing_field("data"),
                body: text,
            });
        }

        Ok(decoded)
    }
}

fn decode<T: DeserializeOwned>(text: &str, status: reqwest::StatusCode) -> Result<T> {
    serde_json::from_str(text).map_err(|e| {
        warn!(error = %e, status = %status, "Failed to parse Loki response");
        LokiError::Decode {
            source: e,
            body: text.to_string(),
        }
    })
}

fn default_headers(config: &LokiConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    if let Some(org_id) = &config.org_id {
        let value = HeaderValue::from_str(org_id)
            .map_err(|_| LokiError::config(format!("invalid tenant id {org_id:?}")))?;
        headers.insert(ORG_ID_HEADER, value);
    }

    for (name, value) in &config.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| LokiError::config(format!("invalid header name {name:?}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| LokiError::config(format!("invalid value for header {name:?}")))?;
        headers.append(header_name, header_value);
    }

    Ok(headers)
}

fn range_params(range: Option<TimeRange>) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(range) = range {
        range.push_params(&mut params);
    }
    params
}

/// Prometheus-style label name: `[a-zA-Z_][a-zA-Z0-9_]*`.
fn validate_label_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(LokiError::invalid(format!("invalid label name {name:?}")))
    }
}
