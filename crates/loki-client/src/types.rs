//! Query parameters and response models for the Loki HTTP API.
//!
//! Response shapes follow <https://grafana.com/docs/loki/latest/reference/loki-http-api/>.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LokiError, Result};

/// Label set of a stream or series.
pub type Labels = BTreeMap<String, String>;

// ============================================================================
// Query parameters
// ============================================================================

/// Sort order of returned log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Oldest first.
    Forward,
    /// Most recent first (like `kubectl logs --tail`).
    #[default]
    Backward,
}

impl Direction {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = LokiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "forward" => Ok(Self::Forward),
            "backward" => Ok(Self::Backward),
            other => Err(LokiError::invalid(format!(
                "invalid direction {other:?}, expected \"forward\" or \"backward\""
            ))),
        }
    }
}

/// Inclusive time window for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Window from `start` to `end`. Fails if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(LokiError::invalid(format!(
                "time range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Window ending now and reaching `span` into the past.
    ///
    /// Fails if the start would fall outside the representable time range.
    pub fn last(span: chrono::Duration) -> Result<Self> {
        let end = Utc::now();
        let start = end
            .checked_sub_signed(span.abs())
            .ok_or_else(|| LokiError::invalid(format!("look-back of {span} is out of range")))?;
        Ok(Self { start, end })
    }

    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub(crate) fn push_params(&self, params: &mut Vec<(String, String)>) {
        params.push(("start".to_string(), to_nanos(self.start)));
        params.push(("end".to_string(), to_nanos(self.end)));
    }
}

/// Nanosecond Unix epoch as Loki expects it.
///
/// Instants outside the representable range (years ~1677..2262) saturate.
#[must_use]
pub fn to_nanos(ts: DateTime<Utc>) -> String {
    ts.timestamp_nanos_opt()
        .unwrap_or(if ts.timestamp() < 0 { i64::MIN } else { i64::MAX })
        .to_string()
}

/// Parse a nanosecond Unix epoch string.
#[must_use]
pub fn from_nanos(raw: &str) -> Option<DateTime<Utc>> {
    let ns = raw.parse::<i64>().ok()?;
    Some(DateTime::from_timestamp_nanos(ns))
}

fn require_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        Err(LokiError::invalid("query empty"))
    } else {
        Ok(())
    }
}

fn effective_limit(limit: Option<u32>, default_limit: u32) -> u32 {
    match limit {
        Some(0) | None => default_limit,
        Some(n) => n,
    }
}

/// Parameters for `GET /loki/api/v1/query`.
#[derive(Debug, Clone, Default)]
pub struct InstantQuery {
    pub query: String,
    pub limit: Option<u32>,
    /// Evaluation time; Loki uses "now" when absent.
    pub time: Option<DateTime<Utc>>,
    pub direction: Direction,
    /// Extra raw parameters appended verbatim.
    pub extra: Vec<(String, String)>,
}

impl InstantQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    #[must_use]
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    pub(crate) fn to_params(&self, default_limit: u32) -> Result<Vec<(String, String)>> {
        require_query(&self.query)?;

        let mut params = self.extra.clone();
        params.push(("query".to_string(), self.query.clone()));
        if let Some(time) = self.time {
            params.push(("time".to_string(), to_nanos(time)));
        }
        params.push((
            "limit".to_string(),
            effective_limit(self.limit, default_limit).to_string(),
        ));
        params.push(("direction".to_string(), self.direction.to_string()));
        Ok(params)
    }
}

/// Parameters for `GET /loki/api/v1/query_range`.
#[derive(Debug, Clone)]
pub struct RangeQuery {
    pub query: String,
    pub range: TimeRange,
    pub limit: Option<u32>,
    pub direction: Direction,
    /// Resolution for metric queries, as a duration string (`"30s"`) or seconds.
    pub step: Option<String>,
    /// Extra raw parameters appended verbatim.
    pub extra: Vec<(String, String)>,
}

impl RangeQuery {
    pub fn new(query: impl Into<String>, range: TimeRange) -> Self {
        Self {
            query: query.into(),
            range,
            limit: None,
            direction: Direction::default(),
            step: None,
            extra: Vec::new(),
        }
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    pub(crate) fn to_params(&self, default_limit: u32) -> Result<Vec<(String, String)>> {
        require_query(&self.query)?;

        let mut params = self.extra.clone();
        params.push(("query".to_string(), self.query.clone()));
        self.range.push_params(&mut params);
        params.push((
            "limit".to_string(),
            effective_limit(self.limit, default_limit).to_string(),
        ));
        params.push(("direction".to_string(), self.direction.to_string()));
        if let Some(step) = &self.step {
            params.push(("step".to_string(), step.clone()));
        }
        Ok(params)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Loki's JSON envelope.
///
/// Successful replies carry `data`. Error replies carry `errorType` and
/// `error` instead, which only reach callers with `ignore_http_errors` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(
        default,
        rename = "errorType",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }
}

pub(crate) const SUCCESS_STATUS: &str = "success";

/// Envelope fields only, read before the typed payload.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub status: String,
}

/// Response of the query endpoints.
pub type QueryResponse = ApiResponse<QueryData>;

/// `data` member of a query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQueryData", into = "RawQueryData")]
pub struct QueryData {
    pub result: QueryResult,
    /// Query statistics, kept as returned.
    pub stats: Option<serde_json::Value>,
}

/// Result payload, selected by `resultType`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Log streams (log queries).
    Streams(Vec<Stream>),
    /// Instant metric samples.
    Vector(Vec<VectorSample>),
    /// Range metric series.
    Matrix(Vec<MatrixSeries>),
    /// Single value.
    Scalar(SamplePair),
}

impl QueryResult {
    #[must_use]
    pub const fn result_type(&self) -> &'static str {
        match self {
            Self::Streams(_) => "streams",
            Self::Vector(_) => "vector",
            Self::Matrix(_) => "matrix",
            Self::Scalar(_) => "scalar",
        }
    }
}

/// A log stream: its labels plus `(timestamp_ns, line)` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub stream: Labels,
    pub values: Vec<(String, String)>,
}

/// `(unix_seconds, value)` as returned for metric queries.
pub type SamplePair = (f64, String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSample {
    pub metric: Labels,
    pub value: SamplePair,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSeries {
    pub metric: Labels,
    pub values: Vec<SamplePair>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawQueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stats: Option<serde_json::Value>,
}

impl TryFrom<RawQueryData> for QueryData {
    type Error = serde_json::Error;

    fn try_from(raw: RawQueryData) -> std::result::Result<Self, Self::Error> {
        let result = match raw.result_type.as_str() {
            "streams" => QueryResult::Streams(serde_json::from_value(raw.result)?),
            "vector" => QueryResult::Vector(serde_json::from_value(raw.result)?),
            "matrix" => QueryResult::Matrix(serde_json::from_value(raw.result)?),
            "scalar" => QueryResult::Scalar(serde_json::from_value(raw.result)?),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "unknown resultType {other:?}"
                )))
            }
        };
        Ok(Self {
            result,
            stats: raw.stats,
        })
    }
}

impl From<QueryData> for RawQueryData {
    fn from(data: QueryData) -> Self {
        let result_type = data.result.result_type().to_string();
        // Serializing these plain data types cannot fail.
        let result = match data.result {
            QueryResult::Streams(v) => serde_json::to_value(v),
            QueryResult::Vector(v) => serde_json::to_value(v),
            QueryResult::Matrix(v) => serde_json::to_value(v),
            QueryResult::Scalar(v) => serde_json::to_value(v),
        }
        .unwrap_or(serde_json::Value::Null);
        Self {
            result_type,
            result,
            stats: data.stats,
        }
    }
}

// ============================================================================
// Push
// ============================================================================

/// Body of `POST /loki/api/v1/push`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    pub streams: Vec<Stream>,
}

impl Stream {
    /// Empty stream with the given labels.
    #[must_use]
    pub fn new(labels: Labels) -> Self {
        Self {
            stream: labels,
            values: Vec::new(),
        }
    }

    /// Append a log line at `timestamp`.
    #[must_use]
    pub fn entry(mut self, timestamp: DateTime<Utc>, line: impl Into<String>) -> Self {
        self.values.push((to_nanos(timestamp), line.into()));
        self
    }
}
