//! Typed async client for the Grafana Loki HTTP API.
//!
//! This crate wraps the Loki query and push endpoints behind a small,
//! strongly typed API. Every call is a single request/response exchange:
//! there is no retry, caching or tailing layer, and every failure is reported
//! to the caller as a [`LokiError`].
//!
//! # Usage
//!
//! ```no_run
//! use loki_client::{InstantQuery, LokiClient, LokiConfig};
//!
//! # async fn run() -> Result<(), loki_client::LokiError> {
//! let client = LokiClient::new(LokiConfig::new("http://127.0.0.1:3100"))?;
//!
//! if client.ready().await? {
//!     let response = client
//!         .query(&InstantQuery::new(r#"sum(rate({job="api"}[5m]))"#))
//!         .await?;
//!     if let Some(data) = &response.data {
//!         println!("{}", data.result.result_type());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! - [`LokiError::Configuration`]: bad base URL, header or transport setup
//! - [`LokiError::InvalidArgument`]: a query argument was rejected before sending
//! - [`LokiError::Request`]: the host could not be reached
//! - [`LokiError::Response`]: Loki answered with a non-success status
//! - [`LokiError::Decode`]: the body was not the expected JSON

pub mod client;
pub mod config;
pub mod error;
pub mod logs;
pub mod types;

pub use client::LokiClient;
pub use config::{Credentials, LokiConfig};
pub use error::LokiError;
pub use logs::LogEntry;
pub use types::{
    ApiResponse, Direction, InstantQuery, Labels, QueryData, QueryResponse, QueryResult,
    RangeQuery, Stream, TimeRange,
};
