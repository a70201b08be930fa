//! Types shared between the etcdperf benchmark tools and the HTTP gateway.
//!
//! This crate contains the JSON bodies exchanged on the gateway's `/kv` routes, and the
//! [`logging`] setup used by all binaries in the workspace.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use serde::{Deserialize, Serialize};

pub mod logging;

/// The route prefix of the key-value API exposed by the gateway.
pub const KV_ROUTE: &str = "/kv";

/// A key-value pair as sent to `POST /kv` and returned from `GET /kv/{key}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvPair {
    /// The key under which the value is stored.
    pub key: String,
    /// The stored value.
    pub value: String,
    /// Set when the gateway answered from its read cache.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cached: bool,
}

impl KvPair {
    /// Creates a pair that is not marked as cached.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            cached: false,
        }
    }
}

/// Response body of successful mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Always `true`.
    pub success: bool,
}

impl SuccessResponse {
    /// Creates a successful response.
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Response body of failed requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// A human-readable description of the failure.
    pub error: String,
    /// The underlying cause, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Creates an error response with the given message.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    /// Attaches the underlying cause to the response.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
