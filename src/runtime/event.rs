//! Invocation payloads and correlation metadata.
//!
//! Requests and responses follow the API Gateway v2 (HTTP API) shape so that
//! webhook-style handlers can be hosted unchanged behind the Runtime API or the
//! local invoke server.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Correlation metadata for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationMetadata {
    pub request_id: String,
    /// Milliseconds since the Unix epoch after which the invocation is abandoned.
    pub deadline_ms: Option<u64>,
    pub trace_id: Option<String>,
    pub invoked_function_arn: Option<String>,
}

impl InvocationMetadata {
    /// Metadata with only a request id.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deadline_ms: None,
            trace_id: None,
            invoked_function_arn: None,
        }
    }

    /// Set the deadline to `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = SystemTime::now() + timeout;
        self.deadline_ms = deadline
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_millis() as u64);
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Time left before the deadline, if one is set. Zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        let deadline = UNIX_EPOCH + Duration::from_millis(self.deadline_ms?);
        Some(
            deadline
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
        )
    }
}

/// One received request plus its metadata.
#[derive(Debug, Clone)]
pub struct InvocationEnvelope {
    pub metadata: InvocationMetadata,
    pub request: GatewayRequest,
}

impl InvocationEnvelope {
    pub fn new(metadata: InvocationMetadata, request: GatewayRequest) -> Self {
        Self { metadata, request }
    }

    pub fn request_id(&self) -> &str {
        &self.metadata.request_id
    }
}

/// HTTP method and path as seen by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpDescription {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub path: String,
}

/// Request context block of a gateway event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub http: HttpDescription,
}

/// An HTTP API (API Gateway v2) request event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayRequest {
    pub route_key: String,
    pub raw_path: String,
    pub raw_query_string: String,
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_string_parameters: Option<HashMap<String, String>>,
    pub request_context: RequestContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub is_base64_encoded: bool,
}

impl GatewayRequest {
    /// HTTP method from the request context.
    pub fn method(&self) -> &str {
        &self.request_context.http.method
    }

}

/// Body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// An HTTP API (API Gateway v2) response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl GatewayResponse {
    /// Plain response with the given status and body, no headers.
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            headers: HashMap::new(),
            body: Some(body.into()),
            is_base64_encoded: false,
        }
    }

    /// JSON response with `Content-Type: application/json`.
    ///
    /// Falls back to `{}` if the value cannot be encoded.
    pub fn json<T: Serialize>(value: &T, status_code: u16) -> Self {
        let body = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code,
            headers,
            body: Some(body),
            is_base64_encoded: false,
        }
    }

    /// JSON error response: `{"error": "<error>"}`.
    pub fn from_error(error: &impl std::fmt::Display, status_code: u16) -> Self {
        Self::json(
            &ErrorBody {
                error: error.to_string(),
            },
            status_code,
        )
    }
}
