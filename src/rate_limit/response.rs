use super::types::{AdmissionResult, Decision};
use super::window::Horizon;
use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// JSON-RPC error code: quota exceeded, recoverable by waiting
pub const QUOTA_EXCEEDED_CODE: i64 = -32029;
/// JSON-RPC error code: client blocked, waiting does not help
pub const CLIENT_BLOCKED_CODE: i64 = -32030;
/// JSON-RPC error code: admission state unavailable (fail-closed)
pub const STORE_UNAVAILABLE_CODE: i64 = -32031;

pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
pub const RATE_LIMIT_WINDOW: HeaderName = HeaderName::from_static("x-ratelimit-window");

/// Structured data attached to a denial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorData {
    pub retry_after: u64,
    pub limit: u64,
    pub window: Horizon,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: RpcErrorData,
}

impl RpcError {
    /// Shape a denied admission result; `None` for allowed results
    pub fn from_result(result: &AdmissionResult, now: u64) -> Option<Self> {
        if result.allowed {
            return None;
        }

        let retry_after = result.retry_after(now);
        let data = RpcErrorData {
            retry_after,
            limit: result.limit,
            window: result.horizon,
            blocked: result.blocked,
            reason: result.reason.clone(),
        };

        let (code, message) = if result.blocked {
            let reason = result.reason.as_deref().unwrap_or("access revoked");
            (CLIENT_BLOCKED_CODE, format!("Access blocked: {}", reason))
        } else if result.decision == Decision::DeniedUnavailable {
            (
                STORE_UNAVAILABLE_CODE,
                format!(
                    "Admission service unavailable, retry after {} seconds",
                    retry_after
                ),
            )
        } else if result.decision == Decision::DeniedCost {
            (
                QUOTA_EXCEEDED_CODE,
                format!(
                    "Cost budget of {} per minute exceeded, retry after {} seconds",
                    result.limit, retry_after
                ),
            )
        } else {
            (
                QUOTA_EXCEEDED_CODE,
                format!(
                    "Rate limit of {} per {} exceeded, retry after {} seconds",
                    result.limit, result.horizon, retry_after
                ),
            )
        };

        Some(Self {
            code,
            message,
            data,
        })
    }

    /// HTTP status matching the error code
    pub fn status_code(&self) -> StatusCode {
        match self.code {
            CLIENT_BLOCKED_CODE => StatusCode::FORBIDDEN,
            STORE_UNAVAILABLE_CODE => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Advisory `X-RateLimit-*` headers for any decision
pub fn advisory_headers(result: &AdmissionResult) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(result.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(result.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(result.reset_at));
    headers.insert(
        RATE_LIMIT_WINDOW,
        HeaderValue::from_static(result.horizon.as_str()),
    );
    headers
}

/// Add advisory headers to an outgoing response
pub fn add_rate_limit_headers(mut response: Response, result: &AdmissionResult) -> Response {
    response.headers_mut().extend(advisory_headers(result));
    response
}

/// A denied admission rendered as a JSON-RPC error response
#[derive(Debug, Clone)]
pub struct Rejection {
    pub error: RpcError,
    pub headers: HeaderMap,
    /// JSON-RPC request id to echo
    pub id: serde_json::Value,
}

impl Rejection {
    /// Build a rejection; `None` when the result allows the request
    pub fn new(result: &AdmissionResult, now: u64, id: serde_json::Value) -> Option<Self> {
        let error = RpcError::from_result(result, now)?;
        let mut headers = advisory_headers(result);

        // Blocked clients get no hint that retrying soon will help
        if error.code != CLIENT_BLOCKED_CODE {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(error.data.retry_after));
        }

        Some(Self { error, headers, id })
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = Json(json!({
            "jsonrpc": "2.0",
            "error": self.error,
            "id": self.id,
        }));

        (status, self.headers, body).into_response()
    }
}
