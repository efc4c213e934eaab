use super::response::{add_rate_limit_headers, Rejection};
use super::service::AdmissionService;
use crate::identity::IdentityConfig;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

/// Header naming the tool a request invokes
pub const TOOL_NAME_HEADER: &str = "x-tool-name";

/// Shared state for admission handlers and middleware
#[derive(Clone)]
pub struct AdmissionState {
    pub service: Arc<AdmissionService>,
    pub identity: Arc<IdentityConfig>,
}

impl AdmissionState {
    pub fn new(service: Arc<AdmissionService>, identity: IdentityConfig) -> Self {
        Self {
            service,
            identity: Arc::new(identity),
        }
    }
}

/// Tool name for a request: the `X-Tool-Name` header, else the last path segment
fn operation_name(request: &Request) -> String {
    request
        .headers()
        .get(TOOL_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| request.uri().path().rsplit('/').find(|s| !s.is_empty()))
        .unwrap_or("unknown")
        .to_string()
}

/// Axum middleware guarding tool routes with an admission check
///
/// Use with `axum::middleware::from_fn_with_state`.
pub async fn admission_middleware(
    State(state): State<AdmissionState>,
    request: Request,
    next: Next,
) -> Response {
    let client_id = state.identity.client_id(request.headers());
    let operation = operation_name(&request);

    let result = state.service.check(&client_id, &operation).await;
    if let Some(rejection) = Rejection::new(&result, state.service.now(), serde_json::Value::Null)
    {
        return rejection.into_response();
    }

    debug!(
        client_id = %client_id,
        operation = %operation,
        remaining = result.remaining,
        "Admission check passed"
    );

    let response = next.run(request).await;
    add_rate_limit_headers(response, &result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    #[test]
    fn test_operation_from_header() {
        let request = HttpRequest::builder()
            .uri("/rpc")
            .header("X-Tool-Name", " skills ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(operation_name(&request), "skills");
    }

    #[test]
    fn test_operation_from_path() {
        let request = HttpRequest::builder()
            .uri("/tools/search/")
            .body(Body::empty())
            .unwrap();
        assert_eq!(operation_name(&request), "search");
    }

    #[test]
    fn test_operation_unknown() {
        let request = HttpRequest::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(operation_name(&request), "unknown");
    }
}
