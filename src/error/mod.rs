use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for gatekeeper operations
pub type Result<T> = std::result::Result<T, GatekeeperError>;

/// Gatekeeper error types
#[derive(Error, Debug)]
pub enum GatekeeperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatekeeperError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatekeeperError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatekeeperError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatekeeperError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatekeeperError::NotFound(_) => StatusCode::NOT_FOUND,
            GatekeeperError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatekeeperError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatekeeperError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<redis::RedisError> for GatekeeperError {
    fn from(err: redis::RedisError) -> Self {
        GatekeeperError::Store(format!("Redis error: {}", err))
    }
}

impl From<serde_json::Error> for GatekeeperError {
    fn from(err: serde_json::Error) -> Self {
        GatekeeperError::Serialization(err.to_string())
    }
}

impl IntoResponse for GatekeeperError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            GatekeeperError::NotFound("test".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatekeeperError::Store("down".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatekeeperError::InvalidRequest("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_error_display() {
        let err = GatekeeperError::NotFound("1.2.3.4".to_string());
        assert_eq!(err.to_string(), "Not found: 1.2.3.4");
    }

    #[test]
    fn test_serde_error_conversion() {
        let err: GatekeeperError = serde_json::from_str::<u64>("nope").unwrap_err().into();
        assert!(matches!(err, GatekeeperError::Serialization(_)));
    }
}
