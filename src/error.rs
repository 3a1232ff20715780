//! API error types.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::db::DbError;
use crate::upload::UploadError;

/// Error body: `{ "code", "errorCode", "msg", "data": null }`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    #[serde(rename = "errorCode")]
    pub error_code: Option<u32>,
    pub msg: String,
    pub data: Option<()>,
}

/// Error surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Parameter(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Too many requests, please try again later.")]
    TooManyRequests { retry_after_secs: u64 },

    #[error("Request timed out")]
    Timeout,

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{}: {}", .0.code(), .0)]
    Upload(#[from] UploadError),
}

impl ApiError {
    /// Application error code: 10000 parameter, 20000 unauthorized,
    /// 30000 forbidden. Other errors carry none.
    pub fn error_code(&self) -> Option<u32> {
        match self.status_code() {
            StatusCode::BAD_REQUEST => Some(10000),
            StatusCode::UNAUTHORIZED => Some(20000),
            StatusCode::FORBIDDEN => Some(30000),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Parameter(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(e) => e.status_code(),
            Self::Upload(e) => e.status_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            code: status.as_u16(),
            error_code: self.error_code(),
            msg: self.to_string(),
            data: None,
        };

        let mut response = (status, Json(body)).into_response();
        if let Self::TooManyRequests { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        tracing::error!(error = %err, "Database request failed");
        ApiError::Internal("Database query failed".to_string())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_parameter_error_body() {
        let (status, body) = body_of(ApiError::Parameter("id is required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            serde_json::json!({
                "code": 400,
                "errorCode": 10000,
                "msg": "id is required",
                "data": null
            })
        );
    }

    #[tokio::test]
    async fn test_error_code_families() {
        assert_eq!(ApiError::Unauthorized("x".into()).error_code(), Some(20000));
        assert_eq!(ApiError::Forbidden("x".into()).error_code(), Some(30000));
        assert_eq!(ApiError::Internal("x".into()).error_code(), None);

        let (status, body) = body_of(ApiError::Internal("boom".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["errorCode"].is_null());
    }

    #[tokio::test]
    async fn test_database_errors_are_internal() {
        let err: ApiError = DbError::InvalidTable("user;".into()).into();
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["msg"], "Database query failed");
    }

    #[tokio::test]
    async fn test_timeout_body() {
        let (status, body) = body_of(ApiError::Timeout).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            body,
            serde_json::json!({
                "code": 408,
                "errorCode": null,
                "msg": "Request timed out",
                "data": null
            })
        );
    }

    #[tokio::test]
    async fn test_too_many_requests_sets_retry_after() {
        let response = ApiError::TooManyRequests { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
