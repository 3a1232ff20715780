use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
};
use serde::Deserialize;

use super::{AuthError, Claims};
use crate::error::{ApiError, ApiResult};
use crate::http::response::ApiResponse;
use crate::http::server::AppState;

#[derive(Debug, Default, Deserialize)]
struct TokenRequest {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

/// POST /auth/getToken
pub async fn get_token(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<ApiResponse<String>> {
    let request: TokenRequest = if body.is_empty() {
        TokenRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::Parameter(format!("invalid JSON body: {}", e)))?
    };

    let id = match request.id {
        Some(id) if !id.is_null() => id,
        _ => return Err(AuthError::MissingId.into()),
    };

    let token = state.issuer.issue(id)?;
    Ok(ApiResponse::success(token))
}

/// POST /auth
pub async fn post_auth() -> ApiResponse<&'static str> {
    ApiResponse::success("post")
}

/// GET /auth/verify
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<ApiResponse<Claims>> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let claims = state.issuer.verify(token)?;
    Ok(ApiResponse::success(claims))
}
