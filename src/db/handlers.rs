use axum::extract::State;

use crate::error::{ApiError, ApiResult};
use crate::http::response::ApiResponse;
use crate::http::server::AppState;

/// GET /test
pub async fn list_rows(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<serde_json::Value>>> {
    let db = state
        .database
        .as_ref()
        .ok_or_else(|| ApiError::Internal("Database is not configured".to_string()))?;

    let rows = db.select_all().await?;
    tracing::debug!(table = db.table(), rows = rows.len(), "Passthrough query");
    Ok(ApiResponse::success(rows))
}
