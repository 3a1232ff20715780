use axum::{
    extract::{Multipart, State},
    http::StatusCode,
};

use super::storage::{FieldRule, StoredFile};
use crate::error::ApiResult;
use crate::http::response::ApiResponse;
use crate::http::server::AppState;

const UPLOADED: &str = "Upload succeeded";

const SINGLE: [FieldRule; 1] = [FieldRule::new("file", 1)];
const MIX: [FieldRule; 2] = [FieldRule::new("avatar", 1), FieldRule::new("idCards", 2)];

/// POST /upload
pub async fn upload_single(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<ApiResponse<Vec<StoredFile>>> {
    let files = state.uploads.save(multipart, &SINGLE).await?;
    Ok(ApiResponse::with_message(files, StatusCode::OK, UPLOADED))
}

/// POST /upload/multiple
pub async fn upload_multiple(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<ApiResponse<Vec<StoredFile>>> {
    let rules = [FieldRule::new("fileList", state.config.upload.max_files)];
    let files = state.uploads.save(multipart, &rules).await?;
    Ok(ApiResponse::with_message(files, StatusCode::OK, UPLOADED))
}

/// POST /upload/mix
pub async fn upload_mix(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<ApiResponse<Vec<StoredFile>>> {
    let files = state.uploads.save(multipart, &MIX).await?;
    Ok(ApiResponse::with_message(files, StatusCode::OK, UPLOADED))
}
