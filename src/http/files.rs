//! File streaming and static assets.
//!
//! `/download/{*path}` streams a file from the public directory without a
//! Content-Length and attaches [`FileStat`] so the access log can still
//! report its size. Everything else under `/` is served by `ServeDir`,
//! falling back to [`not_found`].

use std::io;
use std::path::{Component, Path, PathBuf};

use axum::{
    body::Body,
    extract::{Path as UrlPath, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::access_log::FileStat;
use crate::error::{ApiError, ApiResult};
use crate::http::server::AppState;

/// GET /download/{*path}
pub async fn download(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
) -> ApiResult<Response> {
    let relative = safe_relative_path(&path)
        .ok_or_else(|| ApiError::Parameter(format!("invalid file path: {}", path)))?;
    let full = state.public_dir.join(&relative);

    let file = File::open(&full).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ApiError::NotFound(format!("file not found: {}", path)),
        _ => ApiError::Internal(format!("failed to open {}: {}", full.display(), e)),
    })?;
    let metadata = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to stat {}: {}", full.display(), e)))?;
    if !metadata.is_file() {
        return Err(ApiError::NotFound(format!("file not found: {}", path)));
    }

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type(&relative)));
    if let Some(name) = relative.file_name().and_then(|n| n.to_str()) {
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name)) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response.extensions_mut().insert(FileStat {
        size: metadata.len(),
    });

    Ok(response)
}

/// JSON 404 for static paths that do not exist.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}

/// Accept only plain relative components; anything that could escape the
/// public directory yields `None`.
pub fn safe_relative_path(raw: &str) -> Option<PathBuf> {
    if raw.contains('\\') || raw.contains('\0') {
        return None;
    }

    let mut path = PathBuf::new();
    for component in Path::new(raw.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("js") | Some("mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("txt") | Some("log") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
