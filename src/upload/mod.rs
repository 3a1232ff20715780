//! Multipart file uploads.
//!
//! # Routes
//! - `POST /upload` single file in field `file`
//! - `POST /upload/multiple` up to `upload.max_files` files in `fileList`
//! - `POST /upload/mix` `avatar` (max 1) and `idCards` (max 2)
//!
//! Files are streamed to `upload.dir` under their sanitized original name.
//! A request that fails part way removes every file it already wrote.

pub mod handlers;
pub mod storage;

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

pub use storage::{FieldRule, StoredFile, UploadStore};

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File too large, maximum is {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("Please choose a file to upload")]
    NoFile,

    #[error("Unexpected field: {0}")]
    UnexpectedField(String),

    #[error("Too many files in field {field}, maximum is {max}")]
    TooManyFiles { field: String, max: usize },

    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Stable code clients can branch on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FileTooLarge { .. } => "LIMIT_FILE_SIZE",
            Self::NoFile => "NO_FILE",
            Self::UnexpectedField(_) | Self::TooManyFiles { .. } => "LIMIT_UNEXPECTED_FILE",
            Self::Multipart(_) => "MALFORMED_MULTIPART",
            Self::Io(_) => "STORAGE_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
