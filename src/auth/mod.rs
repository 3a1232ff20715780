//! Token issuance and verification.
//!
//! # Routes
//! - `POST /auth/getToken` issues a signed bearer token for `{ "id": ... }`
//! - `POST /auth` answers `"post"`
//! - `GET /auth/verify` returns the claims of the presented token

pub mod handlers;
pub mod token;

use axum::http::StatusCode;

pub use token::{Claims, TokenIssuer};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("id is required")]
    MissingId,

    #[error("Not authenticated, please log in first")]
    MissingToken,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    InvalidToken(jsonwebtoken::errors::Error),

    #[error("Failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingId => StatusCode::BAD_REQUEST,
            Self::MissingToken | Self::Expired | Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
