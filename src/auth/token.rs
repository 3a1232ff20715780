//! Short-lived bearer tokens.

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::config::schema::AuthConfig;

pub const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub id: serde_json::Value,
    pub iat: u64,
    pub exp: u64,
}

/// Signs and verifies HS256 tokens with a shared secret.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.token_secret, config.token_ttl_secs)
    }

    /// Issue a token for `id`, returned with its `Bearer ` prefix.
    pub fn issue(&self, id: serde_json::Value) -> Result<String, AuthError> {
        self.issue_at(id, jsonwebtoken::get_current_timestamp())
    }

    pub fn issue_at(&self, id: serde_json::Value, issued_at: u64) -> Result<String, AuthError> {
        let claims = Claims {
            id,
            iat: issued_at,
            exp: issued_at + self.ttl_secs,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::Signing)?;
        Ok(format!("{}{}", BEARER_PREFIX, token))
    }

    /// Verify a token, with or without its `Bearer ` prefix.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let token = token.strip_prefix(BEARER_PREFIX).unwrap_or(token).trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e),
            })
    }
}
