//! Merchant JWT verification for the board and display sockets
//!
//! Browsers cannot set headers on a WebSocket handshake, so the token is
//! accepted from `?token=` as well as `Authorization: Bearer`.

use http::HeaderMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::error::AppError;

/// JWT claims issued by the merchant backend
#[derive(Debug, Serialize, Deserialize)]
pub struct MerchantClaims {
    /// Staff user ID
    pub sub: String,
    pub merchant_id: i64,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

pub fn verify_token(token: &str, secret: &str) -> Result<MerchantClaims, AppError> {
    let token_data = jsonwebtoken::decode::<MerchantClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Merchant JWT validation failed: {e}");
        match e.kind() {
            ErrorKind::ExpiredSignature => AppError::token_expired(),
            _ => AppError::invalid_token("Invalid merchant token"),
        }
    })?;
    Ok(token_data.claims)
}

/// Token from the Authorization header, falling back to the query string
pub fn bearer_token<'a>(headers: &'a HeaderMap, query: Option<&'a str>) -> Result<&'a str, AppError> {
    let from_header = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    from_header
        .or(query)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(AppError::not_authenticated)
}
