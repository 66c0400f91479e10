// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the session cookie.
pub const AUTH_COOKIE: &str = "userToken";
/// Lifetime of an issued token.
pub const TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
}

/// Candidate tokens in the order they are tried: bearer header, then cookie.
pub fn request_tokens(headers: &HeaderMap, jar: &CookieJar) -> Vec<String> {
    let mut tokens = Vec::with_capacity(2);
    if let Some(bearer) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        tokens.push(bearer.trim().to_string());
    }
    if let Some(cookie) = jar.get(AUTH_COOKIE) {
        tokens.push(cookie.value().to_string());
    }
    tokens
}

/// Decode and check a token's signature and expiry.
pub fn verify_jwt(token: &str, signing_key: &[u8]) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::InvalidToken)
}

/// Resolve the caller from the first valid candidate token.
///
/// A stale bearer token does not mask a valid cookie.
pub fn authenticate(
    headers: &HeaderMap,
    jar: &CookieJar,
    signing_key: &[u8],
) -> Result<AuthUser, AppError> {
    let tokens = request_tokens(headers, jar);
    if tokens.is_empty() {
        return Err(AppError::Unauthorized);
    }

    tokens
        .iter()
        .find_map(|token| verify_jwt(token, signing_key).ok())
        .filter(|claims| !claims.sub.is_empty())
        .map(|claims| AuthUser { id: claims.sub })
        .ok_or(AppError::InvalidToken)
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = authenticate(request.headers(), &jar, &state.config.jwt_signing_key)?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Create a JWT for a user session.
pub fn create_jwt(user_id: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now as usize,
        exp: (now + TOKEN_TTL_SECS) as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
