// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password authentication routes.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::auth::{authenticate, create_jwt, AuthUser, AUTH_COOKIE, TOKEN_TTL_SECS};
use crate::models::UserProfile;
use crate::routes::{created, ok, ok_message, ApiJson, ApiResponse};
use crate::services::accounts::{self, LoginRequest, SignupRequest};
use crate::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use std::sync::Arc;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/signin", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/signout", get(logout))
        .route("/api/auth/refresh", post(refresh))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/verify", get(verify))
}

/// Session cookie attributes. Cross-site frontends need `SameSite=None`,
/// which browsers only accept together with `Secure`.
fn session_cookie(config: &Config, value: String) -> Cookie<'static> {
    let same_site = if config.cookie_secure {
        SameSite::None
    } else {
        SameSite::Lax
    };
    Cookie::build((AUTH_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(same_site)
        .max_age(time::Duration::seconds(TOKEN_TTL_SECS as i64))
        .build()
}

fn issue_token(config: &Config, jar: CookieJar, user_id: &str) -> Result<(CookieJar, String)> {
    let token = create_jwt(user_id, &config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;
    let jar = jar.add(session_cookie(config, token.clone()));
    Ok((jar, token))
}

#[derive(Serialize)]
pub struct AuthPayload {
    pub user: UserProfile,
    pub token: String,
}

type AuthResponse = (CookieJar, (StatusCode, Json<ApiResponse<AuthPayload>>));

async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(request): ApiJson<SignupRequest>,
) -> Result<AuthResponse> {
    let user = accounts::signup(&state.db, request).await?;
    let (jar, token) = issue_token(&state.config, jar, &user.id)?;

    Ok((
        jar,
        created(
            "Account created successfully",
            AuthPayload {
                user: user.into(),
                token,
            },
        ),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<AuthResponse> {
    let user = accounts::login(&state.db, request).await?;
    let (jar, token) = issue_token(&state.config, jar, &user.id)?;

    Ok((
        jar,
        (
            StatusCode::OK,
            ok(
                "Login successful",
                AuthPayload {
                    user: user.into(),
                    token,
                },
            ),
        ),
    ))
}

/// Clear the session cookie. The removal carries the same attributes the
/// cookie was created with, or browsers ignore it.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<ApiResponse<()>>) {
    let removal = session_cookie(&state.config, String::new());
    (jar.remove(removal), ok_message("Signout success!"))
}

#[derive(Serialize)]
pub struct VerifyPayload {
    pub id: String,
}

async fn verify(Extension(user): Extension<AuthUser>) -> Json<ApiResponse<VerifyPayload>> {
    ok("Token valid", VerifyPayload { id: user.id })
}

#[derive(Serialize)]
pub struct TokenPayload {
    pub token: String,
}

/// Re-issue a fresh 7-day token from a still-valid one.
async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<TokenPayload>>)> {
    let user = authenticate(&headers, &jar, &state.config.jwt_signing_key)?;
    let (jar, token) = issue_token(&state.config, jar, &user.id)?;
    tracing::debug!(user_id = %user.id, "Token refreshed");

    Ok((jar, ok("Token refreshed", TokenPayload { token })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_cookie_is_lax_and_not_secure() {
        let cookie = session_cookie(&Config::test_default(), "t".to_string());
        assert_eq!(cookie.name(), "userToken");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn test_secure_cookie_allows_cross_site() {
        let mut config = Config::test_default();
        config.cookie_secure = true;
        let cookie = session_cookie(&config, "t".to_string());
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(
            cookie.max_age(),
            Some(time::Duration::seconds(TOKEN_TTL_SECS as i64))
        );
    }
}
