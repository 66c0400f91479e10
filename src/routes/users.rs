// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile, account, search, and leaderboard routes.

use crate::db::DetailsUpdate;
use crate::error::{AppError, Result};
use crate::middleware::auth::{AuthUser, AUTH_COOKIE};
use crate::models::user::{Badge, LeaderboardField, User};
use crate::models::UserProfile;
use crate::routes::{ok, ApiJson, ApiResponse};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, put},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

const DEFAULT_LEADERBOARD_LIMIT: u32 = 50;
const MAX_LEADERBOARD_LIMIT: u32 = 200;
const MIN_SEARCH_LEN: usize = 2;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/user/profile", get(get_profile))
        .route("/api/user/search", get(search_users))
        .route("/api/user/update-details", put(update_details))
        .route("/api/user/delete-account", delete(delete_account))
        .route("/api/user/leaderboard/{filter}", get(get_leaderboard))
        .route("/api/user/leaderboard/rank/{user_id}", get(get_rank))
        .route("/api/user/verify-user/{id}", get(verify_user))
        .route("/api/user/{id}", get(get_user_by_id))
}

pub(crate) async fn load_user(state: &AppState, user_id: &str) -> Result<User> {
    state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

// ─── Profiles ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct UserPayload {
    pub user: UserProfile,
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<UserPayload>>> {
    let profile = load_user(&state, &user.id).await?;
    Ok(ok(
        "Profile fetched successfully",
        UserPayload {
            user: profile.into(),
        },
    ))
}

async fn get_user_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserPayload>>> {
    let user = load_user(&state, &id).await?;
    Ok(ok(
        "User fetched successfully",
        UserPayload { user: user.into() },
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyUserPayload {
    pub is_verified: bool,
}

async fn verify_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<VerifyUserPayload>>> {
    load_user(&state, &id).await?;
    Ok(ok(
        "User verification status checked",
        VerifyUserPayload { is_verified: true },
    ))
}

async fn update_details(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(update): ApiJson<DetailsUpdate>,
) -> Result<Json<ApiResponse<UserPayload>>> {
    update.validate()?;
    let updated = state.db.update_user_details(&user.id, &update).await?;
    tracing::info!(user_id = %user.id, "Profile details updated");

    Ok(ok(
        "User details updated successfully",
        UserPayload {
            user: updated.into(),
        },
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountPayload {
    pub deleted_documents: usize,
}

/// Delete the caller's account and log them out.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<DeleteAccountPayload>>)> {
    tracing::info!(user_id = %user.id, "User-initiated account deletion");
    let deleted_documents = state.db.delete_user_account(&user.id).await?;

    let jar = jar.remove(Cookie::build(AUTH_COOKIE).path("/"));
    Ok((
        jar,
        ok(
            "Account deleted successfully",
            DeleteAccountPayload { deleted_documents },
        ),
    ))
}

// ─── Search ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

/// Case-insensitive substring match on name or email, excluding the caller.
pub fn matches_search(user: &User, needle_lower: &str) -> bool {
    user.name.to_lowercase().contains(needle_lower)
        || user.email.to_lowercase().contains(needle_lower)
}

async fn search_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<UserProfile>>>> {
    let needle = query.q.trim().to_lowercase();
    if needle.chars().count() < MIN_SEARCH_LEN {
        return Err(AppError::Validation("Search query too short".to_string()));
    }

    let found: Vec<UserProfile> = state
        .db
        .list_users()
        .await?
        .into_iter()
        .filter(|u| u.id != user.id && matches_search(u, &needle))
        .map(UserProfile::from)
        .collect();

    Ok(ok(format!("Found {} users", found.len()), found))
}

// ─── Leaderboard ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub college: String,
    pub points: u32,
    pub sessions_completed: u32,
    pub questions_answered: u32,
    pub badges: Vec<Badge>,
    pub rating: f64,
    pub rank: usize,
}

impl LeaderboardEntry {
    fn new(user: &User, rank: usize) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            college: user.college.clone(),
            points: user.points,
            sessions_completed: user.sessions_completed,
            questions_answered: user.questions_answered,
            badges: user.badges.clone(),
            rating: user.rating,
            rank,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardPayload {
    pub top_users: Vec<LeaderboardEntry>,
    pub filter: &'static str,
    pub current_user_rank: usize,
    /// Present only when the caller is outside the top list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_user: Option<LeaderboardEntry>,
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<u32>,
}

async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(filter): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<ApiResponse<LeaderboardPayload>>> {
    let field = LeaderboardField::parse(&filter);
    let limit = query
        .limit
        .filter(|&l| l > 0)
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .min(MAX_LEADERBOARD_LIMIT);

    let current = load_user(&state, &user.id).await?;
    let top = state.db.leaderboard(field, limit).await?;
    let current_user_rank = state
        .db
        .count_users_above(field, current.stat(field))
        .await?
        + 1;

    let current_in_top = top.iter().any(|u| u.id == current.id);
    let top_users = top
        .iter()
        .enumerate()
        .map(|(i, u)| LeaderboardEntry::new(u, i + 1))
        .collect();

    Ok(ok(
        "Leaderboard fetched successfully",
        LeaderboardPayload {
            top_users,
            filter: field.field_name(),
            current_user_rank,
            current_user: (!current_in_top)
                .then(|| LeaderboardEntry::new(&current, current_user_rank)),
        },
    ))
}

#[derive(Serialize)]
pub struct RankPayload {
    pub rank: usize,
}

/// Points rank of any user.
async fn get_rank(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<RankPayload>>> {
    let target = load_user(&state, &user_id).await?;
    let rank = state
        .db
        .count_users_above(LeaderboardField::Points, target.points)
        .await?
        + 1;

    Ok(ok("User rank fetched successfully", RankPayload { rank }))
}
