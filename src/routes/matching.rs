// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Partner discovery, suggestions, and the connection request flow.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::notification::{connection_request_id, Notification, NotificationType};
use crate::models::user::{SkillLevel, User};
use crate::models::UserProfile;
use crate::routes::users::load_user;
use crate::routes::{ok, ok_message, ApiJson, ApiResponse};
use crate::services::recommender::{
    skills_to_match, Recommendation, SuggestionMode, UserFeatures, SUGGESTION_COUNT,
};
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

const FIND_LIMIT: usize = 50;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/matching/suggestions", get(get_suggestions))
        .route("/api/matching/find", get(find_users))
        .route("/api/matching/connections", get(get_connections))
        .route(
            "/api/matching/connections/{connection_id}",
            delete(delete_connection),
        )
        .route(
            "/api/matching/connection-requests",
            get(get_connection_requests),
        )
        .route("/api/matching/connect", post(send_connection_request))
        .route("/api/matching/accept-request", post(accept_request))
        .route("/api/matching/decline-request", post(decline_request))
}

// ─── Suggestions ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SuggestedUser {
    #[serde(flatten)]
    pub user: UserProfile,
    pub similarity: f64,
}

#[derive(Serialize)]
pub struct MatchesPayload {
    pub matches: Vec<SuggestedUser>,
}

#[derive(Deserialize)]
struct SuggestionQuery {
    #[serde(default)]
    mode: SuggestionMode,
}

/// Join recommender output with stored users.
///
/// In learn mode, when any recommended user teaches one of `wanted`, only
/// those users are kept. Order follows the recommender.
pub fn merge_recommendations(
    recommendations: &[Recommendation],
    users: Vec<User>,
    me: &str,
    mode: SuggestionMode,
    wanted: &[String],
) -> Vec<SuggestedUser> {
    let mut by_id: HashMap<String, User> = users
        .into_iter()
        .filter(|u| u.id != me)
        .map(|u| (u.id.clone(), u))
        .collect();

    let mut ranked: Vec<(User, f64)> = recommendations
        .iter()
        .filter_map(|r| by_id.remove(&r.user_id).map(|u| (u, r.similarity)))
        .collect();

    if mode == SuggestionMode::Learn && !wanted.is_empty() {
        let teachers: Vec<(User, f64)> = ranked
            .iter()
            .filter(|(u, _)| u.teaches_any(wanted))
            .cloned()
            .collect();
        if !teachers.is_empty() {
            ranked = teachers;
        }
    }

    ranked
        .into_iter()
        .map(|(user, similarity)| SuggestedUser {
            user: user.into(),
            similarity,
        })
        .collect()
}

/// Deterministic suggestions used when the recommender is unavailable.
pub fn fallback_suggestions(users: Vec<User>, me: &str, count: usize) -> Vec<SuggestedUser> {
    users
        .into_iter()
        .filter(|u| u.id != me)
        .take(count)
        .map(|u| SuggestedUser {
            similarity: u.match_percentage,
            user: u.into(),
        })
        .collect()
}

async fn get_suggestions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SuggestionQuery>,
) -> Result<Json<ApiResponse<MatchesPayload>>> {
    let current = load_user(&state, &user.id).await?;
    let features = UserFeatures::for_user(&current, query.mode);

    match state.recommender.recommend(&features, SUGGESTION_COUNT).await {
        Ok(recommendations) => {
            let ids: Vec<String> = recommendations.iter().map(|r| r.user_id.clone()).collect();
            let users = state.db.get_users_by_ids(&ids).await?;
            let wanted = skills_to_match(&current, query.mode);
            let matches =
                merge_recommendations(&recommendations, users, &user.id, query.mode, &wanted);

            Ok(ok("Suggestions fetched successfully", MatchesPayload { matches }))
        }
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Recommender unavailable, using fallback");
            let users = state.db.list_users().await?;
            let matches = fallback_suggestions(users, &user.id, SUGGESTION_COUNT as usize);

            Ok(ok(
                "Suggestions fetched (fallback mode)",
                MatchesPayload { matches },
            ))
        }
    }
}

// ─── Discovery ───────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct FindQuery {
    pub skill: Option<String>,
    pub university: Option<String>,
    pub level: Option<String>,
    pub search: Option<String>,
}

/// `None`, empty, and `all` all mean "no filter".
fn active_filter(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
        .map(str::to_lowercase)
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

impl FindQuery {
    pub fn matches(&self, user: &User) -> bool {
        if let Some(skill) = active_filter(&self.skill) {
            if !user.skills_can_teach.iter().any(|s| contains_ci(&s.name, &skill)) {
                return false;
            }
        }
        if let Some(university) = active_filter(&self.university) {
            if !contains_ci(&user.college, &university) {
                return false;
            }
        }
        if let Some(level) = active_filter(&self.level) {
            let level: Option<SkillLevel> =
                serde_json::from_value(serde_json::Value::String(level)).ok();
            if !user.skills_can_teach.iter().any(|s| Some(s.level) == level) {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let search = search.to_lowercase();
            let hit = contains_ci(&user.name, &search)
                || contains_ci(&user.college, &search)
                || contains_ci(&user.bio, &search)
                || user.skills_can_teach.iter().any(|s| contains_ci(&s.name, &search));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Highest rating first, then most points.
pub fn rank_partners(users: &mut [User]) {
    users.sort_by(|a, b| {
        b.rating
            .partial_cmp(&a.rating)
            .unwrap_or(Ordering::Equal)
            .then(b.points.cmp(&a.points))
    });
}

async fn find_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<FindQuery>,
) -> Result<Json<ApiResponse<Vec<UserProfile>>>> {
    load_user(&state, &user.id).await?;

    let mut found: Vec<User> = state
        .db
        .list_users()
        .await?
        .into_iter()
        .filter(|u| u.id != user.id && query.matches(u))
        .collect();
    rank_partners(&mut found);
    found.truncate(FIND_LIMIT);

    let found: Vec<UserProfile> = found.into_iter().map(UserProfile::from).collect();
    Ok(ok(format!("Found {} users", found.len()), found))
}

// ─── Connections ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct ConnectionsPayload {
    pub connections: Vec<UserProfile>,
}

async fn get_connections(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<ConnectionsPayload>>> {
    let current = load_user(&state, &user.id).await?;
    let connections = state
        .db
        .get_users_by_ids(&current.connections)
        .await?
        .into_iter()
        .map(UserProfile::from)
        .collect();

    Ok(ok(
        "Connections retrieved successfully",
        ConnectionsPayload { connections },
    ))
}

async fn delete_connection(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(connection_id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    state.db.disconnect_users(&user.id, &connection_id).await?;
    tracing::info!(user_id = %user.id, other_id = %connection_id, "Connection removed");
    Ok(ok_message("Connection removed successfully"))
}

/// A pending request with the other party's profile attached.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    #[serde(flatten)]
    pub request: Notification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_user: Option<UserProfile>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequestsPayload {
    pub requests: Vec<PendingRequest>,
    pub sent_requests: Vec<PendingRequest>,
}

async fn with_other_party(
    state: &AppState,
    requests: Vec<Notification>,
    other: fn(&Notification) -> &str,
) -> Result<Vec<PendingRequest>> {
    let ids: Vec<String> = requests.iter().map(|n| other(n).to_string()).collect();
    let mut users: HashMap<String, User> = state
        .db
        .get_users_by_ids(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    Ok(requests
        .into_iter()
        .map(|request| PendingRequest {
            other_user: users.remove(other(&request)).map(UserProfile::from),
            request,
        })
        .collect())
}

async fn get_connection_requests(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<ConnectionRequestsPayload>>> {
    let received: Vec<Notification> = state
        .db
        .find_notifications(Some(&user.id), None, NotificationType::ConnectionRequest)
        .await?
        .into_iter()
        .filter(|n| !n.is_read)
        .collect();
    let sent: Vec<Notification> = state
        .db
        .find_notifications(None, Some(&user.id), NotificationType::ConnectionRequest)
        .await?
        .into_iter()
        .filter(|n| !n.is_read)
        .collect();

    let requests = with_other_party(&state, received, |n| n.sender.as_str()).await?;
    let sent_requests = with_other_party(&state, sent, |n| n.recipient.as_str()).await?;

    Ok(ok(
        "Connection requests retrieved successfully",
        ConnectionRequestsPayload {
            requests,
            sent_requests,
        },
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectRequest {
    #[serde(default)]
    partner_id: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
pub struct NotificationPayload {
    pub notification: Notification,
}

async fn send_connection_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<ConnectRequest>,
) -> Result<Json<ApiResponse<NotificationPayload>>> {
    let partner_id = body.partner_id.trim();
    if partner_id.is_empty() {
        return Err(AppError::Validation("Partner ID is required".to_string()));
    }
    if partner_id == user.id {
        return Err(AppError::Validation(
            "Cannot connect with yourself".to_string(),
        ));
    }

    let current = load_user(&state, &user.id).await?;
    let notification = Notification::connection_request(
        &user.id,
        &current.name,
        partner_id,
        body.message,
        &now_rfc3339(),
    );
    state.db.create_connection_request(&notification).await?;
    tracing::info!(from = %user.id, to = %partner_id, "Connection request sent");

    Ok(ok(
        "Connection request sent successfully",
        NotificationPayload { notification },
    ))
}

/// Identifies a request either directly or by its sender.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveRequest {
    #[serde(default)]
    notification_id: Option<String>,
    #[serde(default)]
    requester_id: Option<String>,
}

impl ResolveRequest {
    fn request_id(&self, me: &str) -> Result<String> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        non_empty(&self.notification_id)
            .or_else(|| non_empty(&self.requester_id).map(|r| connection_request_id(&r, me)))
            .ok_or_else(|| AppError::Validation("Notification ID is required".to_string()))
    }
}

#[derive(Serialize)]
pub struct AcceptPayload {
    pub connection: UserProfile,
}

async fn accept_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<ResolveRequest>,
) -> Result<Json<ApiResponse<AcceptPayload>>> {
    let request_id = body.request_id(&user.id)?;
    let request = state
        .db
        .resolve_connection_request(&request_id, &user.id, true)
        .await?;
    tracing::info!(user_id = %user.id, requester = %request.sender, "Connection request accepted");

    let current = load_user(&state, &user.id).await?;
    let requester = load_user(&state, &request.sender).await?;
    state
        .notifier
        .send(Notification::connection_response(
            &user.id,
            &current.name,
            &request.sender,
            true,
            &now_rfc3339(),
        ))
        .await;

    Ok(ok(
        "Connection request accepted",
        AcceptPayload {
            connection: requester.into(),
        },
    ))
}

async fn decline_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<ResolveRequest>,
) -> Result<Json<ApiResponse<()>>> {
    let request_id = body.request_id(&user.id)?;
    let request = state
        .db
        .resolve_connection_request(&request_id, &user.id, false)
        .await?;
    tracing::info!(user_id = %user.id, requester = %request.sender, "Connection request declined");

    let current = load_user(&state, &user.id).await?;
    state
        .notifier
        .send(Notification::connection_response(
            &user.id,
            &current.name,
            &request.sender,
            false,
            &now_rfc3339(),
        ))
        .await;

    Ok(ok_message("Connection request declined"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::tests::make_user;
    use crate::models::user::TeachSkill;

    fn teacher(id: &str, skill: &str) -> User {
        let mut user = make_user(id);
        user.skills_can_teach.push(TeachSkill {
            id: format!("{}-skill", id),
            name: skill.to_string(),
            level: SkillLevel::Advanced,
            category: String::new(),
        });
        user
    }

    fn rec(id: &str, similarity: f64) -> Recommendation {
        serde_json::from_value(serde_json::json!({"_id": id, "similarity": similarity})).unwrap()
    }

    #[test]
    fn test_learn_mode_prefers_teachers_of_wanted_skill() {
        let users = vec![teacher("a", "Rust"), teacher("b", "Go"), teacher("me", "Rust")];
        let recs = vec![rec("b", 0.9), rec("a", 0.8), rec("me", 1.0)];

        let merged = merge_recommendations(
            &recs,
            users,
            "me",
            SuggestionMode::Learn,
            &["rust".to_string()],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].user.id, "a");
        assert_eq!(merged[0].similarity, 0.8);
    }

    #[test]
    fn test_learn_mode_keeps_all_when_nobody_teaches_skill() {
        let users = vec![teacher("a", "Rust"), teacher("b", "Go")];
        let recs = vec![rec("b", 0.9), rec("a", 0.8)];

        let merged = merge_recommendations(
            &recs,
            users,
            "me",
            SuggestionMode::Learn,
            &["Haskell".to_string()],
        );
        let ids: Vec<&str> = merged.iter().map(|m| m.user.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_fallback_excludes_self_and_uses_match_percentage() {
        let mut other = make_user("a");
        other.match_percentage = 72.0;
        let users = vec![make_user("me"), other, make_user("b"), make_user("c")];

        let fallback = fallback_suggestions(users, "me", 2);
        assert_eq!(fallback.len(), 2);
        assert_eq!(fallback[0].user.id, "a");
        assert_eq!(fallback[0].similarity, 72.0);
    }

    #[test]
    fn test_find_filters_treat_all_as_unfiltered() {
        let mut user = teacher("a", "Distributed Systems");
        user.college = "Stanford University".to_string();

        let query = FindQuery {
            skill: Some("all".to_string()),
            university: Some("stanford".to_string()),
            level: Some("advanced".to_string()),
            search: None,
        };
        assert!(query.matches(&user));

        let query = FindQuery {
            level: Some("beginner".to_string()),
            ..Default::default()
        };
        assert!(!query.matches(&user));

        let query = FindQuery {
            search: Some("systems".to_string()),
            ..Default::default()
        };
        assert!(query.matches(&user));
    }

    #[test]
    fn test_partners_ranked_by_rating_then_points() {
        let mut a = make_user("a");
        a.rating = 4.0;
        a.points = 10;
        let mut b = make_user("b");
        b.rating = 4.5;
        let mut c = make_user("c");
        c.rating = 4.0;
        c.points = 50;

        let mut users = vec![a, b, c];
        rank_partners(&mut users);
        let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_resolve_by_requester_uses_deterministic_id() {
        let body = ResolveRequest {
            notification_id: None,
            requester_id: Some("alice".to_string()),
        };
        assert_eq!(body.request_id("bob").unwrap(), "connreq_alice_bob");

        let body = ResolveRequest {
            notification_id: Some(" ".to_string()),
            requester_id: None,
        };
        assert!(matches!(body.request_id("bob"), Err(AppError::Validation(_))));
    }
}
