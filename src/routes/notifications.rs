// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notification inbox routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::notification::{Notification, Pagination};
use crate::models::points::{PointsAction, StatsDelta};
use crate::models::user::{User, UserSummary};
use crate::routes::users::load_user;
use crate::routes::{ok, ok_message, ApiJson, ApiResponse};
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/notifications",
            get(list_notifications).delete(clear_notifications),
        )
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/read-all", put(mark_all_read))
        .route("/api/notifications/{id}/read", put(mark_read))
        .route(
            "/api/notifications/{id}",
            axum::routing::delete(delete_notification),
        )
        .route("/api/notifications/{id}/respond", post(respond_to_invite))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    /// 1-based page and a bounded page size.
    pub fn resolve(&self) -> (u32, u32) {
        let page = self.page.filter(|&p| p > 0).unwrap_or(1);
        let limit = self
            .limit
            .filter(|&l| l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        (page, limit)
    }
}

/// Slice one page out of a newest-first listing.
pub fn page_of<T>(items: Vec<T>, page: u32, limit: u32) -> Vec<T> {
    let skip = (page as usize - 1).saturating_mul(limit as usize);
    items.into_iter().skip(skip).take(limit as usize).collect()
}

/// A notification with the sender's card attached.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_user: Option<UserSummary>,
}

#[derive(Serialize)]
pub struct NotificationsPayload {
    pub notifications: Vec<NotificationView>,
    pub pagination: Pagination,
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<NotificationsPayload>>> {
    let (page, limit) = query.resolve();
    let all = state.db.notifications_for(&user.id).await?;
    let total = u32::try_from(all.len()).unwrap_or(u32::MAX);
    let notifications = page_of(all, page, limit);

    let mut sender_ids: Vec<String> = Vec::new();
    for n in &notifications {
        if !sender_ids.contains(&n.sender) {
            sender_ids.push(n.sender.clone());
        }
    }
    let senders: HashMap<String, User> = state
        .db
        .get_users_by_ids(&sender_ids)
        .await?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    let notifications = notifications
        .into_iter()
        .map(|notification| NotificationView {
            sender_user: senders.get(&notification.sender).map(UserSummary::from),
            notification,
        })
        .collect();

    Ok(ok(
        "Notifications fetched successfully",
        NotificationsPayload {
            notifications,
            pagination: Pagination::new(page, limit, total),
        },
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountPayload {
    pub unread_count: usize,
}

async fn unread_count(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<UnreadCountPayload>>> {
    let unread_count = state.db.unread_count(&user.id).await?;
    Ok(ok("Unread count fetched", UnreadCountPayload { unread_count }))
}

#[derive(Serialize)]
pub struct NotificationPayload {
    pub notification: Notification,
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<NotificationPayload>>> {
    let notification = state.db.mark_notification_read(&id, &user.id).await?;
    Ok(ok(
        "Notification marked as read",
        NotificationPayload { notification },
    ))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<()>>> {
    let count = state.db.mark_all_notifications_read(&user.id).await?;
    tracing::debug!(user_id = %user.id, count, "Marked notifications read");
    Ok(ok_message("All notifications marked as read"))
}

async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    state.db.delete_notification(&id, &user.id).await?;
    Ok(ok_message("Notification deleted successfully"))
}

async fn clear_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<()>>> {
    let count = state.db.clear_notifications(&user.id).await?;
    tracing::info!(user_id = %user.id, count, "Notifications cleared");
    Ok(ok_message("All notifications cleared"))
}

// ─── Session Invites ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteAction {
    Accept,
    Decline,
}

#[derive(Deserialize)]
struct RespondBody {
    action: Option<InviteAction>,
}

#[derive(Serialize)]
pub struct RespondPayload {
    /// The reply sent to the session creator, if one was sent
    pub notification: Option<Notification>,
}

async fn respond_to_invite(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<RespondBody>,
) -> Result<Json<ApiResponse<RespondPayload>>> {
    let action = body
        .action
        .ok_or_else(|| AppError::Validation("Action must be accept or decline".to_string()))?;
    let accept = action == InviteAction::Accept;

    let response = state
        .db
        .respond_to_session_invite(&id, &user.id, accept)
        .await?;
    tracing::info!(
        user_id = %user.id,
        notification_id = %id,
        accept,
        newly_joined = response.newly_joined,
        "Session invite answered"
    );

    if response.newly_joined {
        state
            .points
            .award_best_effort(&user.id, PointsAction::AttendSession, StatsDelta::default())
            .await;
    }

    let responder = load_user(&state, &user.id).await?;
    let session_id = response.invite.metadata.session_id.clone().unwrap_or_default();
    let topic = response
        .session
        .as_ref()
        .map(|s| s.topic.clone())
        .unwrap_or_default();
    let reply = Notification::session_response(
        &user.id,
        &responder.name,
        &response.invite.sender,
        &session_id,
        &topic,
        accept,
        &now_rfc3339(),
    );

    // The creator gets one reply per session and outcome, whoever answered.
    let sent = state
        .notifier
        .send_unless_from_anyone(reply.clone(), |n| {
            n.metadata.session_id.as_deref() == Some(session_id.as_str())
        })
        .await;

    let verb = if accept { "accepted" } else { "declined" };
    Ok(ok(
        format!("Session invitation {} successfully", verb),
        RespondPayload {
            notification: sent.then_some(reply),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_bounds() {
        let q = PageQuery {
            page: None,
            limit: None,
        };
        assert_eq!(q.resolve(), (1, 20));

        let q = PageQuery {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(q.resolve(), (1, MAX_PAGE_SIZE));
    }

    #[test]
    fn test_page_of_slices_listing() {
        let items: Vec<u32> = (1..=25).collect();
        assert_eq!(page_of(items.clone(), 1, 10), (1..=10).collect::<Vec<_>>());
        assert_eq!(page_of(items.clone(), 3, 10), vec![21, 22, 23, 24, 25]);
        assert!(page_of(items, 4, 10).is_empty());
    }

    #[test]
    fn test_invite_action_parses_lowercase() {
        let body: RespondBody = serde_json::from_str(r#"{"action":"accept"}"#).unwrap();
        assert_eq!(body.action, Some(InviteAction::Accept));
        assert!(serde_json::from_str::<RespondBody>(r#"{"action":"maybe"}"#).is_err());
    }
}
