// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Study session routes: scheduling, membership, ratings, and attachments.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::notification::{Notification, NotificationType};
use crate::models::points::{PointsAction, StatsDelta};
use crate::models::session::{Session, SessionDocument, SessionDraft, SessionStatus};
use crate::models::user::{User, UserSummary};
use crate::routes::users::load_user;
use crate::routes::{created, ok, ok_message, ApiJson, ApiResponse};
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const MAX_DOCUMENTS: usize = 10;
const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;
/// Subdirectory of the upload dir holding session attachments.
pub const SESSION_UPLOAD_SUBDIR: &str = "sessions";

const ALLOWED_DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/session/get-session/{session_id}", get(get_session))
        .route("/api/session/created-session", get(get_created_sessions))
        .route("/api/session/joined-session", get(get_joined_sessions))
        .route("/api/session/create-session", post(create_session))
        .route(
            "/api/session/create-with-documents",
            post(create_session_with_documents)
                .layer(DefaultBodyLimit::max(MAX_DOCUMENTS * MAX_DOCUMENT_BYTES + 1024 * 1024)),
        )
        .route("/api/session/accept-session", post(accept_session))
        .route("/api/session/cancel-session", post(leave_session))
        .route("/api/session/delete-session", post(delete_session))
        .route("/api/session/update-status", post(update_status))
        .route("/api/session/rate-session", post(rate_session))
}

#[derive(Serialize)]
pub struct SessionPayload {
    pub session: Session,
}

#[derive(Serialize)]
pub struct SessionsPayload<T: Serialize> {
    pub sessions: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionIdBody {
    #[serde(default)]
    session_id: String,
}

impl SessionIdBody {
    fn id(&self) -> Result<&str> {
        let id = self.session_id.trim();
        if id.is_empty() {
            return Err(AppError::Validation("Session ID is required".to_string()));
        }
        Ok(id)
    }
}

// ─── Reads ───────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SessionDetailPayload {
    pub session: Session,
    pub documents: Vec<SessionDocument>,
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<SessionDetailPayload>>> {
    let session = state
        .db
        .get_session(&session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;
    let documents = state.db.get_session_documents(&session_id).await?;

    Ok(ok(
        "Session fetched successfully",
        SessionDetailPayload { session, documents },
    ))
}

async fn get_created_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<SessionsPayload<Session>>>> {
    load_user(&state, &user.id).await?;
    let sessions = state.db.sessions_created_by(&user.id).await?;
    Ok(ok("Sessions fetched successfully", SessionsPayload { sessions }))
}

/// A joined session with its creator's card attached.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedSession {
    #[serde(flatten)]
    pub session: Session,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserSummary>,
}

async fn get_joined_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<SessionsPayload<JoinedSession>>>> {
    load_user(&state, &user.id).await?;
    let sessions = state.db.sessions_joined_by(&user.id).await?;

    let creator_ids: Vec<String> = sessions
        .iter()
        .map(|s| s.created_by.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let creators: HashMap<String, User> = state
        .db
        .get_users_by_ids(&creator_ids)
        .await?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    let sessions = sessions
        .into_iter()
        .map(|session| JoinedSession {
            creator: creators.get(&session.created_by).map(UserSummary::from),
            session,
        })
        .collect();

    Ok(ok(
        "Joined sessions fetched successfully",
        SessionsPayload { sessions },
    ))
}

// ─── Creation ────────────────────────────────────────────────

/// Invite every current connection of `creator` to `session`.
pub(crate) fn session_invites(creator: &User, session: &Session, now: &str) -> Vec<Notification> {
    creator
        .connections
        .iter()
        .map(|recipient| {
            Notification::session_invite(
                &creator.id,
                &creator.name,
                recipient,
                &session.id,
                &session.topic,
                now,
            )
        })
        .collect()
}

/// Side effects shared by both creation paths. Neither can fail the request.
async fn after_session_created(state: &AppState, creator: &User, session: &Session) {
    state
        .points
        .award_best_effort(&creator.id, PointsAction::CreateSession, StatsDelta::default())
        .await;

    let invites = session_invites(creator, session, &now_rfc3339());
    let sent = state.notifier.send_all(invites).await;
    tracing::info!(
        session_id = %session.id,
        creator = %creator.id,
        invites = sent,
        "Session created"
    );
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(draft): ApiJson<SessionDraft>,
) -> Result<(StatusCode, Json<ApiResponse<SessionPayload>>)> {
    let creator = load_user(&state, &user.id).await?;
    let session = draft.into_session(&user.id, &now_rfc3339())?;

    state.db.create_session(&session).await?;
    after_session_created(&state, &creator, &session).await;

    Ok(created("Session created successfully", SessionPayload { session }))
}

/// A file part read from a multipart body, not yet on disk.
#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    fn check(&self) -> Result<()> {
        if !ALLOWED_DOCUMENT_TYPES.contains(&self.content_type.as_str()) {
            return Err(AppError::Validation(format!(
                "Invalid file type: {}",
                self.filename
            )));
        }
        if self.data.len() > MAX_DOCUMENT_BYTES {
            return Err(AppError::Validation(format!(
                "File too large: {}",
                self.filename
            )));
        }
        Ok(())
    }

    /// Unique name on disk, keeping the original extension.
    pub fn stored_name(&self) -> String {
        let ext = std::path::Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        format!("documents-{}{}", uuid::Uuid::new_v4(), ext)
    }
}

struct SessionUpload {
    draft: SessionDraft,
    files: Vec<UploadedFile>,
}

async fn read_session_upload(mut multipart: Multipart) -> Result<SessionUpload> {
    let mut session_data: Option<String> = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read multipart field: {}", e)))?
    {
        match field.name() {
            Some("sessionData") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid session data: {}", e)))?;
                session_data = Some(text);
            }
            Some("documents") => {
                if files.len() == MAX_DOCUMENTS {
                    return Err(AppError::Validation(
                        "Cannot upload more than 10 files".to_string(),
                    ));
                }
                let filename = field.file_name().unwrap_or("document").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read file {}: {}", filename, e))
                })?;
                let file = UploadedFile {
                    filename,
                    content_type,
                    data,
                };
                file.check()?;
                files.push(file);
            }
            _ => {}
        }
    }

    let session_data =
        session_data.ok_or_else(|| AppError::Validation("Missing session data".to_string()))?;
    let draft: SessionDraft = serde_json::from_str(&session_data)
        .map_err(|e| AppError::Validation(format!("Invalid session data: {}", e)))?;

    Ok(SessionUpload { draft, files })
}

async fn store_documents(
    state: &AppState,
    session: &Session,
    uploader: &str,
    files: Vec<UploadedFile>,
) -> Result<Vec<SessionDocument>> {
    let dir = state.config.upload_dir.join(SESSION_UPLOAD_SUBDIR);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create upload dir: {}", e)))?;

    let now = now_rfc3339();
    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        let stored = file.stored_name();
        tokio::fs::write(dir.join(&stored), &file.data)
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to write {}: {}", file.filename, e))
            })?;

        documents.push(SessionDocument {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            file_size: file.data.len() as u64,
            filename: file.filename,
            file_type: file.content_type,
            uploaded_by: uploader.to_string(),
            upload_url: format!("/uploads/{}/{}", SESSION_UPLOAD_SUBDIR, stored),
            uploaded_at: now.clone(),
        });
    }

    state.db.create_session_documents(&documents).await?;
    Ok(documents)
}

#[derive(Serialize)]
pub struct SessionWithDocumentsPayload {
    pub session: Session,
    pub documents: Vec<SessionDocument>,
}

/// Multipart variant of session creation. Every part is validated before
/// anything is written.
async fn create_session_with_documents(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<SessionWithDocumentsPayload>>)> {
    let creator = load_user(&state, &user.id).await?;
    let upload = read_session_upload(multipart).await?;
    let session = upload.draft.into_session(&user.id, &now_rfc3339())?;

    state.db.create_session(&session).await?;
    let documents = store_documents(&state, &session, &user.id, upload.files).await?;
    tracing::info!(session_id = %session.id, documents = documents.len(), "Session documents stored");

    after_session_created(&state, &creator, &session).await;

    Ok(created(
        "Session created with documents",
        SessionWithDocumentsPayload { session, documents },
    ))
}

// ─── Membership ──────────────────────────────────────────────

async fn accept_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<SessionIdBody>,
) -> Result<Json<ApiResponse<SessionPayload>>> {
    let joined = state.db.join_session(body.id()?, &user.id, true).await?;
    if joined.newly_joined {
        state
            .points
            .award_best_effort(&user.id, PointsAction::AttendSession, StatsDelta::default())
            .await;
    }
    tracing::info!(user_id = %user.id, session_id = %joined.session.id, "Session joined");

    Ok(ok(
        "Session joined successfully",
        SessionPayload {
            session: joined.session,
        },
    ))
}

/// Leave a session the caller has joined.
async fn leave_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<SessionIdBody>,
) -> Result<Json<ApiResponse<SessionPayload>>> {
    let session = state.db.leave_session(body.id()?, &user.id).await?;
    tracing::info!(user_id = %user.id, session_id = %session.id, "Session left");

    Ok(ok("Session cancelled successfully", SessionPayload { session }))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<SessionIdBody>,
) -> Result<Json<ApiResponse<()>>> {
    state.db.delete_session(body.id()?, &user.id).await?;
    Ok(ok_message("Session deleted successfully"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    #[serde(default)]
    session_id: String,
    status: SessionStatus,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<StatusBody>,
) -> Result<Json<ApiResponse<SessionPayload>>> {
    if body.session_id.trim().is_empty() {
        return Err(AppError::Validation("Session ID is required".to_string()));
    }
    let session = state
        .db
        .update_session_status(body.session_id.trim(), &user.id, body.status)
        .await?;
    tracing::info!(session_id = %session.id, status = ?session.status, "Session status changed");

    Ok(ok("Session status updated successfully", SessionPayload { session }))
}

// ─── Ratings ─────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateBody {
    #[serde(default)]
    session_id: String,
    rating: Option<f64>,
    #[serde(default)]
    comment: String,
}

/// Accepts 1 to 5 inclusive. Fractional ratings are kept as given.
pub fn parse_rating(raw: Option<f64>) -> Result<f64> {
    let raw = raw.ok_or_else(|| {
        AppError::Validation("Session ID and rating are required".to_string())
    })?;
    if !(1.0..=5.0).contains(&raw) {
        return Err(AppError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(raw)
}

/// Rating prompts for invites that have not had one yet.
pub fn missing_rating_prompts(
    rater: &str,
    invites: &[Notification],
    existing_prompts: &[Notification],
    now: &str,
) -> Vec<Notification> {
    let prompted: HashSet<&str> = existing_prompts
        .iter()
        .filter_map(|p| p.metadata.invite_id.as_deref())
        .collect();

    invites
        .iter()
        .filter(|invite| !prompted.contains(invite.id.as_str()))
        .map(|invite| Notification::rating_prompt(rater, invite, now))
        .collect()
}

async fn send_rating_prompts(state: &AppState, session_id: &str, rater: &str) {
    let lookups = tokio::try_join!(
        state
            .db
            .notifications_for_session(session_id, NotificationType::SessionInvite),
        state
            .db
            .notifications_for_session(session_id, NotificationType::SessionRating),
    );
    match lookups {
        Ok((invites, prompts)) => {
            let missing = missing_rating_prompts(rater, &invites, &prompts, &now_rfc3339());
            state.notifier.send_all(missing).await;
        }
        Err(e) => {
            tracing::warn!(session_id, error = %e, "Failed to look up rating prompts");
        }
    }
}

async fn rate_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<RateBody>,
) -> Result<Json<ApiResponse<SessionPayload>>> {
    let session_id = body.session_id.trim();
    if session_id.is_empty() {
        return Err(AppError::Validation(
            "Session ID and rating are required".to_string(),
        ));
    }
    let rating = parse_rating(body.rating)?;

    let (session, first_rating) = state
        .db
        .rate_session(session_id, &user.id, rating, &body.comment)
        .await?;
    tracing::info!(
        session_id,
        user_id = %user.id,
        rating,
        average = session.average_rating,
        first_rating,
        "Session rated"
    );

    if first_rating {
        state
            .points
            .award_best_effort(&user.id, PointsAction::RateSession, StatsDelta::default())
            .await;
    }
    send_rating_prompts(&state, session_id, &user.id).await;

    Ok(ok("Session rated successfully", SessionPayload { session }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::tests::make_user;

    const NOW: &str = "2025-01-01T00:00:00.000Z";

    #[test]
    fn test_invites_go_to_every_connection() {
        let mut creator = make_user("creator");
        creator.connections = vec!["a".into(), "b".into(), "c".into()];
        let session = crate::models::session::tests::make_session("s1", "creator");

        let invites = session_invites(&creator, &session, NOW);
        assert_eq!(invites.len(), 3);
        for (invite, recipient) in invites.iter().zip(["a", "b", "c"]) {
            assert_eq!(invite.recipient, recipient);
            assert_eq!(invite.kind, NotificationType::SessionInvite);
            assert_eq!(invite.metadata.session_id.as_deref(), Some("s1"));
        }
    }

    #[test]
    fn test_rating_prompts_skip_already_prompted_invites() {
        let mut creator = make_user("creator");
        creator.connections = vec!["a".into(), "b".into()];
        let session = crate::models::session::tests::make_session("s1", "creator");
        let invites = session_invites(&creator, &session, NOW);

        let first = missing_rating_prompts("a", &invites, &[], NOW);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].metadata.invite_id.as_deref(), Some(invites[0].id.as_str()));

        let again = missing_rating_prompts("b", &invites, &first, NOW);
        assert!(again.is_empty());
    }

    #[test]
    fn test_rating_bounds() {
        assert_eq!(parse_rating(Some(5.0)).unwrap(), 5.0);
        assert_eq!(parse_rating(Some(1.0)).unwrap(), 1.0);
        assert_eq!(parse_rating(Some(4.5)).unwrap(), 4.5);
        assert!(matches!(parse_rating(Some(0.99)), Err(AppError::Validation(_))));
        assert!(matches!(parse_rating(Some(0.0)), Err(AppError::Validation(_))));
        assert!(matches!(parse_rating(Some(6.0)), Err(AppError::Validation(_))));
        assert!(matches!(parse_rating(None), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_document_type_allowlist() {
        let pdf = UploadedFile {
            filename: "notes.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: Bytes::from_static(b"%PDF"),
        };
        assert!(pdf.check().is_ok());
        let name = pdf.stored_name();
        assert!(name.starts_with("documents-"));
        assert!(name.ends_with(".pdf"));

        let exe = UploadedFile {
            filename: "setup.exe".to_string(),
            content_type: "application/x-msdownload".to_string(),
            data: Bytes::new(),
        };
        assert!(matches!(exe.check(), Err(AppError::Validation(_))));
    }
}
