// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profiles, the email index, connections, and points.

use crate::db::collections;
use crate::db::firestore::{tx_delete, tx_error, tx_read, tx_write, FirestoreDb};
use crate::error::AppError;
use crate::models::notification::{Notification, NotificationType};
use crate::models::points::{PointsAward, PointsConfig, StatsDelta};
use crate::models::session::Session;
use crate::models::user::{LeaderboardField, QuizCompletion, User};
use crate::time_utils::now_rfc3339;
use firestore::errors::{BackoffError, FirestoreError};
use firestore::FirestoreQueryDirection;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Email index entry: `emails/{key}` → owning user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailIndexEntry {
    user_id: String,
}

/// Canonical form of an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn email_key(email: &str) -> String {
    urlencoding::encode(&normalize_email(email)).into_owned()
}

/// Profile fields a user may change. Anything else in the body is ignored.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DetailsUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub college: Option<String>,
    pub education_level: Option<String>,
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

impl DetailsUpdate {
    fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.trim().to_string();
        }
        if let Some(email) = &self.email {
            user.email = normalize_email(email);
        }
        if let Some(college) = &self.college {
            user.college = college.clone();
        }
        if let Some(level) = &self.education_level {
            user.education_level = level.clone();
        }
        if let Some(bio) = &self.bio {
            user.bio = bio.clone();
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = avatar.clone();
        }
    }
}

/// Outcome of a quiz completion.
#[derive(Debug, Clone)]
pub struct QuizResult {
    pub completion: QuizCompletion,
    /// `None` when the quiz had already been rewarded
    pub award: Option<PointsAward>,
}

impl QuizResult {
    pub fn already_awarded(&self) -> bool {
        self.award.is_none()
    }
}

impl FirestoreDb {
    // ─── Profiles ────────────────────────────────────────────────

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_doc(collections::USERS, user_id).await
    }

    /// Look a user up through the email index.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let entry: Option<EmailIndexEntry> =
            self.get_doc(collections::EMAILS, &email_key(email)).await?;
        match entry {
            Some(entry) => self.get_user(&entry.user_id).await,
            None => Ok(None),
        }
    }

    /// Create a user, claiming its email in the same transaction.
    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let user = user.clone();
        let key = email_key(&user.email);

        self.get_client()?
            .run_transaction(|db, transaction| {
                let user = user.clone();
                let key = key.clone();
                Box::pin(async move {
                    let existing: Option<EmailIndexEntry> =
                        tx_read(&db, collections::EMAILS, &key).await?;
                    if existing.is_some() {
                        return Ok(Err(AppError::Conflict(
                            "User already exists with this email".to_string(),
                        )));
                    }

                    let entry = EmailIndexEntry {
                        user_id: user.id.clone(),
                    };
                    tx_write(&db, transaction, collections::EMAILS, &key, &entry)?;
                    tx_write(&db, transaction, collections::USERS, &user.id, &user)?;
                    Ok::<_, BackoffError<FirestoreError>>(Ok(()))
                })
            })
            .await
            .map_err(tx_error)??;

        tracing::info!(user_id = %user.id, "User created");
        Ok(())
    }

    /// Apply whitelisted profile edits, moving the email index entry if the
    /// address changes.
    pub async fn update_user_details(
        &self,
        user_id: &str,
        update: &DetailsUpdate,
    ) -> Result<User, AppError> {
        let user_id = user_id.to_string();
        let update = update.clone();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let user_id = user_id.clone();
                let update = update.clone();
                Box::pin(async move {
                    let Some(mut user) = tx_read::<User>(&db, collections::USERS, &user_id).await?
                    else {
                        return Ok(Err(AppError::NotFound("User not found".to_string())));
                    };

                    let old_key = email_key(&user.email);
                    let new_key = update.email.as_deref().map(email_key);

                    if let Some(new_key) = new_key.filter(|k| *k != old_key) {
                        let taken: Option<EmailIndexEntry> =
                            tx_read(&db, collections::EMAILS, &new_key).await?;
                        if taken.is_some_and(|e| e.user_id != user_id) {
                            return Ok(Err(AppError::Conflict(
                                "Email already in use".to_string(),
                            )));
                        }
                        tx_delete(&db, transaction, collections::EMAILS, &old_key)?;
                        tx_write(
                            &db,
                            transaction,
                            collections::EMAILS,
                            &new_key,
                            &EmailIndexEntry {
                                user_id: user_id.clone(),
                            },
                        )?;
                    }

                    update.apply(&mut user);
                    user.updated_at = now_rfc3339();
                    tx_write(&db, transaction, collections::USERS, &user_id, &user)?;
                    Ok::<_, BackoffError<FirestoreError>>(Ok(user))
                })
            })
            .await
            .map_err(tx_error)?
    }

    /// Transactional read-modify-write of one user.
    pub async fn modify_user<R, F>(&self, user_id: &str, mutate: F) -> Result<R, AppError>
    where
        R: Send + 'static,
        F: Fn(&mut User) -> Result<R, AppError> + Clone + Send + Sync + 'static,
    {
        self.modify_doc(collections::USERS, user_id, "User not found", mutate)
            .await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Points ──────────────────────────────────────────────────

    /// Add points and stat deltas, then grant any newly earned badges.
    pub async fn award_points(
        &self,
        user_id: &str,
        amount: u32,
        reason: &str,
        delta: StatsDelta,
        config: &PointsConfig,
    ) -> Result<PointsAward, AppError> {
        let config = config.clone();
        let reason = reason.to_string();

        self.modify_user(user_id, move |user| {
            let new_badges = user.apply_award(amount, delta, &config);
            user.updated_at = now_rfc3339();
            Ok(PointsAward {
                points: user.points,
                points_awarded: amount,
                new_badges,
                reason: reason.clone(),
            })
        })
        .await
    }

    /// Reward a quiz at most once per (user, session).
    ///
    /// The session must exist, the user must be its creator or a member, and
    /// `score` cannot exceed the session's quiz length. The ledger check and
    /// the award commit together, so concurrent submissions cannot both pay
    /// out.
    pub async fn complete_quiz(
        &self,
        user_id: &str,
        session_id: &str,
        score: u32,
        points: u32,
        reason: &str,
        config: &PointsConfig,
    ) -> Result<QuizResult, AppError> {
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        let reason = reason.to_string();
        let config = config.clone();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let user_id = user_id.clone();
                let session_id = session_id.clone();
                let reason = reason.clone();
                let config = config.clone();
                Box::pin(async move {
                    let Some(session) =
                        tx_read::<Session>(&db, collections::SESSIONS, &session_id).await?
                    else {
                        return Ok(Err(AppError::NotFound("Session not found".to_string())));
                    };
                    if !session.is_participant(&user_id) {
                        return Ok(Err(AppError::Forbidden(
                            "You are not part of this session".to_string(),
                        )));
                    }
                    if score as usize > session.quiz_questions.len() {
                        return Ok(Err(AppError::Validation(
                            "Score cannot exceed the session's quiz length".to_string(),
                        )));
                    }

                    let Some(mut user) = tx_read::<User>(&db, collections::USERS, &user_id).await?
                    else {
                        return Ok(Err(AppError::NotFound("User not found".to_string())));
                    };
                    if let Some(existing) = user.quiz_completion(&session_id) {
                        return Ok(Ok(QuizResult {
                            completion: existing.clone(),
                            award: None,
                        }));
                    }

                    let now = now_rfc3339();
                    let new_badges =
                        user.apply_award(points, StatsDelta::sessions_completed(1), &config);
                    let completion = QuizCompletion {
                        session_id: session_id.clone(),
                        score,
                        awarded_points: points,
                        created_at: now.clone(),
                    };
                    user.quiz_completions.push(completion.clone());
                    user.updated_at = now;
                    tx_write(&db, transaction, collections::USERS, &user_id, &user)?;

                    Ok::<_, BackoffError<FirestoreError>>(Ok(QuizResult {
                        completion,
                        award: Some(PointsAward {
                            points: user.points,
                            points_awarded: points,
                            new_badges,
                            reason,
                        }),
                    }))
                })
            })
            .await
            .map_err(tx_error)?
    }

    // ─── Connections ─────────────────────────────────────────────

    /// Resolve a pending connection request.
    ///
    /// On accept both users gain each other as a connection. Either way the
    /// request is deleted in the same transaction, so it cannot be resolved
    /// twice. Returns the resolved request.
    pub async fn resolve_connection_request(
        &self,
        request_id: &str,
        recipient_id: &str,
        accept: bool,
    ) -> Result<Notification, AppError> {
        let request_id = request_id.to_string();
        let recipient_id = recipient_id.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let request_id = request_id.clone();
                let recipient_id = recipient_id.clone();
                Box::pin(async move {
                    let Some(request) =
                        tx_read::<Notification>(&db, collections::NOTIFICATIONS, &request_id)
                            .await?
                    else {
                        return Ok(Err(AppError::NotFound(
                            "Notification not found".to_string(),
                        )));
                    };
                    if request.recipient != recipient_id {
                        return Ok(Err(AppError::Forbidden("Unauthorized".to_string())));
                    }
                    if request.kind != NotificationType::ConnectionRequest {
                        return Ok(Err(AppError::Validation(
                            "Not a connection request".to_string(),
                        )));
                    }

                    let recipient: Option<User> =
                        tx_read(&db, collections::USERS, &recipient_id).await?;
                    let sender: Option<User> =
                        tx_read(&db, collections::USERS, &request.sender).await?;
                    let (Some(mut recipient), Some(mut sender)) = (recipient, sender) else {
                        return Ok(Err(AppError::NotFound("User not found".to_string())));
                    };

                    if accept {
                        let now = now_rfc3339();
                        recipient.add_connection(&sender.id);
                        sender.add_connection(&recipient.id);
                        recipient.updated_at = now.clone();
                        sender.updated_at = now;
                        tx_write(&db, transaction, collections::USERS, &recipient.id, &recipient)?;
                        tx_write(&db, transaction, collections::USERS, &sender.id, &sender)?;
                    }
                    tx_delete(&db, transaction, collections::NOTIFICATIONS, &request_id)?;

                    Ok::<_, BackoffError<FirestoreError>>(Ok(request))
                })
            })
            .await
            .map_err(tx_error)?
    }

    /// Remove a connection from both sides.
    pub async fn disconnect_users(&self, user_id: &str, other_id: &str) -> Result<(), AppError> {
        let user_id = user_id.to_string();
        let other_id = other_id.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let user_id = user_id.clone();
                let other_id = other_id.clone();
                Box::pin(async move {
                    let user: Option<User> = tx_read(&db, collections::USERS, &user_id).await?;
                    let other: Option<User> = tx_read(&db, collections::USERS, &other_id).await?;
                    let (Some(mut user), Some(mut other)) = (user, other) else {
                        return Ok(Err(AppError::NotFound("User not found".to_string())));
                    };

                    let now = now_rfc3339();
                    if user.remove_connection(&other_id) {
                        user.updated_at = now.clone();
                        tx_write(&db, transaction, collections::USERS, &user_id, &user)?;
                    }
                    if other.remove_connection(&user_id) {
                        other.updated_at = now;
                        tx_write(&db, transaction, collections::USERS, &other_id, &other)?;
                    }
                    Ok::<_, BackoffError<FirestoreError>>(Ok(()))
                })
            })
            .await
            .map_err(tx_error)?
    }

    // ─── Leaderboard ─────────────────────────────────────────────

    /// Top users by a stat, highest first.
    pub async fn leaderboard(
        &self,
        field: LeaderboardField,
        limit: u32,
    ) -> Result<Vec<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .order_by([(field.field_name(), FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of users strictly above `value` on a stat.
    pub async fn count_users_above(
        &self,
        field: LeaderboardField,
        value: u32,
    ) -> Result<usize, AppError> {
        let above: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.for_all([q.field(field.field_name()).greater_than(value)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(above.len())
    }

    // ─── Account Deletion ────────────────────────────────────────

    /// Delete a user and repair every reference to it.
    ///
    /// Peers' connection lists, session memberships, the email index entry,
    /// and the user document change atomically. Notifications to or from the
    /// user are removed afterwards in batches.
    ///
    /// Returns the number of documents deleted.
    pub async fn delete_user_account(&self, user_id: &str) -> Result<usize, AppError> {
        let uid = user_id.to_string();

        let repaired = self
            .get_client()?
            .run_transaction(|db, transaction| {
                let uid = uid.clone();
                Box::pin(async move {
                    let Some(user) = tx_read::<User>(&db, collections::USERS, &uid).await? else {
                        return Ok(Err(AppError::NotFound("User not found".to_string())));
                    };

                    // All reads first, then writes.
                    let mut peers = Vec::with_capacity(user.connections.len());
                    for peer_id in &user.connections {
                        if let Some(peer) = tx_read::<User>(&db, collections::USERS, peer_id).await? {
                            peers.push(peer);
                        }
                    }
                    let joined: Vec<Session> = db
                        .fluent()
                        .select()
                        .from(collections::SESSIONS)
                        .filter(|q| q.for_all([q.field("members").array_contains(uid.as_str())]))
                        .obj()
                        .query()
                        .await?;

                    let now = now_rfc3339();
                    let mut repaired = 0usize;
                    for mut peer in peers {
                        if peer.remove_connection(&uid) {
                            peer.updated_at = now.clone();
                            tx_write(&db, transaction, collections::USERS, &peer.id, &peer)?;
                            repaired += 1;
                        }
                    }
                    for mut session in joined {
                        if session.remove_member(&uid) {
                            session.updated_at = now.clone();
                            tx_write(&db, transaction, collections::SESSIONS, &session.id, &session)?;
                            repaired += 1;
                        }
                    }

                    tx_delete(&db, transaction, collections::EMAILS, &email_key(&user.email))?;
                    tx_delete(&db, transaction, collections::USERS, &uid)?;
                    Ok::<_, BackoffError<FirestoreError>>(Ok(repaired))
                })
            })
            .await
            .map_err(tx_error)??;

        tracing::debug!(user_id, repaired, "Removed user from peers and sessions");

        let mut notification_ids: Vec<String> = Vec::new();
        for field in ["recipient", "sender"] {
            let found: Vec<Notification> = self
                .find_by_field(collections::NOTIFICATIONS, field, user_id)
                .await?;
            for n in found {
                if !notification_ids.contains(&n.id) {
                    notification_ids.push(n.id);
                }
            }
        }
        self.batch_delete(collections::NOTIFICATIONS, &notification_ids)
            .await?;

        let deleted_count = notification_ids.len() + 2;
        tracing::info!(user_id, deleted_count, "User account deletion complete");

        Ok(deleted_count)
    }
}
