// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sessions, membership, ratings, and attachments.

use crate::db::collections;
use crate::db::firestore::{tx_delete, tx_error, tx_read, tx_write, FirestoreDb};
use crate::error::AppError;
use crate::models::notification::{Notification, NotificationType};
use crate::models::session::{Session, SessionDocument, SessionStatus};
use crate::models::user::User;
use crate::time_utils::now_rfc3339;
use firestore::errors::{BackoffError, FirestoreError};

/// Outcome of adding a user to a session.
#[derive(Debug, Clone)]
pub struct JoinResult {
    pub session: Session,
    /// `false` if the user was already a member
    pub newly_joined: bool,
}

/// Outcome of answering a session invite.
#[derive(Debug, Clone)]
pub struct InviteResponse {
    /// The invite, now deleted
    pub invite: Notification,
    /// `None` if the session no longer exists
    pub session: Option<Session>,
    pub newly_joined: bool,
}

fn sort_by_session_on(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| a.session_on.cmp(&b.session_on));
}

impl FirestoreDb {
    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AppError> {
        self.get_doc(collections::SESSIONS, session_id).await
    }

    pub async fn create_session(&self, session: &Session) -> Result<(), AppError> {
        self.set_doc(collections::SESSIONS, &session.id, session)
            .await
    }

    pub async fn create_session_documents(
        &self,
        documents: &[SessionDocument],
    ) -> Result<(), AppError> {
        let docs = documents
            .iter()
            .map(|d| (d.id.clone(), d.clone()))
            .collect();
        self.batch_set(collections::SESSION_DOCUMENTS, docs).await
    }

    pub async fn get_session_documents(
        &self,
        session_id: &str,
    ) -> Result<Vec<SessionDocument>, AppError> {
        self.find_by_field(collections::SESSION_DOCUMENTS, "sessionId", session_id)
            .await
    }

    /// Sessions created by a user, soonest first.
    pub async fn sessions_created_by(&self, user_id: &str) -> Result<Vec<Session>, AppError> {
        let mut sessions: Vec<Session> = self
            .find_by_field(collections::SESSIONS, "createdBy", user_id)
            .await?;
        sort_by_session_on(&mut sessions);
        Ok(sessions)
    }

    /// Sessions a user has joined, soonest first.
    pub async fn sessions_joined_by(&self, user_id: &str) -> Result<Vec<Session>, AppError> {
        let mut sessions: Vec<Session> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SESSIONS)
            .filter(|q| q.for_all([q.field("members").array_contains(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        sort_by_session_on(&mut sessions);
        Ok(sessions)
    }

    /// Add a user to a session and the session to the user, atomically.
    ///
    /// With `reject_existing`, an existing member is a `Conflict`; otherwise
    /// joining twice is a no-op reported through `newly_joined`.
    pub async fn join_session(
        &self,
        session_id: &str,
        user_id: &str,
        reject_existing: bool,
    ) -> Result<JoinResult, AppError> {
        let session_id = session_id.to_string();
        let user_id = user_id.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let session_id = session_id.clone();
                let user_id = user_id.clone();
                Box::pin(async move {
                    let Some(mut user) = tx_read::<User>(&db, collections::USERS, &user_id).await?
                    else {
                        return Ok(Err(AppError::NotFound("User not found".to_string())));
                    };
                    let Some(mut session) =
                        tx_read::<Session>(&db, collections::SESSIONS, &session_id).await?
                    else {
                        return Ok(Err(AppError::NotFound("Session not found".to_string())));
                    };

                    if reject_existing && session.is_member(&user_id) {
                        return Ok(Err(AppError::Conflict(
                            "User already a member of the session".to_string(),
                        )));
                    }

                    let now = now_rfc3339();
                    let newly_joined = session.add_member(&user_id);
                    if newly_joined {
                        session.updated_at = now.clone();
                        tx_write(&db, transaction, collections::SESSIONS, &session_id, &session)?;
                    }
                    if user.add_session(&session_id) {
                        user.updated_at = now;
                        tx_write(&db, transaction, collections::USERS, &user_id, &user)?;
                    }

                    Ok::<_, BackoffError<FirestoreError>>(Ok(JoinResult {
                        session,
                        newly_joined,
                    }))
                })
            })
            .await
            .map_err(tx_error)?
    }

    /// Remove a member from a session and the session from the member.
    pub async fn leave_session(&self, session_id: &str, user_id: &str) -> Result<Session, AppError> {
        let session_id = session_id.to_string();
        let user_id = user_id.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let session_id = session_id.clone();
                let user_id = user_id.clone();
                Box::pin(async move {
                    let user: Option<User> = tx_read(&db, collections::USERS, &user_id).await?;
                    let Some(mut session) =
                        tx_read::<Session>(&db, collections::SESSIONS, &session_id).await?
                    else {
                        return Ok(Err(AppError::NotFound("Session not found".to_string())));
                    };

                    if !session.is_member(&user_id) {
                        return Ok(Err(AppError::Validation(
                            "User not a member of the session".to_string(),
                        )));
                    }

                    let now = now_rfc3339();
                    session.remove_member(&user_id);
                    session.updated_at = now.clone();
                    tx_write(&db, transaction, collections::SESSIONS, &session_id, &session)?;

                    if let Some(mut user) = user {
                        if user.remove_session(&session_id) {
                            user.updated_at = now;
                            tx_write(&db, transaction, collections::USERS, &user_id, &user)?;
                        }
                    }

                    Ok::<_, BackoffError<FirestoreError>>(Ok(session))
                })
            })
            .await
            .map_err(tx_error)?
    }

    /// Upsert a participant's rating. Returns the session and whether this
    /// was the user's first rating.
    pub async fn rate_session(
        &self,
        session_id: &str,
        user_id: &str,
        rating: f64,
        comment: &str,
    ) -> Result<(Session, bool), AppError> {
        let user_id = user_id.to_string();
        let comment = comment.to_string();

        self.modify_doc(
            collections::SESSIONS,
            session_id,
            "Session not found",
            move |session: &mut Session| {
                if !session.is_participant(&user_id) {
                    return Err(AppError::Forbidden(
                        "You are not part of this session".to_string(),
                    ));
                }
                let now = now_rfc3339();
                let is_new = session.upsert_rating(&user_id, rating, comment.clone(), &now);
                session.updated_at = now;
                Ok((session.clone(), is_new))
            },
        )
        .await
    }

    /// Explicit creator-driven status change.
    pub async fn update_session_status(
        &self,
        session_id: &str,
        user_id: &str,
        status: SessionStatus,
    ) -> Result<Session, AppError> {
        let user_id = user_id.to_string();

        self.modify_doc(
            collections::SESSIONS,
            session_id,
            "Session not found",
            move |session: &mut Session| {
                if session.created_by != user_id {
                    return Err(AppError::Forbidden(
                        "Only the session creator can change its status".to_string(),
                    ));
                }
                if !session.status.can_transition_to(status) {
                    return Err(AppError::Conflict(format!(
                        "Cannot change session status from {:?} to {:?}",
                        session.status, status
                    )));
                }
                session.status = status;
                session.updated_at = now_rfc3339();
                Ok(session.clone())
            },
        )
        .await
    }

    /// Delete a session and everything that points at it.
    ///
    /// Member back-references and the session itself go in one transaction;
    /// notifications and attachments referencing the session follow.
    /// Returns the number of documents deleted.
    pub async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<usize, AppError> {
        let sid = session_id.to_string();
        let uid = user_id.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let sid = sid.clone();
                let uid = uid.clone();
                Box::pin(async move {
                    let Some(session) =
                        tx_read::<Session>(&db, collections::SESSIONS, &sid).await?
                    else {
                        return Ok(Err(AppError::NotFound("Session not found".to_string())));
                    };
                    if session.created_by != uid {
                        return Ok(Err(AppError::Forbidden(
                            "Only the session creator can delete it".to_string(),
                        )));
                    }

                    let mut members = Vec::with_capacity(session.members.len());
                    for member_id in &session.members {
                        if let Some(member) =
                            tx_read::<User>(&db, collections::USERS, member_id).await?
                        {
                            members.push(member);
                        }
                    }

                    let now = now_rfc3339();
                    for mut member in members {
                        if member.remove_session(&sid) {
                            member.updated_at = now.clone();
                            tx_write(&db, transaction, collections::USERS, &member.id, &member)?;
                        }
                    }
                    tx_delete(&db, transaction, collections::SESSIONS, &sid)?;

                    Ok::<_, BackoffError<FirestoreError>>(Ok(()))
                })
            })
            .await
            .map_err(tx_error)??;

        let notifications: Vec<Notification> = self
            .find_by_field(collections::NOTIFICATIONS, "metadata.sessionId", session_id)
            .await?;
        let notification_ids: Vec<String> = notifications.into_iter().map(|n| n.id).collect();
        self.batch_delete(collections::NOTIFICATIONS, &notification_ids)
            .await?;

        let documents = self.get_session_documents(session_id).await?;
        let document_ids: Vec<String> = documents.into_iter().map(|d| d.id).collect();
        self.batch_delete(collections::SESSION_DOCUMENTS, &document_ids)
            .await?;

        let deleted_count = 1 + notification_ids.len() + document_ids.len();
        tracing::info!(
            session_id,
            deleted_count,
            "Session deleted with its notifications and documents"
        );
        Ok(deleted_count)
    }

    /// Consume a session invite addressed to `user_id`.
    ///
    /// The invite is deleted in the same transaction that (on accept) adds
    /// the membership, so an invite can be answered only once.
    pub async fn respond_to_session_invite(
        &self,
        notification_id: &str,
        user_id: &str,
        accept: bool,
    ) -> Result<InviteResponse, AppError> {
        let nid = notification_id.to_string();
        let uid = user_id.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let nid = nid.clone();
                let uid = uid.clone();
                Box::pin(async move {
                    let invite: Option<Notification> =
                        tx_read(&db, collections::NOTIFICATIONS, &nid).await?;
                    let Some(invite) = invite.filter(|n| {
                        n.recipient == uid && n.kind == NotificationType::SessionInvite
                    }) else {
                        return Ok(Err(AppError::NotFound(
                            "Notification not found".to_string(),
                        )));
                    };
                    let Some(session_id) = invite.metadata.session_id.clone() else {
                        return Ok(Err(AppError::Validation("Session not found".to_string())));
                    };

                    let session: Option<Session> =
                        tx_read(&db, collections::SESSIONS, &session_id).await?;
                    let user: Option<User> = tx_read(&db, collections::USERS, &uid).await?;

                    tx_delete(&db, transaction, collections::NOTIFICATIONS, &nid)?;

                    let mut newly_joined = false;
                    let session = match (accept, session, user) {
                        (true, Some(mut session), Some(mut user)) => {
                            let now = now_rfc3339();
                            newly_joined = session.add_member(&uid);
                            if newly_joined {
                                session.updated_at = now.clone();
                                tx_write(&db, transaction, collections::SESSIONS, &session_id, &session)?;
                            }
                            if user.add_session(&session_id) {
                                user.updated_at = now;
                                tx_write(&db, transaction, collections::USERS, &uid, &user)?;
                            }
                            Some(session)
                        }
                        (_, session, _) => session,
                    };

                    Ok::<_, BackoffError<FirestoreError>>(Ok(InviteResponse {
                        invite,
                        session,
                        newly_joined,
                    }))
                })
            })
            .await
            .map_err(tx_error)?
    }
}
