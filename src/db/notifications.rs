// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inbox notifications.

use crate::db::collections;
use crate::db::firestore::{tx_delete, tx_error, tx_read, tx_write, FirestoreDb};
use crate::error::AppError;
use crate::models::notification::{Notification, NotificationType};
use crate::models::user::User;
use firestore::errors::{BackoffError, FirestoreError};

fn newest_first(notifications: &mut [Notification]) {
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

impl FirestoreDb {
    pub async fn get_notification(
        &self,
        notification_id: &str,
    ) -> Result<Option<Notification>, AppError> {
        self.get_doc(collections::NOTIFICATIONS, notification_id)
            .await
    }

    pub async fn create_notification(&self, notification: &Notification) -> Result<(), AppError> {
        self.set_doc(collections::NOTIFICATIONS, &notification.id, notification)
            .await
    }

    pub async fn create_notifications(
        &self,
        notifications: Vec<Notification>,
    ) -> Result<(), AppError> {
        let docs = notifications
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();
        self.batch_set(collections::NOTIFICATIONS, docs).await
    }

    /// A recipient's whole inbox, newest first.
    pub async fn notifications_for(&self, recipient: &str) -> Result<Vec<Notification>, AppError> {
        let mut notifications: Vec<Notification> = self
            .find_by_field(collections::NOTIFICATIONS, "recipient", recipient)
            .await?;
        newest_first(&mut notifications);
        Ok(notifications)
    }

    /// Notifications of one type matching the given recipient and/or
    /// sender, newest first.
    pub async fn find_notifications(
        &self,
        recipient: Option<&str>,
        sender: Option<&str>,
        kind: NotificationType,
    ) -> Result<Vec<Notification>, AppError> {
        let mut notifications: Vec<Notification> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::NOTIFICATIONS)
            .filter(|q| {
                q.for_all([
                    q.field("type").eq(kind.as_str()),
                    recipient.and_then(|r| q.field("recipient").eq(r)),
                    sender.and_then(|s| q.field("sender").eq(s)),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        newest_first(&mut notifications);
        Ok(notifications)
    }

    /// Notifications of one type attached to a session.
    pub async fn notifications_for_session(
        &self,
        session_id: &str,
        kind: NotificationType,
    ) -> Result<Vec<Notification>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::NOTIFICATIONS)
            .filter(|q| {
                q.for_all([
                    q.field("metadata.sessionId").eq(session_id),
                    q.field("type").eq(kind.as_str()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn unread_for(&self, recipient: &str) -> Result<Vec<Notification>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::NOTIFICATIONS)
            .filter(|q| {
                q.for_all([
                    q.field("recipient").eq(recipient),
                    q.field("isRead").eq(false),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn unread_count(&self, recipient: &str) -> Result<usize, AppError> {
        Ok(self.unread_for(recipient).await?.len())
    }

    pub async fn mark_notification_read(
        &self,
        notification_id: &str,
        recipient: &str,
    ) -> Result<Notification, AppError> {
        let recipient = recipient.to_string();
        self.modify_doc(
            collections::NOTIFICATIONS,
            notification_id,
            "Notification not found",
            move |n: &mut Notification| {
                if n.recipient != recipient {
                    return Err(AppError::NotFound("Notification not found".to_string()));
                }
                n.is_read = true;
                Ok(n.clone())
            },
        )
        .await
    }

    /// Returns the number of notifications changed.
    pub async fn mark_all_notifications_read(&self, recipient: &str) -> Result<usize, AppError> {
        let unread = self.unread_for(recipient).await?;
        let count = unread.len();
        let docs = unread
            .into_iter()
            .map(|mut n| {
                n.is_read = true;
                (n.id.clone(), n)
            })
            .collect();
        self.batch_set(collections::NOTIFICATIONS, docs).await?;
        Ok(count)
    }

    /// Delete one of the recipient's notifications.
    pub async fn delete_notification(
        &self,
        notification_id: &str,
        recipient: &str,
    ) -> Result<(), AppError> {
        let nid = notification_id.to_string();
        let recipient = recipient.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let nid = nid.clone();
                let recipient = recipient.clone();
                Box::pin(async move {
                    let found: Option<Notification> =
                        tx_read(&db, collections::NOTIFICATIONS, &nid).await?;
                    if !found.is_some_and(|n| n.recipient == recipient) {
                        return Ok(Err(AppError::NotFound(
                            "Notification not found".to_string(),
                        )));
                    }
                    tx_delete(&db, transaction, collections::NOTIFICATIONS, &nid)?;
                    Ok::<_, BackoffError<FirestoreError>>(Ok(()))
                })
            })
            .await
            .map_err(tx_error)?
    }

    /// Delete the recipient's whole inbox. Returns the number deleted.
    pub async fn clear_notifications(&self, recipient: &str) -> Result<usize, AppError> {
        let ids: Vec<String> = self
            .notifications_for(recipient)
            .await?
            .into_iter()
            .map(|n| n.id)
            .collect();
        self.batch_delete(collections::NOTIFICATIONS, &ids).await?;
        Ok(ids.len())
    }

    /// Store a connection request after checking that neither a connection
    /// nor a request in the same direction already exists.
    ///
    /// The request ID is derived from the two user IDs, so the existence
    /// check and the write conflict with any concurrent duplicate.
    pub async fn create_connection_request(&self, request: &Notification) -> Result<(), AppError> {
        let request = request.clone();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let request = request.clone();
                Box::pin(async move {
                    let sender: Option<User> =
                        tx_read(&db, collections::USERS, &request.sender).await?;
                    let recipient: Option<User> =
                        tx_read(&db, collections::USERS, &request.recipient).await?;
                    let (Some(sender), Some(_)) = (sender, recipient) else {
                        return Ok(Err(AppError::NotFound("User not found".to_string())));
                    };
                    if sender.is_connected_to(&request.recipient) {
                        return Ok(Err(AppError::Conflict(
                            "Already connected with this user".to_string(),
                        )));
                    }

                    let existing: Option<Notification> =
                        tx_read(&db, collections::NOTIFICATIONS, &request.id).await?;
                    if existing.is_some() {
                        return Ok(Err(AppError::Conflict(
                            "Connection request already sent".to_string(),
                        )));
                    }

                    tx_write(&db, transaction, collections::NOTIFICATIONS, &request.id, &request)?;
                    Ok::<_, BackoffError<FirestoreError>>(Ok(()))
                })
            })
            .await
            .map_err(tx_error)?
    }
}
