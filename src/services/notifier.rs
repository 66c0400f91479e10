// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notification fan-out.
//!
//! Notifications are side effects of other writes. Every method here logs
//! failures at `warn` and returns normally; the triggering action is never
//! rolled back because an inbox entry could not be written.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::notification::Notification;

#[derive(Clone)]
pub struct Notifier {
    db: FirestoreDb,
}

impl Notifier {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Store one notification. Returns whether it was written.
    pub async fn send(&self, notification: Notification) -> bool {
        match self.db.create_notification(&notification).await {
            Ok(()) => true,
            Err(e) => {
                log_failure(&notification, &e);
                false
            }
        }
    }

    /// Store many notifications. Returns how many were requested, or 0 if
    /// the batch failed.
    pub async fn send_all(&self, notifications: Vec<Notification>) -> usize {
        let count = notifications.len();
        if count == 0 {
            return 0;
        }
        let kind = notifications[0].kind;

        match self.db.create_notifications(notifications).await {
            Ok(()) => {
                tracing::info!(count, kind = kind.as_str(), "Notifications sent");
                count
            }
            Err(e) => {
                tracing::warn!(count, kind = kind.as_str(), error = %e, "Failed to send notifications");
                0
            }
        }
    }

    /// Store `notification` unless the recipient already has one of the same
    /// type from the same sender for which `is_duplicate` holds.
    pub async fn send_unless<F>(&self, notification: Notification, is_duplicate: F) -> bool
    where
        F: Fn(&Notification) -> bool,
    {
        let sender = notification.sender.clone();
        self.send_unless_matching(notification, Some(&sender), is_duplicate)
            .await
    }

    /// Like [`Notifier::send_unless`], but any sender's notification of the
    /// same type counts as a duplicate.
    pub async fn send_unless_from_anyone<F>(
        &self,
        notification: Notification,
        is_duplicate: F,
    ) -> bool
    where
        F: Fn(&Notification) -> bool,
    {
        self.send_unless_matching(notification, None, is_duplicate)
            .await
    }

    async fn send_unless_matching<F>(
        &self,
        notification: Notification,
        sender: Option<&str>,
        is_duplicate: F,
    ) -> bool
    where
        F: Fn(&Notification) -> bool,
    {
        let existing = self
            .db
            .find_notifications(Some(&notification.recipient), sender, notification.kind)
            .await;

        match existing {
            Ok(existing) if existing.iter().any(is_duplicate) => {
                tracing::debug!(
                    recipient = %notification.recipient,
                    kind = notification.kind.as_str(),
                    "Skipping duplicate notification"
                );
                false
            }
            Ok(_) => self.send(notification).await,
            Err(e) => {
                log_failure(&notification, &e);
                false
            }
        }
    }
}

fn log_failure(notification: &Notification, error: &AppError) {
    tracing::warn!(
        recipient = %notification.recipient,
        kind = notification.kind.as_str(),
        error = %error,
        "Failed to send notification"
    );
}
