// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inbox notifications.

use serde::{Deserialize, Serialize};

/// Kind of inbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    SessionInvite,
    SessionAccepted,
    SessionDeclined,
    SessionRating,
    QuestionAnswered,
    ConnectionRequest,
    ConnectionAccepted,
    ConnectionDeclined,
    QaActivity,
    General,
}

impl NotificationType {
    /// Stored value, used in Firestore filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::SessionInvite => "session_invite",
            NotificationType::SessionAccepted => "session_accepted",
            NotificationType::SessionDeclined => "session_declined",
            NotificationType::SessionRating => "session_rating",
            NotificationType::QuestionAnswered => "question_answered",
            NotificationType::ConnectionRequest => "connection_request",
            NotificationType::ConnectionAccepted => "connection_accepted",
            NotificationType::ConnectionDeclined => "connection_declined",
            NotificationType::QaActivity => "qa_activity",
            NotificationType::General => "general",
        }
    }
}

/// What the UI should offer for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Accept,
    Decline,
    View,
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// The `session_invite` a rating prompt was derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
}

/// Notification stored in Firestore (document ID = `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub recipient: String,
    pub sender: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub metadata: NotificationMetadata,
    pub created_at: String,
}

/// Document ID of the pending request from `from` to `to`.
///
/// At most one request can exist per direction, so a second send collides
/// with the first instead of racing past an existence check.
pub fn connection_request_id(from: &str, to: &str) -> String {
    format!("connreq_{}_{}", from, to)
}

impl Notification {
    fn new(
        recipient: &str,
        sender: &str,
        kind: NotificationType,
        title: &str,
        message: String,
        metadata: NotificationMetadata,
        now: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recipient: recipient.to_string(),
            sender: sender.to_string(),
            kind,
            title: title.to_string(),
            message,
            is_read: false,
            metadata,
            created_at: now.to_string(),
        }
    }

    pub fn connection_request(
        from: &str,
        from_name: &str,
        to: &str,
        message: Option<String>,
        now: &str,
    ) -> Self {
        let mut n = Self::new(
            to,
            from,
            NotificationType::ConnectionRequest,
            "New Connection Request",
            message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("{} wants to connect with you", from_name)),
            NotificationMetadata {
                action_type: Some(ActionType::Accept),
                action_url: Some(format!("/connections/{}", from)),
                ..Default::default()
            },
            now,
        );
        n.id = connection_request_id(from, to);
        n
    }

    /// Reply to a connection request, addressed to the original sender.
    pub fn connection_response(
        responder: &str,
        responder_name: &str,
        requester: &str,
        accepted: bool,
        now: &str,
    ) -> Self {
        let (kind, title, verb) = if accepted {
            (
                NotificationType::ConnectionAccepted,
                "Connection Accepted",
                "accepted",
            )
        } else {
            (
                NotificationType::ConnectionDeclined,
                "Connection Declined",
                "declined",
            )
        };
        Self::new(
            requester,
            responder,
            kind,
            title,
            format!("{} {} your connection request", responder_name, verb),
            NotificationMetadata {
                action_type: Some(ActionType::View),
                action_url: Some(format!("/connections/{}", responder)),
                ..Default::default()
            },
            now,
        )
    }

    pub fn session_invite(
        creator: &str,
        creator_name: &str,
        recipient: &str,
        session_id: &str,
        topic: &str,
        now: &str,
    ) -> Self {
        Self::new(
            recipient,
            creator,
            NotificationType::SessionInvite,
            "Session Invitation",
            format!(
                "{} invited you to join a session: \"{}\"",
                creator_name, topic
            ),
            NotificationMetadata {
                session_id: Some(session_id.to_string()),
                action_type: Some(ActionType::Accept),
                ..Default::default()
            },
            now,
        )
    }

    /// Reply to a session invite, addressed to the session creator.
    pub fn session_response(
        responder: &str,
        responder_name: &str,
        creator: &str,
        session_id: &str,
        topic: &str,
        accepted: bool,
        now: &str,
    ) -> Self {
        let (kind, title, verb) = if accepted {
            (NotificationType::SessionAccepted, "Session Accepted", "accepted")
        } else {
            (NotificationType::SessionDeclined, "Session Declined", "declined")
        };
        Self::new(
            creator,
            responder,
            kind,
            title,
            format!(
                "{} has {} your session invitation: \"{}\"",
                responder_name, verb, topic
            ),
            NotificationMetadata {
                session_id: Some(session_id.to_string()),
                action_type: Some(ActionType::View),
                ..Default::default()
            },
            now,
        )
    }

    pub fn rating_prompt(rater: &str, invite: &Notification, now: &str) -> Self {
        Self::new(
            &invite.recipient,
            rater,
            NotificationType::SessionRating,
            "Rate your session",
            "Share your feedback for the session you attended.".to_string(),
            NotificationMetadata {
                session_id: invite.metadata.session_id.clone(),
                invite_id: Some(invite.id.clone()),
                action_type: Some(ActionType::View),
                ..Default::default()
            },
            now,
        )
    }

    pub fn new_question(
        asker: &str,
        asker_name: &str,
        recipient: &str,
        question_id: &str,
        title: &str,
        now: &str,
    ) -> Self {
        Self::new(
            recipient,
            asker,
            NotificationType::QaActivity,
            "New Question",
            format!("{} asked a new question: \"{}\"", asker_name, title),
            question_metadata(question_id, None),
            now,
        )
    }

    pub fn question_answered(
        answerer: &str,
        answerer_name: &str,
        asker: &str,
        question_id: &str,
        title: &str,
        now: &str,
    ) -> Self {
        Self::new(
            asker,
            answerer,
            NotificationType::QuestionAnswered,
            "New Answer",
            format!("{} answered your question: \"{}\"", answerer_name, title),
            question_metadata(question_id, None),
            now,
        )
    }

    /// Vote on a question (`answer_id = None`) or on one of its answers.
    pub fn vote_activity(
        voter: &str,
        voter_name: &str,
        owner: &str,
        question_id: &str,
        answer_id: Option<&str>,
        upvote: bool,
        now: &str,
    ) -> Self {
        let target = if answer_id.is_some() {
            "Answer"
        } else {
            "Question"
        };
        let verb = if upvote { "upvoted" } else { "downvoted" };
        let title = format!("{} {}", target, if upvote { "Upvoted" } else { "Downvoted" });

        Self::new(
            owner,
            voter,
            NotificationType::QaActivity,
            &title,
            format!(
                "{} {} your {}",
                voter_name,
                verb,
                target.to_ascii_lowercase()
            ),
            question_metadata(question_id, answer_id),
            now,
        )
    }

    /// Whether this entry concerns the given question/answer pair.
    pub fn refers_to(&self, question_id: &str, answer_id: Option<&str>) -> bool {
        self.metadata.question_id.as_deref() == Some(question_id)
            && self.metadata.answer_id.as_deref() == answer_id
    }
}

fn question_metadata(question_id: &str, answer_id: Option<&str>) -> NotificationMetadata {
    NotificationMetadata {
        question_id: Some(question_id.to_string()),
        answer_id: answer_id.map(str::to_string),
        action_type: Some(ActionType::View),
        action_url: Some(format!("/qa?questionId={}", question_id)),
        ..Default::default()
    }
}

/// Page metadata for notification listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_notifications: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u32) -> Self {
        let limit = limit.max(1);
        Self {
            current_page: page,
            total_pages: total.div_ceil(limit),
            total_notifications: total,
            has_next_page: u64::from(page) * u64::from(limit) < u64::from(total),
            has_prev_page: page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "2025-01-01T00:00:00.000Z";

    #[test]
    fn test_type_serializes_snake_case() {
        let n = Notification::session_invite("a", "Ann", "b", "s1", "Rust", NOW);
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "session_invite");
        assert_eq!(json["isRead"], false);
        assert_eq!(json["metadata"]["sessionId"], "s1");
        assert_eq!(json["metadata"]["actionType"], "accept");
        assert!(json["metadata"].get("questionId").is_none());
        assert_eq!(
            NotificationType::SessionRating.as_str(),
            serde_json::to_value(NotificationType::SessionRating).unwrap()
        );
    }

    #[test]
    fn test_connection_request_uses_deterministic_id() {
        let n = Notification::connection_request("a", "Ann", "b", None, NOW);
        assert_eq!(n.id, "connreq_a_b");
        assert_eq!(n.message, "Ann wants to connect with you");

        let custom = Notification::connection_request("a", "Ann", "b", Some("hi".into()), NOW);
        assert_eq!(custom.message, "hi");
    }

    #[test]
    fn test_rating_prompt_links_invite() {
        let invite = Notification::session_invite("a", "Ann", "b", "s1", "Rust", NOW);
        let prompt = Notification::rating_prompt("a", &invite, NOW);
        assert_eq!(prompt.recipient, "b");
        assert_eq!(prompt.kind, NotificationType::SessionRating);
        assert_eq!(prompt.metadata.invite_id.as_deref(), Some(invite.id.as_str()));
        assert_eq!(prompt.metadata.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_vote_activity_refers_to_target() {
        let n = Notification::vote_activity("v", "Vic", "o", "q1", Some("a1"), true, NOW);
        assert_eq!(n.title, "Answer Upvoted");
        assert_eq!(n.message, "Vic upvoted your answer");
        assert!(n.refers_to("q1", Some("a1")));
        assert!(!n.refers_to("q1", None));

        let q = Notification::vote_activity("v", "Vic", "o", "q1", None, false, NOW);
        assert_eq!(q.title, "Question Downvoted");
        assert!(q.refers_to("q1", None));
    }

    #[test]
    fn test_pagination() {
        let p = Pagination::new(1, 20, 45);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);
        assert!(!p.has_prev_page);

        let last = Pagination::new(3, 20, 45);
        assert!(!last.has_next_page);
        assert!(last.has_prev_page);

        let empty = Pagination::new(1, 20, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
    }
}
