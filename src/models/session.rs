// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Study sessions, ratings, and quizzes.

use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::error::AppError;
use crate::models::user::{push_unique, remove_all};
use crate::time_utils::{format_utc_rfc3339, parse_user_datetime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    #[serde(rename = "Video Session")]
    VideoSession,
    #[serde(rename = "In Person")]
    InPerson,
}

impl SessionType {
    /// Map the spellings clients send onto the two canonical types.
    ///
    /// Anything that does not read as in-person is a video session.
    pub fn normalize(raw: &str) -> Self {
        let folded: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "inperson" | "offline" => SessionType::InPerson,
            _ => SessionType::VideoSession,
        }
    }
}

/// Lifecycle. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    Upcoming,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Upcoming)
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (
                SessionStatus::Upcoming,
                SessionStatus::Completed | SessionStatus::Cancelled
            )
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRating {
    pub user: String,
    /// 1 - 5, fractional values kept as submitted
    pub rating: f64,
    #[serde(default)]
    pub comment: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

/// Session stored in Firestore (document ID = `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub created_by: String,
    pub topic: String,
    #[serde(default)]
    pub details: String,
    pub session_type: SessionType,
    pub duration: String,
    /// Set only for in-person sessions
    #[serde(default)]
    pub location: String,
    /// Set only for video sessions
    #[serde(default)]
    pub link: String,
    #[serde(default, rename = "preferedTimings", alias = "preferredTimings")]
    pub preferred_timings: String,
    /// RFC3339, millisecond precision
    pub session_on: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub ratings: Vec<SessionRating>,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub quiz_questions: Vec<QuizQuestion>,
    #[serde(default)]
    pub status: SessionStatus,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Session {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    /// Creator or member.
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.created_by == user_id || self.is_member(user_id)
    }

    pub fn add_member(&mut self, user_id: &str) -> bool {
        push_unique(&mut self.members, user_id)
    }

    pub fn remove_member(&mut self, user_id: &str) -> bool {
        remove_all(&mut self.members, user_id)
    }

    /// Insert or replace `user_id`'s rating and recompute the average.
    ///
    /// Returns `true` if this is the user's first rating.
    pub fn upsert_rating(&mut self, user_id: &str, rating: f64, comment: String, now: &str) -> bool {
        let is_new = match self.ratings.iter_mut().find(|r| r.user == user_id) {
            Some(existing) => {
                existing.rating = rating;
                existing.comment = comment;
                existing.created_at = now.to_string();
                false
            }
            None => {
                self.ratings.push(SessionRating {
                    user: user_id.to_string(),
                    rating,
                    comment,
                    created_at: now.to_string(),
                });
                true
            }
        };
        self.average_rating = average_rating(&self.ratings);
        is_new
    }
}

/// Mean of all ratings rounded to 2 decimals, 0 when unrated.
pub fn average_rating(ratings: &[SessionRating]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let total: f64 = ratings.iter().map(|r| r.rating).sum();
    let mean = total / ratings.len() as f64;
    (mean * 100.0).round() / 100.0
}

/// Quiz question as submitted by a session creator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub answer: String,
}

impl QuizQuestionInput {
    fn into_question(self, index: usize) -> Result<QuizQuestion, AppError> {
        if self.question.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "Quiz question {} is missing its text",
                index + 1
            )));
        }
        if self.options.len() != 4 {
            return Err(AppError::Validation(format!(
                "Quiz question {} must have exactly 4 options",
                index + 1
            )));
        }
        if self.answer.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "Quiz question {} is missing its answer",
                index + 1
            )));
        }
        Ok(QuizQuestion {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            question: self.question,
            options: self.options,
            answer: self.answer,
        })
    }
}

/// Session creation payload.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SessionDraft {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub topic: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub session_type: String,
    #[serde(default, deserialize_with = "string_or_number")]
    #[validate(length(min = 1))]
    pub duration: String,
    #[serde(default, rename = "preferedTimings", alias = "preferredTimings")]
    pub preferred_timings: String,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub session_on: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub quiz_questions: Vec<QuizQuestionInput>,
}

impl SessionDraft {
    /// Validate and build the stored session.
    pub fn into_session(self, created_by: &str, now: &str) -> Result<Session, AppError> {
        if self.validate().is_err() {
            return Err(AppError::Validation(
                "Missing required session fields".to_string(),
            ));
        }

        let session_on = parse_user_datetime(&self.session_on)
            .ok_or_else(|| AppError::Validation("Invalid session date".to_string()))?;

        let quiz_questions = self
            .quiz_questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| q.into_question(i))
            .collect::<Result<Vec<_>, _>>()?;

        let session_type = SessionType::normalize(&self.session_type);
        let (location, link) = match session_type {
            SessionType::InPerson => (self.location, String::new()),
            SessionType::VideoSession => (String::new(), self.link),
        };

        Ok(Session {
            id: uuid::Uuid::new_v4().to_string(),
            created_by: created_by.to_string(),
            topic: self.topic.trim().to_string(),
            details: self.details,
            session_type,
            duration: self.duration,
            location,
            link,
            preferred_timings: self.preferred_timings,
            session_on: format_utc_rfc3339(session_on),
            members: Vec::new(),
            ratings: Vec::new(),
            average_rating: 0.0,
            quiz_questions,
            status: SessionStatus::Upcoming,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        })
    }
}

/// Accept `"60"` or `60` for free-text numeric fields.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Attachment uploaded alongside a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    pub id: String,
    pub session_id: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: u64,
    pub uploaded_by: String,
    pub upload_url: String,
    pub uploaded_at: String,
}
