// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Points table and quiz rewards.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::points::{BadgeThreshold, PointsAward, PointsConfig};
use crate::models::user::{Badge, QuizCompletion};
use crate::routes::{ok, ApiJson, ApiResponse};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/points/config", get(get_points_config))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/points/quiz-complete", post(quiz_complete))
}

/// Point values keyed the way the frontend reads them.
#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PointTable {
    pub ask_question: u32,
    pub answer_question: u32,
    pub answer_upvote: u32,
    pub question_upvote: u32,
    pub create_session: u32,
    pub attend_session: u32,
    pub complete_session_quiz: u32,
    pub rate_session: u32,
    pub quiz_points_per_correct: u32,
}

impl From<&PointsConfig> for PointTable {
    fn from(config: &PointsConfig) -> Self {
        Self {
            ask_question: config.ask_question,
            answer_question: config.answer_question,
            answer_upvote: config.answer_upvote,
            question_upvote: config.question_upvote,
            create_session: config.create_session,
            attend_session: config.attend_session,
            complete_session_quiz: config.complete_session_quiz,
            rate_session: config.rate_session,
            quiz_points_per_correct: config.quiz_points_per_correct,
        }
    }
}

#[derive(Serialize)]
pub struct PointsConfigPayload {
    pub points: PointTable,
    pub badges: Vec<BadgeThreshold>,
}

async fn get_points_config(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<PointsConfigPayload>> {
    let config = state.points.config();
    ok(
        "Points configuration fetched",
        PointsConfigPayload {
            points: config.into(),
            badges: config.badge_thresholds.clone(),
        },
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmission {
    #[serde(default)]
    pub session_id: String,
    pub score: Option<u32>,
    pub total_questions: Option<u32>,
}

impl QuizSubmission {
    /// Returns `(score, total_questions)`.
    pub fn checked(&self) -> Result<(u32, u32)> {
        let (Some(score), Some(total)) = (self.score, self.total_questions) else {
            return Err(AppError::Validation("Missing required fields".to_string()));
        };
        if self.session_id.trim().is_empty() || total == 0 {
            return Err(AppError::Validation("Missing required fields".to_string()));
        }
        if score > total {
            return Err(AppError::Validation(
                "Score cannot exceed total questions".to_string(),
            ));
        }
        Ok((score, total))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizPayload {
    pub passed: bool,
    pub score: u32,
    pub total_questions: u32,
    pub points_awarded: u32,
    pub already_awarded: bool,
    /// New points total, present on the first completion only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub new_badges: Vec<Badge>,
    /// The ledger entry from the first completion, on repeats
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<QuizCompletion>,
}

impl QuizPayload {
    pub fn new(
        score: u32,
        total_questions: u32,
        completion: QuizCompletion,
        award: Option<PointsAward>,
    ) -> Self {
        let points_awarded = completion.awarded_points;
        match award {
            Some(award) => Self {
                passed: true,
                score,
                total_questions,
                points_awarded,
                already_awarded: false,
                points: Some(award.points),
                new_badges: award.new_badges,
                existing: None,
            },
            None => Self {
                passed: true,
                score,
                total_questions,
                points_awarded,
                already_awarded: true,
                points: None,
                new_badges: Vec::new(),
                existing: Some(completion),
            },
        }
    }
}

async fn quiz_complete(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(submission): ApiJson<QuizSubmission>,
) -> Result<Json<ApiResponse<QuizPayload>>> {
    let (score, total_questions) = submission.checked()?;
    let result = state
        .points
        .complete_quiz(&user.id, submission.session_id.trim(), score)
        .await?;

    let message = if result.already_awarded() {
        "Quiz already completed"
    } else {
        "Quiz completed successfully!"
    };
    Ok(ok(
        message,
        QuizPayload::new(score, total_questions, result.completion, result.award),
    ))
}
