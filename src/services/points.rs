// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Points awarding.
//!
//! Awards are side effects of other actions, so most callers use
//! `award_best_effort`, which logs failures instead of returning them.

use crate::db::{FirestoreDb, QuizResult};
use crate::error::AppError;
use crate::models::points::{PointsAction, PointsAward, PointsConfig, StatsDelta};
use std::sync::Arc;

#[derive(Clone)]
pub struct PointsService {
    db: FirestoreDb,
    config: Arc<PointsConfig>,
}

impl PointsService {
    pub fn new(db: FirestoreDb, config: PointsConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PointsConfig {
        &self.config
    }

    /// Award the fixed amount for `action` plus any stat deltas.
    pub async fn award(
        &self,
        user_id: &str,
        action: PointsAction,
        delta: StatsDelta,
    ) -> Result<PointsAward, AppError> {
        let amount = self.config.points_for(action);
        let award = self
            .db
            .award_points(user_id, amount, action.reason(), delta, &self.config)
            .await?;

        tracing::info!(
            user_id,
            points_awarded = award.points_awarded,
            total = award.points,
            new_badges = award.new_badges.len(),
            reason = %award.reason,
            "Points awarded"
        );
        Ok(award)
    }

    /// Like `award`, but a failure is logged and swallowed.
    pub async fn award_best_effort(
        &self,
        user_id: &str,
        action: PointsAction,
        delta: StatsDelta,
    ) -> Option<PointsAward> {
        match self.award(user_id, action, delta).await {
            Ok(award) => Some(award),
            Err(e) => {
                tracing::warn!(user_id, error = %e, reason = action.reason(), "Failed to award points");
                None
            }
        }
    }

    /// Pay `score` correct answers for a session quiz, at most once.
    pub async fn complete_quiz(
        &self,
        user_id: &str,
        session_id: &str,
        score: u32,
    ) -> Result<QuizResult, AppError> {
        let points = self.config.quiz_points(score);
        let result = self
            .db
            .complete_quiz(
                user_id,
                session_id,
                score,
                points,
                PointsAction::CompleteSessionQuiz.reason(),
                &self.config,
            )
            .await?;

        if result.already_awarded() {
            tracing::info!(user_id, session_id, "Quiz already rewarded");
        } else {
            tracing::info!(user_id, session_id, score, points, "Quiz rewarded");
        }
        Ok(result)
    }
}
