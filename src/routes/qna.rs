// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Q&A forum routes.
//!
//! Points and notifications are side effects: a failure in either is logged
//! and never fails the question, answer, or vote that triggered it.

use crate::db::VoteResult;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::notification::Notification;
use crate::models::points::{PointsAction, StatsDelta};
use crate::models::question::{Answer, Question, VoteDirection};
use crate::models::user::{User, UserSummary};
use crate::routes::users::load_user;
use crate::routes::{ok, ok_message, ApiJson, ApiResponse};
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/qna/all-questions", get(get_all_questions))
        .route("/api/qna/questions-by-user", get(get_questions_by_user))
        .route("/api/qna/askQuestion", post(ask_question))
        .route("/api/qna/answer", post(answer_question))
        .route("/api/qna/upvoteQuestion", put(upvote_question))
        .route("/api/qna/downvoteQuestion", put(downvote_question))
        .route("/api/qna/upvoteAnswer", put(upvote_answer))
        .route("/api/qna/downvoteAnswer", put(downvote_answer))
        .route("/api/qna/delete-question", post(delete_question))
        .route("/api/qna/delete-answer", post(delete_answer))
}

// ─── Views ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub id: String,
    pub answer: String,
    pub answered_at: String,
    pub up_votes: Vec<String>,
    pub down_votes: Vec<String>,
    /// `None` once the author's account is gone
    pub answered_by: Option<UserSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub asked_at: String,
    pub up_votes: Vec<String>,
    pub down_votes: Vec<String>,
    pub asked_by: Option<UserSummary>,
    pub answers: Vec<AnswerView>,
}

impl QuestionView {
    pub fn new(question: Question, authors: &HashMap<String, User>) -> Self {
        let summary = |id: &str| authors.get(id).map(UserSummary::from);
        Self {
            asked_by: summary(&question.asked_by),
            answers: question
                .answers
                .into_iter()
                .map(|a: Answer| AnswerView {
                    answered_by: summary(&a.answered_by),
                    id: a.id,
                    answer: a.answer,
                    answered_at: a.answered_at,
                    up_votes: a.up_votes,
                    down_votes: a.down_votes,
                })
                .collect(),
            id: question.id,
            title: question.title,
            description: question.description,
            tags: question.tags,
            asked_at: question.asked_at,
            up_votes: question.up_votes,
            down_votes: question.down_votes,
        }
    }
}

/// Attach author cards to questions, loading each author once.
async fn question_views(state: &AppState, questions: Vec<Question>) -> Result<Vec<QuestionView>> {
    let mut ids: Vec<String> = Vec::new();
    for question in &questions {
        for id in question.author_ids() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    let authors: HashMap<String, User> = state
        .db
        .get_users_by_ids(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    Ok(questions
        .into_iter()
        .map(|q| QuestionView::new(q, &authors))
        .collect())
}

async fn question_view(state: &AppState, question: Question) -> Result<QuestionView> {
    let mut views = question_views(state, vec![question]).await?;
    views
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("question view missing")))
}

#[derive(Serialize)]
pub struct QuestionPayload {
    pub question: QuestionView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllQuestionsPayload {
    pub output_questions: Vec<QuestionView>,
}

#[derive(Serialize)]
pub struct QuestionsPayload {
    pub questions: Vec<Question>,
}

// ─── Reads ───────────────────────────────────────────────────

async fn get_all_questions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<AllQuestionsPayload>>> {
    let questions = state.db.list_questions().await?;
    let output_questions = question_views(&state, questions).await?;

    Ok(ok(
        "Questions fetched successfully",
        AllQuestionsPayload { output_questions },
    ))
}

async fn get_questions_by_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<QuestionsPayload>>> {
    let questions = state.db.questions_by_user(&user.id).await?;
    Ok(ok("Questions fetched successfully", QuestionsPayload { questions }))
}

// ─── Asking & Answering ──────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct QuestionDraft {
    #[serde(default)]
    #[validate(length(min = 1, max = 300))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl QuestionDraft {
    pub fn into_question(self, asked_by: &str, now: &str) -> Question {
        Question {
            id: uuid::Uuid::new_v4().to_string(),
            title: self.title.trim().to_string(),
            description: self.description,
            tags: self
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            asked_by: asked_by.to_string(),
            asked_at: now.to_string(),
            up_votes: Vec::new(),
            down_votes: Vec::new(),
            answers: Vec::new(),
        }
    }
}

/// New-question notices for everyone except the asker.
pub fn new_question_broadcast(
    asker: &User,
    question: &Question,
    users: &[User],
    now: &str,
) -> Vec<Notification> {
    users
        .iter()
        .filter(|u| u.id != asker.id)
        .map(|u| {
            Notification::new_question(&asker.id, &asker.name, &u.id, &question.id, &question.title, now)
        })
        .collect()
}

async fn ask_question(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(draft): ApiJson<QuestionDraft>,
) -> Result<Json<ApiResponse<QuestionPayload>>> {
    draft.validate()?;
    let asker = load_user(&state, &user.id).await?;
    let question = draft.into_question(&user.id, &now_rfc3339());
    state.db.create_question(&question).await?;
    tracing::info!(question_id = %question.id, user_id = %user.id, "Question asked");

    state
        .points
        .award_best_effort(&user.id, PointsAction::AskQuestion, StatsDelta::questions_asked(1))
        .await;

    match state.db.list_users().await {
        Ok(users) => {
            let notices = new_question_broadcast(&asker, &question, &users, &now_rfc3339());
            state.notifier.send_all(notices).await;
        }
        Err(e) => {
            tracing::warn!(question_id = %question.id, error = %e, "Failed to broadcast new question");
        }
    }

    let question = question_view(&state, question).await?;
    Ok(ok("Question asked successfully", QuestionPayload { question }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerBody {
    #[serde(default)]
    question_id: String,
    #[serde(default)]
    answer: String,
}

async fn answer_question(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<AnswerBody>,
) -> Result<Json<ApiResponse<QuestionPayload>>> {
    if body.question_id.trim().is_empty() {
        return Err(AppError::Validation("Question ID is required".to_string()));
    }
    if body.answer.trim().is_empty() {
        return Err(AppError::Validation("Answer cannot be empty".to_string()));
    }

    let answerer = load_user(&state, &user.id).await?;
    let (question, answer_id) = state
        .db
        .add_answer(body.question_id.trim(), &user.id, body.answer.trim())
        .await?;
    tracing::info!(question_id = %question.id, answer_id = %answer_id, "Question answered");

    state
        .points
        .award_best_effort(
            &user.id,
            PointsAction::AnswerQuestion,
            StatsDelta::questions_answered(1),
        )
        .await;

    if question.asked_by != user.id {
        let notice = Notification::question_answered(
            &user.id,
            &answerer.name,
            &question.asked_by,
            &question.id,
            &question.title,
            &now_rfc3339(),
        );
        let question_id = question.id.clone();
        state
            .notifier
            .send_unless(notice, |n| n.refers_to(&question_id, None))
            .await;
    }

    let question = question_view(&state, question).await?;
    Ok(ok("Answered successfully", QuestionPayload { question }))
}

// ─── Voting ──────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteBody {
    #[serde(default)]
    question_id: String,
    #[serde(default)]
    answer_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotePayload {
    pub question: Question,
    /// Whether the vote changed anything
    pub changed: bool,
}

/// Apply a vote, then notify the content owner when the voter's position moved.
async fn cast_vote(
    state: &AppState,
    voter: &AuthUser,
    body: VoteBody,
    on_answer: bool,
    direction: VoteDirection,
) -> Result<VoteResult> {
    let question_id = body.question_id.trim();
    if question_id.is_empty() {
        return Err(AppError::Validation("Question ID is required".to_string()));
    }
    let answer_id = match (on_answer, body.answer_id.as_deref().map(str::trim)) {
        (false, _) => None,
        (true, Some(id)) if !id.is_empty() => Some(id),
        (true, _) => return Err(AppError::Validation("Answer ID is required".to_string())),
    };

    let result = state
        .db
        .vote(question_id, answer_id, &voter.id, direction, state.points.config())
        .await?;

    if let Some(award) = &result.award {
        tracing::info!(
            owner = %result.owner_id,
            points_awarded = award.points_awarded,
            new_badges = award.new_badges.len(),
            "Upvote rewarded"
        );
    }

    if result.outcome.moved() && result.owner_id != voter.id {
        match load_user(state, &voter.id).await {
            Ok(voter_user) => {
                let notice = Notification::vote_activity(
                    &voter.id,
                    &voter_user.name,
                    &result.owner_id,
                    question_id,
                    answer_id,
                    direction == VoteDirection::Up,
                    &now_rfc3339(),
                );
                state
                    .notifier
                    .send_unless(notice, |n| n.refers_to(question_id, answer_id))
                    .await;
            }
            Err(e) => {
                tracing::warn!(user_id = %voter.id, error = %e, "Skipping vote notification");
            }
        }
    }

    Ok(result)
}

fn vote_response(message: &str, result: VoteResult) -> Json<ApiResponse<VotePayload>> {
    ok(
        message,
        VotePayload {
            changed: result.outcome.changed(),
            question: result.question,
        },
    )
}

async fn upvote_question(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<VoteBody>,
) -> Result<Json<ApiResponse<VotePayload>>> {
    let result = cast_vote(&state, &user, body, false, VoteDirection::Up).await?;
    Ok(vote_response("Upvote Updated successfully", result))
}

async fn downvote_question(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<VoteBody>,
) -> Result<Json<ApiResponse<VotePayload>>> {
    let result = cast_vote(&state, &user, body, false, VoteDirection::Down).await?;
    Ok(vote_response("Downvote Updated successfully", result))
}

async fn upvote_answer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<VoteBody>,
) -> Result<Json<ApiResponse<VotePayload>>> {
    let result = cast_vote(&state, &user, body, true, VoteDirection::Up).await?;
    Ok(vote_response("Upvote Updated successfully", result))
}

async fn downvote_answer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<VoteBody>,
) -> Result<Json<ApiResponse<VotePayload>>> {
    let result = cast_vote(&state, &user, body, true, VoteDirection::Down).await?;
    Ok(vote_response("Downvote Updated successfully", result))
}

// ─── Deletion ────────────────────────────────────────────────

async fn delete_question(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<VoteBody>,
) -> Result<Json<ApiResponse<()>>> {
    let question_id = body.question_id.trim();
    if question_id.is_empty() {
        return Err(AppError::Validation("Question ID is required".to_string()));
    }
    state.db.delete_question(question_id, &user.id).await?;
    Ok(ok_message("Question deleted successfully"))
}

async fn delete_answer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<VoteBody>,
) -> Result<Json<ApiResponse<QuestionPayload>>> {
    let question_id = body.question_id.trim();
    let answer_id = body.answer_id.as_deref().map(str::trim).unwrap_or_default();
    if question_id.is_empty() || answer_id.is_empty() {
        return Err(AppError::Validation(
            "Question ID and answer ID are required".to_string(),
        ));
    }

    let question = state.db.delete_answer(question_id, answer_id, &user.id).await?;
    tracing::info!(question_id, answer_id, "Answer deleted");

    let question = question_view(&state, question).await?;
    Ok(ok("Answer deleted successfully", QuestionPayload { question }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::NotificationType;
    use crate::models::user::tests::make_user;

    const NOW: &str = "2025-01-01T00:00:00.000Z";

    fn draft(title: &str) -> QuestionDraft {
        serde_json::from_value(serde_json::json!({
            "title": title,
            "description": "D",
            "tags": ["X", "  ", " rust "],
        }))
        .unwrap()
    }

    #[test]
    fn test_draft_requires_title() {
        assert!(draft("Q1").validate().is_ok());
        assert!(draft("").validate().is_err());
    }

    #[test]
    fn test_draft_trims_tags() {
        let question = draft("Q1").into_question("u", NOW);
        assert_eq!(question.tags, vec!["X".to_string(), "rust".to_string()]);
        assert_eq!(question.asked_by, "u");
        assert!(question.answers.is_empty());
    }

    #[test]
    fn test_broadcast_reaches_every_other_user() {
        let asker = make_user("u");
        let users = vec![make_user("u"), make_user("a"), make_user("b")];
        let question = draft("Q1").into_question("u", NOW);

        let notices = new_question_broadcast(&asker, &question, &users, NOW);
        let recipients: Vec<&str> = notices.iter().map(|n| n.recipient.as_str()).collect();
        assert_eq!(recipients, vec!["a", "b"]);
        assert!(notices.iter().all(|n| n.kind == NotificationType::QaActivity
            && n.metadata.question_id.as_deref() == Some(question.id.as_str())));
    }

    #[test]
    fn test_view_tolerates_deleted_authors() {
        let mut question = draft("Q1").into_question("gone", NOW);
        question.add_answer("A".to_string(), "a", NOW);
        let authors: HashMap<String, User> =
            [("a".to_string(), make_user("a"))].into_iter().collect();

        let view = QuestionView::new(question, &authors);
        assert!(view.asked_by.is_none());
        assert_eq!(view.answers[0].answered_by.as_ref().unwrap().id, "a");
    }
}
