// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Q&A questions, answers, and votes.

use crate::db::collections;
use crate::db::firestore::{tx_delete, tx_error, tx_read, tx_write, FirestoreDb};
use crate::error::AppError;
use crate::models::notification::Notification;
use crate::models::points::{PointsAction, PointsAward, PointsConfig, StatsDelta};
use crate::models::question::{Question, VoteDirection, VoteOutcome};
use crate::models::user::User;
use crate::time_utils::now_rfc3339;
use firestore::errors::{BackoffError, FirestoreError};

/// Outcome of a vote.
#[derive(Debug, Clone)]
pub struct VoteResult {
    pub question: Question,
    pub outcome: VoteOutcome,
    /// Author of the voted question or answer
    pub owner_id: String,
    /// Points paid to the owner for a first-time upvote
    pub award: Option<PointsAward>,
}

impl FirestoreDb {
    pub async fn get_question(&self, question_id: &str) -> Result<Option<Question>, AppError> {
        self.get_doc(collections::QUESTIONS, question_id).await
    }

    pub async fn create_question(&self, question: &Question) -> Result<(), AppError> {
        self.set_doc(collections::QUESTIONS, &question.id, question)
            .await
    }

    /// All questions, newest first.
    pub async fn list_questions(&self) -> Result<Vec<Question>, AppError> {
        let mut questions: Vec<Question> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::QUESTIONS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        questions.sort_by(|a, b| b.asked_at.cmp(&a.asked_at));
        Ok(questions)
    }

    /// Questions asked by one user, newest first.
    pub async fn questions_by_user(&self, user_id: &str) -> Result<Vec<Question>, AppError> {
        let mut questions: Vec<Question> = self
            .find_by_field(collections::QUESTIONS, "askedBy", user_id)
            .await?;
        questions.sort_by(|a, b| b.asked_at.cmp(&a.asked_at));
        Ok(questions)
    }

    /// Append an answer. Returns the updated question and the new answer's ID.
    pub async fn add_answer(
        &self,
        question_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<(Question, String), AppError> {
        let user_id = user_id.to_string();
        let text = text.to_string();

        self.modify_doc(
            collections::QUESTIONS,
            question_id,
            "Question not found",
            move |question: &mut Question| {
                let answer_id = question
                    .add_answer(text.clone(), &user_id, &now_rfc3339())
                    .id
                    .clone();
                Ok((question.clone(), answer_id))
            },
        )
        .await
    }

    /// Vote on a question, or on one of its answers when `answer_id` is set.
    ///
    /// A first-time answer upvote (neutral to up, not a switch) pays the
    /// answer's author in the same transaction, so the reward happens
    /// exactly once. Question votes never pay and downvotes never deduct.
    pub async fn vote(
        &self,
        question_id: &str,
        answer_id: Option<&str>,
        voter_id: &str,
        direction: VoteDirection,
        config: &PointsConfig,
    ) -> Result<VoteResult, AppError> {
        let question_id = question_id.to_string();
        let answer_id = answer_id.map(str::to_string);
        let voter_id = voter_id.to_string();
        let config = config.clone();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let question_id = question_id.clone();
                let answer_id = answer_id.clone();
                let voter_id = voter_id.clone();
                let config = config.clone();
                Box::pin(async move {
                    let Some(mut question) =
                        tx_read::<Question>(&db, collections::QUESTIONS, &question_id).await?
                    else {
                        return Ok(Err(AppError::NotFound("Question not found".to_string())));
                    };

                    let (outcome, owner_id) = match &answer_id {
                        Some(answer_id) => {
                            let Some(answer) = question.answer_mut(answer_id) else {
                                return Ok(Err(AppError::NotFound(
                                    "Answer not found".to_string(),
                                )));
                            };
                            (answer.vote(&voter_id, direction), answer.answered_by.clone())
                        }
                        None => (question.vote(&voter_id, direction), question.asked_by.clone()),
                    };

                    let pays_owner = answer_id.is_some()
                        && outcome == VoteOutcome::Added
                        && direction == VoteDirection::Up;
                    let owner: Option<User> = if pays_owner {
                        tx_read(&db, collections::USERS, &owner_id).await?
                    } else {
                        None
                    };

                    if outcome.changed() {
                        tx_write(&db, transaction, collections::QUESTIONS, &question_id, &question)?;
                    }

                    let award = match owner {
                        Some(mut owner) => {
                            let action = PointsAction::AnswerUpvote;
                            let amount = config.points_for(action);
                            let new_badges =
                                owner.apply_award(amount, StatsDelta::default(), &config);
                            owner.updated_at = now_rfc3339();
                            tx_write(&db, transaction, collections::USERS, &owner_id, &owner)?;
                            Some(PointsAward {
                                points: owner.points,
                                points_awarded: amount,
                                new_badges,
                                reason: action.reason().to_string(),
                            })
                        }
                        None => None,
                    };

                    Ok::<_, BackoffError<FirestoreError>>(Ok(VoteResult {
                        question,
                        outcome,
                        owner_id,
                        award,
                    }))
                })
            })
            .await
            .map_err(tx_error)?
    }

    /// Delete a question (asker only) and the notifications that refer to it.
    pub async fn delete_question(&self, question_id: &str, user_id: &str) -> Result<(), AppError> {
        let qid = question_id.to_string();
        let uid = user_id.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let qid = qid.clone();
                let uid = uid.clone();
                Box::pin(async move {
                    let Some(question) =
                        tx_read::<Question>(&db, collections::QUESTIONS, &qid).await?
                    else {
                        return Ok(Err(AppError::NotFound("Question not found".to_string())));
                    };
                    if question.asked_by != uid {
                        return Ok(Err(AppError::Forbidden(
                            "You can only delete your own questions".to_string(),
                        )));
                    }
                    tx_delete(&db, transaction, collections::QUESTIONS, &qid)?;
                    Ok::<_, BackoffError<FirestoreError>>(Ok(()))
                })
            })
            .await
            .map_err(tx_error)??;

        let notifications: Vec<Notification> = self
            .find_by_field(collections::NOTIFICATIONS, "metadata.questionId", question_id)
            .await?;
        let ids: Vec<String> = notifications.into_iter().map(|n| n.id).collect();
        self.batch_delete(collections::NOTIFICATIONS, &ids).await?;

        tracing::info!(
            question_id,
            notifications = ids.len(),
            "Question deleted"
        );
        Ok(())
    }

    /// Remove an answer (answerer only).
    pub async fn delete_answer(
        &self,
        question_id: &str,
        answer_id: &str,
        user_id: &str,
    ) -> Result<Question, AppError> {
        let answer_id = answer_id.to_string();
        let user_id = user_id.to_string();

        self.modify_doc(
            collections::QUESTIONS,
            question_id,
            "Question not found",
            move |question: &mut Question| {
                let answer = question
                    .answer(&answer_id)
                    .ok_or_else(|| AppError::NotFound("Answer not found".to_string()))?;
                if answer.answered_by != user_id {
                    return Err(AppError::Forbidden(
                        "You can only delete your own answers".to_string(),
                    ));
                }
                question.remove_answer(&answer_id);
                Ok(question.clone())
            },
        )
        .await
    }
}
