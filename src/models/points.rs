// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Point values, badge thresholds, and the award arithmetic.
//!
//! The arithmetic here is pure so that the database layer can run it inside
//! a transaction against a freshly read user document.

use serde::Serialize;

use crate::models::user::{Badge, User};

/// Actions that earn points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointsAction {
    AskQuestion,
    AnswerQuestion,
    AnswerUpvote,
    CreateSession,
    AttendSession,
    CompleteSessionQuiz,
    RateSession,
}

impl PointsAction {
    pub fn reason(&self) -> &'static str {
        match self {
            PointsAction::AskQuestion => "Asked a question",
            PointsAction::AnswerQuestion => "Answered a question",
            PointsAction::AnswerUpvote => "Answer upvoted",
            PointsAction::CreateSession => "Created a session",
            PointsAction::AttendSession => "Attended a session",
            PointsAction::CompleteSessionQuiz => "Completed session quiz",
            PointsAction::RateSession => "Rated a session",
        }
    }
}

/// A badge and the stat floors that grant it. All present floors must hold.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeThreshold {
    pub badge: Badge,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions_completed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions_answered: Option<u32>,
}

impl BadgeThreshold {
    fn points(badge: Badge, points: u32) -> Self {
        Self {
            badge,
            points: Some(points),
            sessions_completed: None,
            questions_answered: None,
        }
    }

    fn sessions(badge: Badge, sessions: u32) -> Self {
        Self {
            badge,
            points: None,
            sessions_completed: Some(sessions),
            questions_answered: None,
        }
    }

    fn answers(badge: Badge, answers: u32) -> Self {
        Self {
            badge,
            points: None,
            sessions_completed: None,
            questions_answered: Some(answers),
        }
    }

    pub fn is_met_by(&self, user: &User) -> bool {
        self.points.is_none_or(|min| user.points >= min)
            && self
                .sessions_completed
                .is_none_or(|min| user.sessions_completed >= min)
            && self
                .questions_answered
                .is_none_or(|min| user.questions_answered >= min)
    }
}

/// Immutable points/badge table, built once at startup.
#[derive(Debug, Clone)]
pub struct PointsConfig {
    pub ask_question: u32,
    pub answer_question: u32,
    pub answer_upvote: u32,
    /// Published in the point table only; question votes never pay.
    pub question_upvote: u32,
    pub create_session: u32,
    pub attend_session: u32,
    pub complete_session_quiz: u32,
    pub rate_session: u32,
    pub quiz_points_per_correct: u32,
    pub badge_thresholds: Vec<BadgeThreshold>,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            ask_question: 5,
            answer_question: 10,
            answer_upvote: 2,
            question_upvote: 1,
            create_session: 15,
            attend_session: 20,
            complete_session_quiz: 50,
            rate_session: 5,
            quiz_points_per_correct: 10,
            badge_thresholds: vec![
                BadgeThreshold::points(Badge::FirstStep, 1),
                BadgeThreshold::sessions(Badge::Helper, 3),
                BadgeThreshold::points(Badge::QuickLearner, 200),
                BadgeThreshold::answers(Badge::KnowledgeSharer, 10),
                BadgeThreshold::sessions(Badge::Mentor, 10),
                BadgeThreshold::points(Badge::Legend, 400),
            ],
        }
    }
}

impl PointsConfig {
    pub fn points_for(&self, action: PointsAction) -> u32 {
        match action {
            PointsAction::AskQuestion => self.ask_question,
            PointsAction::AnswerQuestion => self.answer_question,
            PointsAction::AnswerUpvote => self.answer_upvote,
            PointsAction::CreateSession => self.create_session,
            PointsAction::AttendSession => self.attend_session,
            PointsAction::CompleteSessionQuiz => self.complete_session_quiz,
            PointsAction::RateSession => self.rate_session,
        }
    }

    /// Quiz reward: a flat amount per correct answer.
    pub fn quiz_points(&self, correct_answers: u32) -> u32 {
        correct_answers.saturating_mul(self.quiz_points_per_correct)
    }
}

/// Optional counters bumped alongside an award.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub sessions_completed: u32,
    pub questions_answered: u32,
    pub questions_asked: u32,
}

impl StatsDelta {
    pub fn questions_asked(n: u32) -> Self {
        Self {
            questions_asked: n,
            ..Self::default()
        }
    }

    pub fn questions_answered(n: u32) -> Self {
        Self {
            questions_answered: n,
            ..Self::default()
        }
    }

    pub fn sessions_completed(n: u32) -> Self {
        Self {
            sessions_completed: n,
            ..Self::default()
        }
    }
}

/// Result of a points award.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsAward {
    /// New total
    pub points: u32,
    pub points_awarded: u32,
    pub new_badges: Vec<Badge>,
    pub reason: String,
}

impl User {
    /// Apply an award and return badges earned by it.
    ///
    /// Badges already held are skipped, so repeated evaluation never
    /// duplicates or removes one.
    pub fn apply_award(&mut self, amount: u32, delta: StatsDelta, config: &PointsConfig) -> Vec<Badge> {
        self.points = self.points.saturating_add(amount);
        self.sessions_completed = self
            .sessions_completed
            .saturating_add(delta.sessions_completed);
        self.questions_answered = self
            .questions_answered
            .saturating_add(delta.questions_answered);
        self.questions_asked = self.questions_asked.saturating_add(delta.questions_asked);

        self.evaluate_badges(config)
    }

    /// Grant every badge whose threshold is now met.
    pub fn evaluate_badges(&mut self, config: &PointsConfig) -> Vec<Badge> {
        let mut earned = Vec::new();
        for threshold in &config.badge_thresholds {
            if self.has_badge(threshold.badge) || !threshold.is_met_by(self) {
                continue;
            }
            self.badges.push(threshold.badge);
            earned.push(threshold.badge);
        }
        earned
    }
}
