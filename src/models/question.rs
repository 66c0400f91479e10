// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Q&A forum questions with embedded answers and vote lists.

use serde::{Deserialize, Serialize};

use crate::models::user::{push_unique, remove_all};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    Up,
    Down,
}

/// What a vote did to the voter's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Already voted this way
    Unchanged,
    /// Neutral -> voted
    Added,
    /// Moved from the opposite list
    Switched,
    /// Already voted this way, but a stray opposite entry was dropped
    Healed,
}

impl VoteOutcome {
    /// The stored lists differ and need writing.
    pub fn changed(&self) -> bool {
        !matches!(self, VoteOutcome::Unchanged)
    }

    /// The voter's visible position moved.
    pub fn moved(&self) -> bool {
        matches!(self, VoteOutcome::Added | VoteOutcome::Switched)
    }
}

/// Record `voter`'s vote.
///
/// Votes are monotonic: repeating a vote is a no-op and there is no way back
/// to neutral. The two lists never both contain the voter.
pub fn apply_vote(
    up_votes: &mut Vec<String>,
    down_votes: &mut Vec<String>,
    voter: &str,
    direction: VoteDirection,
) -> VoteOutcome {
    let (target, opposite) = match direction {
        VoteDirection::Up => (up_votes, down_votes),
        VoteDirection::Down => (down_votes, up_votes),
    };

    if target.iter().any(|v| v == voter) {
        return if remove_all(opposite, voter) {
            VoteOutcome::Healed
        } else {
            VoteOutcome::Unchanged
        };
    }

    let switched = remove_all(opposite, voter);
    push_unique(target, voter);
    if switched {
        VoteOutcome::Switched
    } else {
        VoteOutcome::Added
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: String,
    pub answer: String,
    pub answered_by: String,
    pub answered_at: String,
    #[serde(default)]
    pub up_votes: Vec<String>,
    #[serde(default)]
    pub down_votes: Vec<String>,
}

impl Answer {
    pub fn vote(&mut self, voter: &str, direction: VoteDirection) -> VoteOutcome {
        apply_vote(&mut self.up_votes, &mut self.down_votes, voter, direction)
    }
}

/// Question stored in Firestore (document ID = `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub asked_by: String,
    pub asked_at: String,
    #[serde(default)]
    pub up_votes: Vec<String>,
    #[serde(default)]
    pub down_votes: Vec<String>,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

impl Question {
    pub fn vote(&mut self, voter: &str, direction: VoteDirection) -> VoteOutcome {
        apply_vote(&mut self.up_votes, &mut self.down_votes, voter, direction)
    }

    pub fn answer(&self, answer_id: &str) -> Option<&Answer> {
        self.answers.iter().find(|a| a.id == answer_id)
    }

    pub fn answer_mut(&mut self, answer_id: &str) -> Option<&mut Answer> {
        self.answers.iter_mut().find(|a| a.id == answer_id)
    }

    pub fn add_answer(&mut self, text: String, answered_by: &str, now: &str) -> &Answer {
        self.answers.push(Answer {
            id: uuid::Uuid::new_v4().to_string(),
            answer: text,
            answered_by: answered_by.to_string(),
            answered_at: now.to_string(),
            up_votes: Vec::new(),
            down_votes: Vec::new(),
        });
        &self.answers[self.answers.len() - 1]
    }

    /// Remove an answer. Returns `false` if it did not exist.
    pub fn remove_answer(&mut self, answer_id: &str) -> bool {
        let before = self.answers.len();
        self.answers.retain(|a| a.id != answer_id);
        self.answers.len() != before
    }

    /// Every user id referenced as an author.
    pub fn author_ids(&self) -> Vec<String> {
        let mut ids = vec![self.asked_by.clone()];
        for answer in &self.answers {
            push_unique(&mut ids, &answer.answered_by);
        }
        ids
    }
}
