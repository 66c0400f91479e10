// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client for the external study-partner recommendation service.
//!
//! The service is treated as unreliable: any transport error, non-2xx
//! status, or malformed body is reported as a `RecommenderError` so the
//! caller can fall back to a deterministic suggestion list.

use crate::models::user::{Badge, User};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
/// Number of recommendations requested per call.
pub const SUGGESTION_COUNT: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum RecommenderError {
    #[error("recommendation request failed: {0}")]
    Transport(String),
    #[error("recommendation service returned status {0}")]
    Status(u16),
    #[error("invalid recommendation response: {0}")]
    Body(String),
}

/// Which side of the skill lists to match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionMode {
    /// Find people who teach what the user wants to learn
    #[default]
    Learn,
    /// Find people with similar teaching skills
    Teach,
}

/// Feature vector sent to the recommender.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFeatures {
    pub education_level: String,
    /// The recommender always reads this field; it carries whichever skill
    /// list is being matched.
    pub skills_can_teach: Vec<String>,
    pub badges: Vec<Badge>,
    pub points: u32,
    pub sessions_completed: u32,
    pub questions_answered: u32,
    pub rating: f64,
}

impl UserFeatures {
    pub fn for_user(user: &User, mode: SuggestionMode) -> Self {
        Self {
            education_level: user.education_level.clone(),
            skills_can_teach: skills_to_match(user, mode),
            badges: user.badges.clone(),
            points: user.points,
            sessions_completed: user.sessions_completed,
            questions_answered: user.questions_answered,
            rating: user.rating,
        }
    }
}

/// Skill names used for matching. In learn mode a user with no learning
/// goals is matched on what they teach.
pub fn skills_to_match(user: &User, mode: SuggestionMode) -> Vec<String> {
    let teach = || user.skills_can_teach.iter().map(|s| s.name.clone()).collect();
    match mode {
        SuggestionMode::Teach => teach(),
        SuggestionMode::Learn if user.skills_want_to_learn.is_empty() => teach(),
        SuggestionMode::Learn => user
            .skills_want_to_learn
            .iter()
            .map(|s| s.name.clone())
            .collect(),
    }
}

#[derive(Serialize)]
struct RecommendationRequest<'a> {
    user: &'a UserFeatures,
    nums: u32,
}

/// One recommended user and its similarity score.
#[derive(Debug, Clone, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "_id")]
    pub user_id: String,
    #[serde(default)]
    pub similarity: f64,
}

#[derive(Deserialize)]
struct RecommendationResponse {
    #[serde(default)]
    result: Vec<Recommendation>,
}

/// HTTP client for `POST {base_url}/get-recomendations`.
#[derive(Clone)]
pub struct RecommenderClient {
    http: reqwest::Client,
    base_url: String,
}

impl RecommenderClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn recommend(
        &self,
        features: &UserFeatures,
        nums: u32,
    ) -> Result<Vec<Recommendation>, RecommenderError> {
        let url = format!("{}/get-recomendations", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(&RecommendationRequest {
                user: features,
                nums,
            })
            .send()
            .await
            .map_err(|e| RecommenderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RecommenderError::Status(response.status().as_u16()));
        }

        let body: RecommendationResponse = response
            .json()
            .await
            .map_err(|e| RecommenderError::Body(e.to_string()))?;

        tracing::debug!(count = body.result.len(), "Received recommendations");
        Ok(body.result)
    }
}
