// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account creation and credential checks.

use crate::db::users::normalize_email;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::user::{LearnSkill, SkillLevel, TeachSkill, User, DEFAULT_AVATAR};
use crate::time_utils::now_rfc3339;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::Deserialize;
use validator::Validate;

/// Skill as submitted by a client. Entries without an ID get a fresh one.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SkillInput {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub level: Option<SkillLevel>,
    #[serde(default)]
    pub category: String,
}

impl SkillInput {
    pub fn into_teach(self) -> TeachSkill {
        TeachSkill {
            id: skill_id(self.id),
            name: self.name.trim().to_string(),
            level: self.level.unwrap_or_default(),
            category: self.category,
        }
    }

    pub fn into_learn(self) -> LearnSkill {
        LearnSkill {
            id: skill_id(self.id),
            name: self.name.trim().to_string(),
            category: self.category,
        }
    }
}

fn skill_id(id: Option<String>) -> String {
    id.filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[serde(default)]
    pub college: String,
    #[serde(default)]
    pub education_level: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub bio: String,
    #[serde(default)]
    #[validate(nested)]
    pub skills_can_teach: Vec<SkillInput>,
    #[serde(default)]
    #[validate(nested)]
    pub skills_want_to_learn: Vec<SkillInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

/// `false` for a wrong password or an unparseable stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

/// Create a user. Fails with `Conflict` if the email is taken.
pub async fn signup(db: &FirestoreDb, request: SignupRequest) -> Result<User, AppError> {
    request.validate()?;

    let now = now_rfc3339();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: request.name.trim().to_string(),
        email: normalize_email(&request.email),
        password_hash: hash_password(&request.password)?,
        college: request.college,
        education_level: request.education_level,
        bio: request.bio,
        avatar: DEFAULT_AVATAR.to_string(),
        skills_can_teach: request
            .skills_can_teach
            .into_iter()
            .map(SkillInput::into_teach)
            .collect(),
        skills_want_to_learn: request
            .skills_want_to_learn
            .into_iter()
            .map(SkillInput::into_learn)
            .collect(),
        points: 0,
        badges: vec![],
        sessions_completed: 0,
        questions_answered: 0,
        questions_asked: 0,
        rating: 0.0,
        connections: vec![],
        sessions: vec![],
        quiz_completions: vec![],
        match_percentage: 0.0,
        created_at: now.clone(),
        updated_at: now,
    };

    db.create_user(&user).await?;
    tracing::info!(user_id = %user.id, "User signed up");
    Ok(user)
}

/// Check credentials: unknown email is `NotFound`, a wrong password is a
/// `Validation` error.
pub async fn login(db: &FirestoreDb, request: LoginRequest) -> Result<User, AppError> {
    request.validate()?;

    let user = db
        .get_user_by_email(&request.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !verify_password(&request.password, &user.password_hash) {
        tracing::info!(user_id = %user.id, "Login rejected: bad password");
        return Err(AppError::Validation("Invalid credentials".to_string()));
    }

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_skill_input_defaults_to_beginner() {
        let input: SkillInput = serde_json::from_str(r#"{"name":" Rust "}"#).unwrap();
        let skill = input.into_teach();
        assert_eq!(skill.name, "Rust");
        assert_eq!(skill.level, SkillLevel::Beginner);
        assert!(!skill.id.is_empty());

        let kept: SkillInput = serde_json::from_str(r#"{"id":"s1","name":"Go"}"#).unwrap();
        assert_eq!(kept.into_learn().id, "s1");
    }

    #[test]
    fn test_signup_request_validation() {
        let bad: SignupRequest = serde_json::from_str(
            r#"{"name":"","email":"not-an-email","password":"123"}"#,
        )
        .unwrap();
        let err = AppError::from(bad.validate().unwrap_err());
        assert_eq!(
            err.to_string(),
            "Invalid fields: email, name, password"
        );
    }

    #[tokio::test]
    async fn test_login_validates_before_touching_db() {
        let db = FirestoreDb::new_mock();
        let request = LoginRequest {
            email: "nope".to_string(),
            password: "x".to_string(),
        };
        assert!(matches!(
            login(&db, request).await,
            Err(AppError::Validation(_))
        ));
    }
}
