// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Skill list routes. Every change is a transactional edit of the caller's
//! user document.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::user::{LearnSkill, SkillLevel, TeachSkill};
use crate::routes::users::load_user;
use crate::routes::{ok, ApiJson, ApiResponse};
use crate::services::accounts::SkillInput;
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/skill/all-skills", get(get_all_skills))
        .route("/api/skill/add-skill-can-teach", post(add_skill_to_teach))
        .route("/api/skill/add-skill-to-learn", post(add_skill_to_learn))
        .route("/api/skill/update/{id}", put(update_skill_level))
        .route("/api/skill/update-skills-to-teach", put(replace_skills_to_teach))
        .route("/api/skill/update-skills-to-learn", put(replace_skills_to_learn))
        .route(
            "/api/skill/delete-skill-can-teach/{id}",
            delete(delete_skill_to_teach),
        )
        .route(
            "/api/skill/delete-skill-to-learn/{id}",
            delete(delete_skill_to_learn),
        )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllSkills {
    pub skills_can_teach: Vec<TeachSkill>,
    pub skills_want_to_learn: Vec<LearnSkill>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachSkills {
    pub skills_can_teach: Vec<TeachSkill>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnSkills {
    pub skills_want_to_learn: Vec<LearnSkill>,
}

async fn get_all_skills(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<AllSkills>>> {
    let user = load_user(&state, &user.id).await?;
    Ok(ok(
        "Skills fetched successfully",
        AllSkills {
            skills_can_teach: user.skills_can_teach,
            skills_want_to_learn: user.skills_want_to_learn,
        },
    ))
}

async fn add_skill_to_teach(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(input): ApiJson<SkillInput>,
) -> Result<Json<ApiResponse<TeachSkills>>> {
    input.validate()?;
    let skill = input.into_teach();

    let skills_can_teach = state
        .db
        .modify_user(&user.id, move |u| {
            u.skills_can_teach.push(skill.clone());
            u.updated_at = now_rfc3339();
            Ok(u.skills_can_teach.clone())
        })
        .await?;

    Ok(ok("Skill added successfully", TeachSkills { skills_can_teach }))
}

async fn add_skill_to_learn(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(input): ApiJson<SkillInput>,
) -> Result<Json<ApiResponse<LearnSkills>>> {
    input.validate()?;
    let skill = input.into_learn();

    let skills_want_to_learn = state
        .db
        .modify_user(&user.id, move |u| {
            u.skills_want_to_learn.push(skill.clone());
            u.updated_at = now_rfc3339();
            Ok(u.skills_want_to_learn.clone())
        })
        .await?;

    Ok(ok(
        "Skill added successfully",
        LearnSkills {
            skills_want_to_learn,
        },
    ))
}

#[derive(Deserialize)]
struct LevelUpdate {
    level: SkillLevel,
}

async fn update_skill_level(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(skill_id): Path<String>,
    ApiJson(update): ApiJson<LevelUpdate>,
) -> Result<Json<ApiResponse<TeachSkills>>> {
    let skills_can_teach = state
        .db
        .modify_user(&user.id, move |u| {
            let skill = u
                .skills_can_teach
                .iter_mut()
                .find(|s| s.id == skill_id)
                .ok_or_else(|| AppError::NotFound("Skill not found".to_string()))?;
            skill.level = update.level;
            u.updated_at = now_rfc3339();
            Ok(u.skills_can_teach.clone())
        })
        .await?;

    Ok(ok("Skill updated successfully", TeachSkills { skills_can_teach }))
}

#[derive(Deserialize, Validate)]
struct SkillList {
    #[validate(nested)]
    skills: Vec<SkillInput>,
}

async fn replace_skills_to_teach(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(list): ApiJson<SkillList>,
) -> Result<Json<ApiResponse<TeachSkills>>> {
    list.validate()?;
    let skills: Vec<TeachSkill> = list.skills.into_iter().map(SkillInput::into_teach).collect();

    let skills_can_teach = state
        .db
        .modify_user(&user.id, move |u| {
            u.skills_can_teach = skills.clone();
            u.updated_at = now_rfc3339();
            Ok(u.skills_can_teach.clone())
        })
        .await?;

    Ok(ok(
        "Teaching skills updated successfully",
        TeachSkills { skills_can_teach },
    ))
}

async fn replace_skills_to_learn(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ApiJson(list): ApiJson<SkillList>,
) -> Result<Json<ApiResponse<LearnSkills>>> {
    list.validate()?;
    let skills: Vec<LearnSkill> = list.skills.into_iter().map(SkillInput::into_learn).collect();

    let skills_want_to_learn = state
        .db
        .modify_user(&user.id, move |u| {
            u.skills_want_to_learn = skills.clone();
            u.updated_at = now_rfc3339();
            Ok(u.skills_want_to_learn.clone())
        })
        .await?;

    Ok(ok(
        "Learning skills updated successfully",
        LearnSkills {
            skills_want_to_learn,
        },
    ))
}

async fn delete_skill_to_teach(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(skill_id): Path<String>,
) -> Result<Json<ApiResponse<TeachSkills>>> {
    let skills_can_teach = state
        .db
        .modify_user(&user.id, move |u| {
            u.skills_can_teach.retain(|s| s.id != skill_id);
            u.updated_at = now_rfc3339();
            Ok(u.skills_can_teach.clone())
        })
        .await?;

    Ok(ok("Skill deleted successfully", TeachSkills { skills_can_teach }))
}

async fn delete_skill_to_learn(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(skill_id): Path<String>,
) -> Result<Json<ApiResponse<LearnSkills>>> {
    let skills_want_to_learn = state
        .db
        .modify_user(&user.id, move |u| {
            u.skills_want_to_learn.retain(|s| s.id != skill_id);
            u.updated_at = now_rfc3339();
            Ok(u.skills_want_to_learn.clone())
        })
        .await?;

    Ok(ok(
        "Skill deleted successfully",
        LearnSkills {
            skills_want_to_learn,
        },
    ))
}
