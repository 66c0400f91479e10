//! User model for storage and API.

use serde::{Deserialize, Serialize};

pub const DEFAULT_AVATAR: &str =
    "https://tse3.mm.bing.net/th/id/OIP.VTn0NAxal8BSB5W3ZTSdUAHaHT?rs=1&pid=ImgDetMain&o=7&rm=3";

/// Proficiency claimed for a skill the user can teach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

/// A skill the user offers to teach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachSkill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub level: SkillLevel,
    #[serde(default)]
    pub category: String,
}

/// A skill the user wants to learn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnSkill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
}

/// Achievement markers. Once granted they are never revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Badge {
    #[serde(rename = "First Step")]
    FirstStep,
    Helper,
    #[serde(rename = "Quick Learner")]
    QuickLearner,
    #[serde(rename = "Knowledge Sharer")]
    KnowledgeSharer,
    Mentor,
    Legend,
    Noble,
}

impl Badge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Badge::FirstStep => "First Step",
            Badge::Helper => "Helper",
            Badge::QuickLearner => "Quick Learner",
            Badge::KnowledgeSharer => "Knowledge Sharer",
            Badge::Mentor => "Mentor",
            Badge::Legend => "Legend",
            Badge::Noble => "Noble",
        }
    }
}

/// Ledger entry proving a quiz was already rewarded for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizCompletion {
    pub session_id: String,
    pub score: u32,
    pub awarded_points: u32,
    pub created_at: String,
}

/// User profile stored in Firestore (document ID = `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    /// Stored lowercased; unique via the `emails` index collection
    pub email: String,
    /// Argon2 PHC string
    #[serde(rename = "password")]
    pub password_hash: String,
    #[serde(default)]
    pub college: String,
    #[serde(default)]
    pub education_level: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default = "default_avatar")]
    pub avatar: String,
    #[serde(default)]
    pub skills_can_teach: Vec<TeachSkill>,
    #[serde(default)]
    pub skills_want_to_learn: Vec<LearnSkill>,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub badges: Vec<Badge>,
    #[serde(default)]
    pub sessions_completed: u32,
    #[serde(default)]
    pub questions_answered: u32,
    #[serde(default)]
    pub questions_asked: u32,
    /// 0.0 - 5.0
    #[serde(default)]
    pub rating: f64,
    /// Symmetric: if B is here, A is in B's list
    #[serde(default)]
    pub connections: Vec<String>,
    #[serde(default)]
    pub sessions: Vec<String>,
    #[serde(default)]
    pub quiz_completions: Vec<QuizCompletion>,
    /// Advisory compatibility score (0 - 100)
    #[serde(default)]
    pub match_percentage: f64,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

fn default_avatar() -> String {
    DEFAULT_AVATAR.to_string()
}

impl User {
    pub fn is_connected_to(&self, other_id: &str) -> bool {
        self.connections.iter().any(|c| c == other_id)
    }

    /// Push-if-absent. Returns `true` if the list changed.
    pub fn add_connection(&mut self, other_id: &str) -> bool {
        push_unique(&mut self.connections, other_id)
    }

    /// Returns `true` if the list changed.
    pub fn remove_connection(&mut self, other_id: &str) -> bool {
        remove_all(&mut self.connections, other_id)
    }

    pub fn add_session(&mut self, session_id: &str) -> bool {
        push_unique(&mut self.sessions, session_id)
    }

    pub fn remove_session(&mut self, session_id: &str) -> bool {
        remove_all(&mut self.sessions, session_id)
    }

    pub fn quiz_completion(&self, session_id: &str) -> Option<&QuizCompletion> {
        self.quiz_completions
            .iter()
            .find(|c| c.session_id == session_id)
    }

    pub fn has_badge(&self, badge: Badge) -> bool {
        self.badges.contains(&badge)
    }

    /// Value of a leaderboard column for this user.
    pub fn stat(&self, field: LeaderboardField) -> u32 {
        match field {
            LeaderboardField::Points => self.points,
            LeaderboardField::SessionsCompleted => self.sessions_completed,
            LeaderboardField::QuestionsAnswered => self.questions_answered,
        }
    }

    pub fn teaches_any(&self, skill_names: &[String]) -> bool {
        self.skills_can_teach
            .iter()
            .any(|s| skill_names.iter().any(|n| n.eq_ignore_ascii_case(&s.name)))
    }
}

/// Sortable leaderboard columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardField {
    Points,
    SessionsCompleted,
    QuestionsAnswered,
}

impl LeaderboardField {
    /// Unknown filters fall back to points.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "sessionsCompleted" => Self::SessionsCompleted,
            "questionsAnswered" => Self::QuestionsAnswered,
            _ => Self::Points,
        }
    }

    /// Firestore field name.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Points => "points",
            Self::SessionsCompleted => "sessionsCompleted",
            Self::QuestionsAnswered => "questionsAnswered",
        }
    }
}

/// User as returned by the API (no password hash).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub college: String,
    pub education_level: String,
    pub bio: String,
    pub avatar: String,
    pub skills_can_teach: Vec<TeachSkill>,
    pub skills_want_to_learn: Vec<LearnSkill>,
    pub points: u32,
    pub badges: Vec<Badge>,
    pub sessions_completed: u32,
    pub questions_answered: u32,
    pub questions_asked: u32,
    pub rating: f64,
    pub connections: Vec<String>,
    pub sessions: Vec<String>,
    pub quiz_completions: Vec<QuizCompletion>,
    pub match_percentage: f64,
    pub created_at: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            college: user.college,
            education_level: user.education_level,
            bio: user.bio,
            avatar: user.avatar,
            skills_can_teach: user.skills_can_teach,
            skills_want_to_learn: user.skills_want_to_learn,
            points: user.points,
            badges: user.badges,
            sessions_completed: user.sessions_completed,
            questions_answered: user.questions_answered,
            questions_asked: user.questions_asked,
            rating: user.rating,
            connections: user.connections,
            sessions: user.sessions,
            quiz_completions: user.quiz_completions,
            match_percentage: user.match_percentage,
            created_at: user.created_at,
        }
    }
}

/// Compact author card embedded in Q&A and notification listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub points: u32,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            points: user.points,
        }
    }
}

/// Add `id` to `list` unless already present.
pub(crate) fn push_unique(list: &mut Vec<String>, id: &str) -> bool {
    if list.iter().any(|existing| existing == id) {
        return false;
    }
    list.push(id.to_string());
    true
}

/// Remove every occurrence of `id` from `list`.
pub(crate) fn remove_all(list: &mut Vec<String>, id: &str) -> bool {
    let before = list.len();
    list.retain(|existing| existing != id);
    list.len() != before
}
