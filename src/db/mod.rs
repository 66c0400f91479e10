//! Database layer (Firestore).

pub mod firestore;
mod notifications;
mod questions;
mod sessions;
pub mod users;

pub use firestore::FirestoreDb;
pub use questions::VoteResult;
pub use sessions::{InviteResponse, JoinResult};
pub use users::{DetailsUpdate, QuizResult};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Email uniqueness index (document ID = urlencoded lowercase email)
    pub const EMAILS: &str = "emails";
    pub const SESSIONS: &str = "sessions";
    pub const SESSION_DOCUMENTS: &str = "session_documents";
    pub const QUESTIONS: &str = "questions";
    pub const NOTIFICATIONS: &str = "notifications";
}
