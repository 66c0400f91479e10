// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod notification;
pub mod points;
pub mod question;
pub mod session;
pub mod user;

pub use notification::{Notification, NotificationType};
pub use points::{PointsAward, PointsConfig};
pub use question::{Answer, Question};
pub use session::{Session, SessionDocument, SessionStatus};
pub use user::{User, UserProfile, UserSummary};
