// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic shared by the route handlers.

pub mod accounts;
pub mod notifier;
pub mod points;
pub mod recommender;

pub use notifier::Notifier;
pub use points::PointsService;
pub use recommender::{RecommenderClient, RecommenderError};
