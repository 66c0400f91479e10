// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! StudentHub: peer-to-peer learning backend.
//!
//! This crate provides the REST API behind the StudentHub app: profiles and
//! skills, study-partner matching and connections, scheduled sessions, a
//! Q&A forum, points and badges, and the notification inbox that ties them
//! together.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{Notifier, PointsService, RecommenderClient};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub points: PointsService,
    pub notifier: Notifier,
    pub recommender: RecommenderClient,
}

impl AppState {
    /// Wire the services around a database handle.
    pub fn new(config: Config, db: FirestoreDb) -> anyhow::Result<Self> {
        let points = PointsService::new(db.clone(), config.points.clone());
        let notifier = Notifier::new(db.clone());
        let recommender = RecommenderClient::new(&config.recommender_url)?;

        Ok(Self {
            config,
            db,
            points,
            notifier,
            recommender,
        })
    }
}
