//! Learnstack API Library
//!
//! This crate provides the core functionality for the Learnstack API:
//! atomic cart checkout, coupon redemption, order management, and course
//! enrollment.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{routing::get, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Versioned API surface mounted under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/checkout", handlers::checkout::routes())
        .nest("/coupons", handlers::coupons::routes())
        .nest("/orders", handlers::orders::routes())
        .nest("/enrollments", handlers::enrollments::routes())
}

/// Probe routes mounted at the root
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::simple_health_check))
        .route("/health/live", get(health::simple_health_check))
        .route("/health/ready", get(health::readiness_check))
}
