//! Resource Lending Server
//!
//! REST JSON API for lending school resources to teachers, processing their
//! return with damage and suggestion reports, and tracking the maintenance
//! work those reports open.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
