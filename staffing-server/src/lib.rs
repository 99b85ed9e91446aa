//! staffing-server library
//!
//! HTTP API for the staffing dashboard: roles, staff, projects, assignments,
//! document uploads and the allocation engine.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Folder uploaded documents are written to and served from
    pub uploads_dir: PathBuf,
    /// Weekly hours above which a staff member counts as over-allocated
    pub over_allocation_threshold: f64,
    /// Request body limit for uploads
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Create state with the compiled-in threshold and upload limit
    pub fn new(db: SqlitePool, uploads_dir: PathBuf) -> Self {
        let defaults = staffing_common::config::CompiledDefaults::for_current_platform();
        Self {
            db,
            uploads_dir,
            over_allocation_threshold: defaults.over_allocation_threshold,
            max_upload_bytes: defaults.max_upload_bytes,
        }
    }

    pub fn with_over_allocation_threshold(mut self, threshold: f64) -> Self {
        self.over_allocation_threshold = threshold;
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.uploads_dir);
    let upload_limit = state.max_upload_bytes;

    Router::new()
        .merge(api::health_routes())
        .merge(api::buildinfo_routes())
        .merge(api::role_routes())
        .merge(api::staff_routes())
        .merge(api::project_routes())
        .merge(api::assignment_routes())
        .merge(api::upload_routes().layer(DefaultBodyLimit::max(upload_limit)))
        .merge(api::dashboard_routes())
        .nest_service("/uploads", uploads)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
