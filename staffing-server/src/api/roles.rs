//! Role endpoints
//!
//! `PUT /api/roles` replaces several percentages at once and requires the
//! submitted set to total 100%. `PUT /api/roles/:id` edits a single role
//! without that check.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use staffing_common::db::{self, NewRole, Role, RoleUpdate};
use tracing::info;

use super::SuccessResponse;
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct RolePercentage {
    pub id: String,
    pub default_allocation_percentage: f64,
}

#[derive(Debug, Deserialize)]
pub struct BatchRoleUpdate {
    #[serde(default)]
    pub roles: Vec<RolePercentage>,
}

/// GET /api/roles
pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Json<Vec<Role>>> {
    Ok(Json(db::list_roles(&state.db).await?))
}

/// POST /api/roles
pub async fn create_role(
    State(state): State<AppState>,
    payload: Result<Json<NewRole>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Role>)> {
    let Json(new) = payload?;
    let role = db::insert_role(&state.db, &new).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// PUT /api/roles
///
/// **Request:** `{"roles": [{"id": "...", "default_allocation_percentage": 40}]}`
///
/// **Errors:**
/// - 400: percentages do not total 100 (±0.01) or the list is empty
/// - 404: unknown role id (nothing is written)
pub async fn update_role_percentages(
    State(state): State<AppState>,
    payload: Result<Json<BatchRoleUpdate>, JsonRejection>,
) -> ApiResult<Json<Vec<Role>>> {
    let Json(batch) = payload?;
    let updates: Vec<(String, f64)> = batch
        .roles
        .into_iter()
        .map(|r| (r.id, r.default_allocation_percentage))
        .collect();

    let roles = db::update_role_percentages(&state.db, &updates).await?;
    info!(count = updates.len(), "Role percentages updated via API");
    Ok(Json(roles))
}

/// PUT /api/roles/:id
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RoleUpdate>, JsonRejection>,
) -> ApiResult<Json<Role>> {
    let Json(update) = payload?;
    Ok(Json(db::update_role(&state.db, &id, &update).await?))
}

/// DELETE /api/roles/:id
pub async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    db::delete_role(&state.db, &id).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub fn role_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/roles",
            get(list_roles).post(create_role).put(update_role_percentages),
        )
        .route("/api/roles/:id", put(update_role).delete(delete_role))
}
