//! Project endpoints and the allocation actions that hang off a project
//!
//! Total hours are always derived from deal size and blended rate. A
//! `PUT` that changes either of them resets every assignment on the project
//! to its role share; the response then carries the recalculation report.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use staffing_common::allocation::{
    self, ProjectAllocation, RecalculationReport, RoleQuota, StaffAssignmentRequest,
};
use staffing_common::db::{self, Assignment, NewProject, ProjectDetail, ProjectUpdate};
use tracing::{info, warn};

use super::SuccessResponse;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct ProjectUpdateResponse {
    #[serde(flatten)]
    pub project: ProjectDetail,
    /// Present when pricing changed and assignments were recalculated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recalculation: Option<RecalculationReport>,
}

#[derive(Debug, Deserialize)]
pub struct AutoAssignRequest {
    #[serde(default)]
    pub assignments: Vec<StaffAssignmentRequest>,
}

async fn load_detail(state: &AppState, id: &str) -> ApiResult<ProjectDetail> {
    db::get_project_detail(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Project not found: {}", id)))
}

/// GET /api/projects
pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<ProjectDetail>>> {
    Ok(Json(db::list_project_details(&state.db).await?))
}

/// GET /api/projects/:id
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProjectDetail>> {
    Ok(Json(load_detail(&state, &id).await?))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    payload: Result<Json<NewProject>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ProjectDetail>)> {
    let Json(new) = payload?;
    let project = db::insert_project(&state.db, &new).await?;
    Ok((
        StatusCode::CREATED,
        Json(ProjectDetail {
            project,
            assignments: Vec::new(),
        }),
    ))
}

/// PUT /api/projects/:id
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ProjectUpdate>, JsonRejection>,
) -> ApiResult<Json<ProjectUpdateResponse>> {
    let Json(update) = payload?;
    let (_, recalculation) =
        allocation::update_project_with_recalculation(&state.db, &id, &update).await?;

    if let Some(report) = &recalculation {
        let discarded = report.overrides_discarded();
        if discarded > 0 {
            warn!(project_id = %id, discarded, "Project update discarded manual allocations");
        }
    }

    Ok(Json(ProjectUpdateResponse {
        project: load_detail(&state, &id).await?,
        recalculation,
    }))
}

/// DELETE /api/projects/:id
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    db::delete_project(&state.db, &id).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// POST /api/projects/:id/calculate
pub async fn calculate_allocation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProjectAllocation>> {
    Ok(Json(allocation::calculate_project_allocation(&state.db, &id).await?))
}

/// POST /api/projects/:id/recalculate
pub async fn recalculate_allocations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RecalculationReport>> {
    Ok(Json(allocation::recalculate_project_allocations(&state.db, &id).await?))
}

/// POST /api/projects/:id/auto-assign
///
/// **Request:** `{"assignments": [{"staff_id": "...", "role_id": "..."}]}`
pub async fn auto_assign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AutoAssignRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<Assignment>>> {
    let Json(request) = payload?;
    if request.assignments.is_empty() {
        return Err(ApiError::BadRequest("Assignments array is required".to_string()));
    }

    let assignments =
        allocation::auto_assign_staff_to_project(&state.db, &id, &request.assignments).await?;
    info!(project_id = %id, count = assignments.len(), "Auto-assign completed");
    Ok(Json(assignments))
}

/// GET /api/projects/:id/roles/:role_id/quota
pub async fn get_role_quota(
    State(state): State<AppState>,
    Path((id, role_id)): Path<(String, String)>,
) -> ApiResult<Json<RoleQuota>> {
    Ok(Json(allocation::role_quota(&state.db, &id, &role_id).await?))
}

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/api/projects/:id/calculate", post(calculate_allocation))
        .route("/api/projects/:id/recalculate", post(recalculate_allocations))
        .route("/api/projects/:id/auto-assign", post(auto_assign))
        .route("/api/projects/:id/roles/:role_id/quota", get(get_role_quota))
}
