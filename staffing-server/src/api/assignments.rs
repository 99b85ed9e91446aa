//! Assignment endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use staffing_common::db::{self, AssignmentDetail, AssignmentUpdate, AssignmentUpsert};

use super::SuccessResponse;
use crate::{ApiError, ApiResult, AppState};

/// Query filters for `GET /api/assignments`
#[derive(Debug, Default, Deserialize)]
pub struct AssignmentFilter {
    pub project_id: Option<String>,
    pub staff_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogHoursRequest {
    pub assignment_id: String,
    pub hours: f64,
}

/// GET /api/assignments?project_id=&staff_id=
pub async fn list_assignments(
    State(state): State<AppState>,
    Query(filter): Query<AssignmentFilter>,
) -> ApiResult<Json<Vec<AssignmentDetail>>> {
    let details = db::list_assignment_details(
        &state.db,
        filter.project_id.as_deref(),
        filter.staff_id.as_deref(),
    )
    .await?;
    Ok(Json(details))
}

/// POST /api/assignments
///
/// Creates the assignment for the (project, staff, role) triple or updates
/// the existing one.
pub async fn upsert_assignment(
    State(state): State<AppState>,
    payload: Result<Json<AssignmentUpsert>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AssignmentDetail>)> {
    let Json(upsert) = payload?;
    let assignment = db::upsert_assignment(&state.db, &upsert).await?;
    let detail = db::get_assignment_detail(&state.db, &assignment.id).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// PUT /api/assignments/:id
pub async fn update_assignment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AssignmentUpdate>, JsonRejection>,
) -> ApiResult<Json<AssignmentDetail>> {
    let Json(update) = payload?;
    db::update_assignment(&state.db, &id, &update).await?;
    Ok(Json(db::get_assignment_detail(&state.db, &id).await?))
}

/// DELETE /api/assignments/:id
pub async fn delete_assignment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    db::delete_assignment(&state.db, &id).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// POST /api/assignments/log-hours
///
/// **Request:** `{"assignment_id": "...", "hours": 4.5}`; hours are added
/// to the logged total.
pub async fn log_hours(
    State(state): State<AppState>,
    payload: Result<Json<LogHoursRequest>, JsonRejection>,
) -> ApiResult<Json<AssignmentDetail>> {
    let Json(request) = payload?;
    if request.assignment_id.trim().is_empty() {
        return Err(ApiError::BadRequest("assignment_id is required".to_string()));
    }

    db::add_logged_hours(&state.db, &request.assignment_id, request.hours).await?;
    Ok(Json(db::get_assignment_detail(&state.db, &request.assignment_id).await?))
}

pub fn assignment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/assignments", get(list_assignments).post(upsert_assignment))
        .route("/api/assignments/log-hours", post(log_hours))
        .route(
            "/api/assignments/:id",
            put(update_assignment).delete(delete_assignment),
        )
}
