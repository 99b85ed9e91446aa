//! Staff endpoints
//!
//! Reads return [`StaffDetail`]: the staff row plus role, assignments and
//! hour totals.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use staffing_common::db::{self, NewStaff, StaffDetail, StaffUpdate};

use super::SuccessResponse;
use crate::{ApiError, ApiResult, AppState};

async fn load_detail(state: &AppState, id: &str) -> ApiResult<StaffDetail> {
    db::get_staff_detail(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Staff member not found: {}", id)))
}

/// GET /api/staff
pub async fn list_staff(State(state): State<AppState>) -> ApiResult<Json<Vec<StaffDetail>>> {
    Ok(Json(db::list_staff_details(&state.db).await?))
}

/// GET /api/staff/:id
pub async fn get_staff(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StaffDetail>> {
    Ok(Json(load_detail(&state, &id).await?))
}

/// POST /api/staff
///
/// `role_id` defaults to the role with the highest percentage and
/// `hours_quota` to 40.
pub async fn create_staff(
    State(state): State<AppState>,
    payload: Result<Json<NewStaff>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StaffDetail>)> {
    let Json(new) = payload?;
    let staff = db::insert_staff(&state.db, &new).await?;
    Ok((StatusCode::CREATED, Json(load_detail(&state, &staff.id).await?)))
}

/// PUT /api/staff/:id
pub async fn update_staff(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StaffUpdate>, JsonRejection>,
) -> ApiResult<Json<StaffDetail>> {
    let Json(update) = payload?;
    db::update_staff(&state.db, &id, &update).await?;
    Ok(Json(load_detail(&state, &id).await?))
}

/// DELETE /api/staff/:id
pub async fn delete_staff(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    db::delete_staff(&state.db, &id).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub fn staff_routes() -> Router<AppState> {
    Router::new()
        .route("/api/staff", get(list_staff).post(create_staff))
        .route(
            "/api/staff/:id",
            get(get_staff).put(update_staff).delete(delete_staff),
        )
}
