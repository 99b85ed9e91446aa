//! Workload and dashboard summaries

use axum::{extract::State, routing::get, Json, Router};
use staffing_common::allocation::{self, DashboardSummary, StaffWorkload};

use crate::{ApiResult, AppState};

/// GET /api/workload
pub async fn get_workload(State(state): State<AppState>) -> ApiResult<Json<Vec<StaffWorkload>>> {
    let workload = allocation::staff_workload(&state.db, state.over_allocation_threshold).await?;
    Ok(Json(workload))
}

/// GET /api/dashboard
pub async fn get_dashboard(State(state): State<AppState>) -> ApiResult<Json<DashboardSummary>> {
    let summary =
        allocation::dashboard_summary(&state.db, state.over_allocation_threshold).await?;
    Ok(Json(summary))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workload", get(get_workload))
        .route("/api/dashboard", get(get_dashboard))
}
