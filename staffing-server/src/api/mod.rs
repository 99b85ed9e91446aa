//! HTTP API handlers for staffing-server

pub mod assignments;
pub mod buildinfo;
pub mod dashboard;
pub mod health;
pub mod projects;
pub mod roles;
pub mod staff;
pub mod upload;

pub use assignments::assignment_routes;
pub use buildinfo::buildinfo_routes;
pub use dashboard::dashboard_routes;
pub use health::health_routes;
pub use projects::project_routes;
pub use roles::role_routes;
pub use staff::staff_routes;
pub use upload::upload_routes;

use serde::Serialize;

/// Body returned by delete endpoints
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
