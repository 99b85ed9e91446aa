//! Allocation engine
//!
//! Derives billable hours from a project's pricing and splits them across
//! roles by each role's default allocation percentage:
//!
//! ```text
//! total_hours = deal_size / blended_rate
//! role_hours  = total_hours * percentage / 100
//! ```
//!
//! Every assignment of a role receives that role's full share; the share is
//! not divided between several staff members holding the same role.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::db::{
    self, list_assignments, list_roles, list_staff_details, require_project, require_staff,
    set_allocated_hours, set_total_hours, upsert_computed_assignment, Assignment,
    AssignmentUpsert,
    Project, ProjectStatus, ProjectUpdate,
};
use crate::{Error, Result};

/// Allowed deviation of a role percentage total from 100
pub const PERCENTAGE_TOLERANCE: f64 = 0.01;

/// Weekly hours above which a staff member counts as over-allocated
pub const DEFAULT_OVER_ALLOCATION_THRESHOLD: f64 = 40.0;

/// Check that role percentages total 100 within [`PERCENTAGE_TOLERANCE`]
pub fn validate_percentage_total(percentages: &[f64]) -> Result<()> {
    let total: f64 = percentages.iter().sum();
    if !total.is_finite() || (total - 100.0).abs() > PERCENTAGE_TOLERANCE {
        return Err(Error::InvalidInput(format!(
            "Total allocation must equal 100%. Current total: {:.2}%",
            total
        )));
    }
    Ok(())
}

/// Billable hours bought by `deal_size` at `blended_rate`
pub fn calculate_total_hours(deal_size: f64, blended_rate: f64) -> Result<f64> {
    if !blended_rate.is_finite() || blended_rate <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "Blended rate must be greater than zero, got {}",
            blended_rate
        )));
    }
    if !deal_size.is_finite() {
        return Err(Error::InvalidInput(format!(
            "Deal size must be a number, got {}",
            deal_size
        )));
    }
    Ok(deal_size / blended_rate)
}

pub fn calculate_role_hours(total_hours: f64, percentage: f64) -> f64 {
    total_hours * percentage / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAllocation {
    pub role_id: String,
    pub role_name: String,
    pub percentage: f64,
    pub allocated_hours: f64,
}

/// Per-role split of a project's total hours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectAllocation {
    pub project_id: String,
    pub project_name: String,
    pub deal_size: f64,
    pub blended_rate: f64,
    pub total_hours: f64,
    /// Ordered by descending percentage, then role name
    pub allocations: Vec<RoleAllocation>,
}

impl ProjectAllocation {
    pub fn for_role(&self, role_id: &str) -> Option<&RoleAllocation> {
        self.allocations.iter().find(|a| a.role_id == role_id)
    }
}

/// Recompute and persist a project's total hours, then split it across all roles
pub async fn calculate_project_allocation(
    pool: &SqlitePool,
    project_id: &str,
) -> Result<ProjectAllocation> {
    let project = require_project(pool, project_id).await?;
    let total_hours = calculate_total_hours(project.deal_size, project.blended_rate)?;
    set_total_hours(pool, &project.id, total_hours).await?;

    let allocations = list_roles(pool)
        .await?
        .into_iter()
        .map(|role| RoleAllocation {
            allocated_hours: calculate_role_hours(total_hours, role.default_allocation_percentage),
            percentage: role.default_allocation_percentage,
            role_id: role.id,
            role_name: role.role_name,
        })
        .collect();

    Ok(ProjectAllocation {
        project_id: project.id,
        project_name: project.name,
        deal_size: project.deal_size,
        blended_rate: project.blended_rate,
        total_hours,
        allocations,
    })
}

/// One assignment touched by a recalculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecalculation {
    pub assignment_id: String,
    pub staff_id: String,
    pub role_id: String,
    pub previous_hours: f64,
    pub new_hours: f64,
    /// Previous hours had been set by hand
    pub manual_override: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalculationReport {
    pub project_id: String,
    pub previous_total_hours: f64,
    pub total_hours: f64,
    pub assignments: Vec<AssignmentRecalculation>,
}

impl RecalculationReport {
    /// Number of manually adjusted allocations that were overwritten
    pub fn overrides_discarded(&self) -> usize {
        self.assignments.iter().filter(|a| a.manual_override).count()
    }
}

/// Reset every assignment on the project to its role's share of total hours
///
/// Manually adjusted hours are overwritten; each one is logged at `warn` and
/// flagged in the returned report.
pub async fn recalculate_project_allocations(
    pool: &SqlitePool,
    project_id: &str,
) -> Result<RecalculationReport> {
    let previous_total = require_project(pool, project_id).await?.total_hours;
    recalculate_from(pool, project_id, previous_total).await
}

async fn recalculate_from(
    pool: &SqlitePool,
    project_id: &str,
    previous_total: f64,
) -> Result<RecalculationReport> {
    let allocation = calculate_project_allocation(pool, project_id).await?;
    let assignments = list_assignments(pool, Some(project_id), None).await?;

    let mut changes = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let Some(role) = allocation.for_role(&assignment.role_id) else {
            continue;
        };

        let manual_override = assignment.manual_allocation;
        if manual_override {
            warn!(
                project_id = %project_id,
                assignment_id = %assignment.id,
                previous_hours = assignment.allocated_hours,
                new_hours = role.allocated_hours,
                "Recalculation overwrote manually adjusted allocation"
            );
        }

        set_allocated_hours(pool, &assignment.id, role.allocated_hours).await?;
        changes.push(AssignmentRecalculation {
            assignment_id: assignment.id,
            staff_id: assignment.staff_id,
            role_id: assignment.role_id,
            previous_hours: assignment.allocated_hours,
            new_hours: role.allocated_hours,
            manual_override,
        });
    }

    let report = RecalculationReport {
        project_id: project_id.to_string(),
        previous_total_hours: previous_total,
        total_hours: allocation.total_hours,
        assignments: changes,
    };
    info!(
        project_id = %project_id,
        total_hours = report.total_hours,
        assignments = report.assignments.len(),
        overrides_discarded = report.overrides_discarded(),
        "Recalculated project allocations"
    );
    Ok(report)
}

/// Apply a project update and cascade into assignments when pricing changed
pub async fn update_project_with_recalculation(
    pool: &SqlitePool,
    project_id: &str,
    update: &ProjectUpdate,
) -> Result<(Project, Option<RecalculationReport>)> {
    let previous_total = require_project(pool, project_id).await?.total_hours;
    let outcome = db::update_project(pool, project_id, update).await?;

    if !outcome.pricing_changed {
        return Ok((outcome.project, None));
    }

    debug!(project_id = %project_id, "Pricing changed, recalculating allocations");
    let report = recalculate_from(pool, project_id, previous_total).await?;
    Ok((outcome.project, Some(report)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffAssignmentRequest {
    pub staff_id: String,
    pub role_id: String,
}

/// Upsert an assignment per (staff, role) pair at the role's computed share
///
/// Logged hours are kept on existing assignments and start at zero on new ones.
pub async fn auto_assign_staff_to_project(
    pool: &SqlitePool,
    project_id: &str,
    requests: &[StaffAssignmentRequest],
) -> Result<Vec<Assignment>> {
    let allocation = calculate_project_allocation(pool, project_id).await?;

    // Validate everything before writing anything
    for request in requests {
        if allocation.for_role(&request.role_id).is_none() {
            return Err(Error::NotFound(format!("Role not found: {}", request.role_id)));
        }
        require_staff(pool, &request.staff_id).await?;
    }

    let mut assignments = Vec::with_capacity(requests.len());
    for request in requests {
        let hours = allocation
            .for_role(&request.role_id)
            .map(|role| role.allocated_hours)
            .unwrap_or_default();
        let assignment = upsert_computed_assignment(
            pool,
            &AssignmentUpsert {
                project_id: project_id.to_string(),
                staff_id: request.staff_id.clone(),
                role_id: request.role_id.clone(),
                allocated_hours: Some(hours),
                logged_hours: None,
            },
        )
        .await?;
        assignments.push(assignment);
    }

    info!(project_id = %project_id, count = assignments.len(), "Auto-assigned staff");
    Ok(assignments)
}

/// A role's share of a project and how much of it is already staffed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleQuota {
    pub project_id: String,
    pub role_id: String,
    pub role_name: String,
    pub percentage: f64,
    pub quota_hours: f64,
    pub allocated_hours: f64,
    /// Never negative
    pub remaining_hours: f64,
}

pub async fn role_quota(pool: &SqlitePool, project_id: &str, role_id: &str) -> Result<RoleQuota> {
    let project = require_project(pool, project_id).await?;
    let role = db::require_role(pool, role_id).await?;

    let quota_hours = calculate_role_hours(project.total_hours, role.default_allocation_percentage);
    let allocated_hours: f64 = list_assignments(pool, Some(project_id), None)
        .await?
        .iter()
        .filter(|a| a.role_id == role_id)
        .map(|a| a.allocated_hours)
        .sum();

    Ok(RoleQuota {
        project_id: project.id,
        role_id: role.id,
        role_name: role.role_name,
        percentage: role.default_allocation_percentage,
        quota_hours,
        allocated_hours,
        remaining_hours: (quota_hours - allocated_hours).max(0.0),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffWorkload {
    pub staff_id: String,
    pub staff_name: String,
    pub role_name: String,
    pub hours_quota: f64,
    pub total_allocated_hours: f64,
    pub total_logged_hours: f64,
    pub is_over_allocated: bool,
}

/// Allocated and logged totals per staff member, ordered by name
pub async fn staff_workload(pool: &SqlitePool, threshold: f64) -> Result<Vec<StaffWorkload>> {
    Ok(list_staff_details(pool)
        .await?
        .into_iter()
        .map(|detail| StaffWorkload {
            is_over_allocated: detail.total_allocated_hours > threshold,
            staff_id: detail.staff.id,
            staff_name: detail.staff.name,
            role_name: detail.role.role_name,
            hours_quota: detail.staff.hours_quota,
            total_allocated_hours: detail.total_allocated_hours,
            total_logged_hours: detail.total_logged_hours,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_projects: usize,
    pub projects_by_status: HashMap<ProjectStatus, usize>,
    pub total_deal_value: f64,
    pub total_hours: f64,
    pub staff_count: usize,
    pub over_allocation_threshold: f64,
    pub over_allocated_staff: Vec<StaffWorkload>,
}

pub async fn dashboard_summary(pool: &SqlitePool, threshold: f64) -> Result<DashboardSummary> {
    let projects = db::list_projects(pool).await?;
    let workload = staff_workload(pool, threshold).await?;

    let mut projects_by_status = HashMap::new();
    for status in [
        ProjectStatus::Active,
        ProjectStatus::Potential,
        ProjectStatus::Completed,
    ] {
        projects_by_status.insert(status, 0);
    }
    for project in &projects {
        *projects_by_status.entry(project.status).or_insert(0) += 1;
    }

    Ok(DashboardSummary {
        total_projects: projects.len(),
        projects_by_status,
        total_deal_value: projects.iter().map(|p| p.deal_size).sum(),
        total_hours: projects.iter().map(|p| p.total_hours).sum(),
        staff_count: workload.len(),
        over_allocation_threshold: threshold,
        over_allocated_staff: workload.into_iter().filter(|w| w.is_over_allocated).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{test_pool, Fixture};
    use crate::db::{
        insert_project, insert_role, insert_staff, update_assignment, update_role_percentages,
        upsert_assignment, AssignmentUpdate, NewProject, NewRole, NewStaff,
    };
    use proptest::prelude::*;

    #[test]
    fn test_total_hours_example() {
        assert_eq!(calculate_total_hours(75_000.0, 125.0).unwrap(), 600.0);
    }

    #[test]
    fn test_total_hours_rejects_bad_rate() {
        assert!(matches!(calculate_total_hours(1000.0, 0.0), Err(Error::InvalidInput(_))));
        assert!(matches!(calculate_total_hours(1000.0, -5.0), Err(Error::InvalidInput(_))));
        assert!(calculate_total_hours(1000.0, f64::NAN).is_err());
    }

    #[test]
    fn test_percentage_total_tolerance() {
        assert!(validate_percentage_total(&[33.33, 33.33, 33.34]).is_ok());
        assert!(validate_percentage_total(&[50.0, 50.005]).is_ok());
        assert!(validate_percentage_total(&[50.0, 50.02]).is_err());
        assert!(validate_percentage_total(&[10.0, 20.0, 30.0, 40.0, 25.0]).is_err());
        assert!(validate_percentage_total(&[]).is_err());
    }

    proptest! {
        #[test]
        fn prop_total_hours_is_quotient(deal in 1.0f64..1.0e9, rate in 0.01f64..10_000.0) {
            prop_assert_eq!(calculate_total_hours(deal, rate).unwrap(), deal / rate);
        }

        #[test]
        fn prop_role_hours_endpoints(hours in 0.0f64..1.0e7) {
            prop_assert_eq!(calculate_role_hours(hours, 0.0), 0.0);
            prop_assert_eq!(calculate_role_hours(hours, 100.0), hours);
        }

        #[test]
        fn prop_role_shares_sum_to_total(
            hours in 0.0f64..1.0e6,
            weights in prop::collection::vec(1u32..1000, 1..8),
        ) {
            let weight_sum: u32 = weights.iter().sum();
            let percentages: Vec<f64> = weights
                .iter()
                .map(|w| *w as f64 * 100.0 / weight_sum as f64)
                .collect();
            let sum: f64 = percentages.iter().map(|p| calculate_role_hours(hours, *p)).sum();
            prop_assert!((sum - hours).abs() <= 1e-6 * hours.max(1.0));
        }
    }

    async fn two_role_setup(pool: &SqlitePool) -> (String, String, String, String) {
        let dev = insert_role(
            pool,
            &NewRole {
                role_name: "Developer".to_string(),
                default_allocation_percentage: 60.0,
            },
        )
        .await
        .unwrap();
        let qa = insert_role(
            pool,
            &NewRole {
                role_name: "QA".to_string(),
                default_allocation_percentage: 40.0,
            },
        )
        .await
        .unwrap();
        let staff = insert_staff(
            pool,
            &NewStaff {
                name: "Sam".to_string(),
                role_id: dev.id.clone(),
                hourly_cost: 90.0,
                hours_quota: 40.0,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let project = insert_project(
            pool,
            &NewProject {
                name: "Website".to_string(),
                deal_size: 75_000.0,
                blended_rate: 125.0,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        (project.id, staff.id, dev.id, qa.id)
    }

    #[tokio::test]
    async fn test_project_allocation_split() {
        let (_dir, pool) = test_pool().await;
        let (project_id, _, dev, qa) = two_role_setup(&pool).await;

        let allocation = calculate_project_allocation(&pool, &project_id).await.unwrap();
        assert_eq!(allocation.total_hours, 600.0);
        assert_eq!(allocation.allocations.len(), 2);
        assert_eq!(allocation.allocations[0].role_id, dev);
        assert_eq!(allocation.allocations[0].allocated_hours, 360.0);
        assert_eq!(allocation.for_role(&qa).unwrap().allocated_hours, 240.0);

        let err = calculate_project_allocation(&pool, "missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_auto_assign_preserves_logged_hours() {
        let (_dir, pool) = test_pool().await;
        let (project_id, staff_id, dev, _) = two_role_setup(&pool).await;
        let request = vec![StaffAssignmentRequest {
            staff_id: staff_id.clone(),
            role_id: dev.clone(),
        }];

        let created = auto_assign_staff_to_project(&pool, &project_id, &request).await.unwrap();
        assert_eq!(created[0].allocated_hours, 360.0);
        assert_eq!(created[0].logged_hours, 0.0);

        db::add_logged_hours(&pool, &created[0].id, 12.0).await.unwrap();
        let again = auto_assign_staff_to_project(&pool, &project_id, &request).await.unwrap();
        assert_eq!(again[0].id, created[0].id);
        assert_eq!(again[0].logged_hours, 12.0);
    }

    #[tokio::test]
    async fn test_auto_assign_unknown_role_writes_nothing() {
        let (_dir, pool) = test_pool().await;
        let (project_id, staff_id, dev, _) = two_role_setup(&pool).await;
        let requests = vec![
            StaffAssignmentRequest {
                staff_id: staff_id.clone(),
                role_id: dev,
            },
            StaffAssignmentRequest {
                staff_id,
                role_id: "no-such-role".to_string(),
            },
        ];

        let err = auto_assign_staff_to_project(&pool, &project_id, &requests).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(list_assignments(&pool, Some(&project_id), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deal_size_change_cascades() {
        let (_dir, pool) = test_pool().await;
        let (project_id, staff_id, dev, _) = two_role_setup(&pool).await;
        let assigned = auto_assign_staff_to_project(
            &pool,
            &project_id,
            &[StaffAssignmentRequest {
                staff_id,
                role_id: dev,
            }],
        )
        .await
        .unwrap();

        let update = ProjectUpdate {
            deal_size: Some(150_000.0),
            ..Default::default()
        };
        let (project, report) = update_project_with_recalculation(&pool, &project_id, &update)
            .await
            .unwrap();
        let report = report.unwrap();

        assert_eq!(project.total_hours, 1200.0);
        assert_eq!(report.previous_total_hours, 600.0);
        assert_eq!(report.assignments[0].previous_hours, 360.0);
        assert_eq!(report.assignments[0].new_hours, 720.0);
        assert!(!report.assignments[0].manual_override);

        let reloaded = db::require_assignment(&pool, &assigned[0].id).await.unwrap();
        assert_eq!(reloaded.allocated_hours, 720.0);
    }

    #[tokio::test]
    async fn test_rate_change_cascades_and_flags_override() {
        let (_dir, pool) = test_pool().await;
        let (project_id, staff_id, dev, _) = two_role_setup(&pool).await;
        let assigned = auto_assign_staff_to_project(
            &pool,
            &project_id,
            &[StaffAssignmentRequest {
                staff_id,
                role_id: dev,
            }],
        )
        .await
        .unwrap();
        update_assignment(
            &pool,
            &assigned[0].id,
            &AssignmentUpdate {
                allocated_hours: Some(100.0),
                logged_hours: None,
            },
        )
        .await
        .unwrap();

        let update = ProjectUpdate {
            blended_rate: Some(250.0),
            ..Default::default()
        };
        let (_, report) = update_project_with_recalculation(&pool, &project_id, &update)
            .await
            .unwrap();
        let report = report.unwrap();

        assert_eq!(report.total_hours, 300.0);
        assert_eq!(report.overrides_discarded(), 1);
        assert_eq!(report.assignments[0].new_hours, 180.0);
    }

    #[tokio::test]
    async fn test_role_percentage_change_is_not_an_override() {
        let (_dir, pool) = test_pool().await;
        let (project_id, staff_id, dev, qa) = two_role_setup(&pool).await;
        let assigned = auto_assign_staff_to_project(
            &pool,
            &project_id,
            &[StaffAssignmentRequest {
                staff_id,
                role_id: dev.clone(),
            }],
        )
        .await
        .unwrap();
        assert!(!assigned[0].manual_allocation);

        update_role_percentages(&pool, &[(dev, 70.0), (qa, 30.0)]).await.unwrap();
        let report = recalculate_project_allocations(&pool, &project_id).await.unwrap();

        assert_eq!(report.assignments[0].previous_hours, 360.0);
        assert_eq!(report.assignments[0].new_hours, 420.0);
        assert!(!report.assignments[0].manual_override);
        assert_eq!(report.overrides_discarded(), 0);
    }

    #[tokio::test]
    async fn test_recalculation_clears_manual_flag() {
        let (_dir, pool) = test_pool().await;
        let f = Fixture::create(&pool).await;
        let upsert = AssignmentUpsert {
            project_id: f.project.id.clone(),
            staff_id: f.staff.id.clone(),
            role_id: f.developer.id.clone(),
            allocated_hours: Some(42.0),
            logged_hours: None,
        };
        let assignment = upsert_assignment(&pool, &upsert).await.unwrap();

        let first = recalculate_project_allocations(&pool, &f.project.id).await.unwrap();
        assert_eq!(first.overrides_discarded(), 1);
        let second = recalculate_project_allocations(&pool, &f.project.id).await.unwrap();
        assert_eq!(second.overrides_discarded(), 0);

        let reloaded = db::require_assignment(&pool, &assignment.id).await.unwrap();
        assert_eq!(reloaded.allocated_hours, 500.0);
        assert!(!reloaded.manual_allocation);
    }

    #[tokio::test]
    async fn test_non_pricing_update_does_not_cascade() {
        let (_dir, pool) = test_pool().await;
        let f = Fixture::create(&pool).await;

        let update = ProjectUpdate {
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        let (project, report) = update_project_with_recalculation(&pool, &f.project.id, &update)
            .await
            .unwrap();
        assert_eq!(project.name, "Renamed");
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn test_role_quota_clamps_remaining() {
        let (_dir, pool) = test_pool().await;
        let f = Fixture::create(&pool).await;
        // 50_000 / 100 = 500 hours, developer role holds 100%
        let upsert = AssignmentUpsert {
            project_id: f.project.id.clone(),
            staff_id: f.staff.id.clone(),
            role_id: f.developer.id.clone(),
            allocated_hours: Some(200.0),
            logged_hours: None,
        };
        let assignment = upsert_assignment(&pool, &upsert).await.unwrap();

        let quota = role_quota(&pool, &f.project.id, &f.developer.id).await.unwrap();
        assert_eq!(quota.quota_hours, 500.0);
        assert_eq!(quota.allocated_hours, 200.0);
        assert_eq!(quota.remaining_hours, 300.0);

        set_allocated_hours(&pool, &assignment.id, 650.0).await.unwrap();
        let quota = role_quota(&pool, &f.project.id, &f.developer.id).await.unwrap();
        assert_eq!(quota.remaining_hours, 0.0);
    }

    #[tokio::test]
    async fn test_workload_and_dashboard() {
        let (_dir, pool) = test_pool().await;
        let f = Fixture::create(&pool).await;
        let upsert = AssignmentUpsert {
            project_id: f.project.id.clone(),
            staff_id: f.staff.id.clone(),
            role_id: f.developer.id.clone(),
            allocated_hours: Some(45.0),
            logged_hours: Some(5.0),
        };
        upsert_assignment(&pool, &upsert).await.unwrap();

        let workload = staff_workload(&pool, DEFAULT_OVER_ALLOCATION_THRESHOLD).await.unwrap();
        assert_eq!(workload.len(), 1);
        assert!(workload[0].is_over_allocated);
        assert_eq!(workload[0].total_logged_hours, 5.0);

        let relaxed = staff_workload(&pool, 50.0).await.unwrap();
        assert!(!relaxed[0].is_over_allocated);

        let summary = dashboard_summary(&pool, DEFAULT_OVER_ALLOCATION_THRESHOLD).await.unwrap();
        assert_eq!(summary.total_projects, 1);
        assert_eq!(summary.projects_by_status[&ProjectStatus::Active], 1);
        assert_eq!(summary.projects_by_status[&ProjectStatus::Completed], 0);
        assert_eq!(summary.total_deal_value, 50_000.0);
        assert_eq!(summary.total_hours, 500.0);
        assert_eq!(summary.over_allocated_staff.len(), 1);
    }
}
