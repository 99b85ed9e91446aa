//! Assignment database operations
//!
//! An assignment is unique per (project, staff, role); writes go through
//! [`upsert_assignment`] so repeated staffing actions update in place.

use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, info};

use super::models::{
    Assignment, AssignmentDetail, AssignmentUpdate, AssignmentUpsert, Project, Role, Staff,
};
use super::{projects, roles, staff};
use crate::{uuid_utils, Error, Result};

const SELECT_ASSIGNMENT: &str = r#"
    SELECT id, project_id, staff_id, role_id, allocated_hours, logged_hours,
           manual_allocation, created_at, updated_at
    FROM assignments
"#;

/// Assignments, optionally filtered by project and/or staff member, newest first
pub async fn list_assignments(
    pool: &SqlitePool,
    project_id: Option<&str>,
    staff_id: Option<&str>,
) -> Result<Vec<Assignment>> {
    let sql = format!(
        "{} WHERE (? IS NULL OR project_id = ?) AND (? IS NULL OR staff_id = ?) \
         ORDER BY created_at DESC",
        SELECT_ASSIGNMENT
    );
    let rows = sqlx::query(&sql)
        .bind(project_id)
        .bind(project_id)
        .bind(staff_id)
        .bind(staff_id)
        .fetch_all(pool)
        .await?;
    rows.iter().map(Assignment::from_row).collect()
}

/// Same filters as [`list_assignments`], joined with project, staff and role
pub async fn list_assignment_details(
    pool: &SqlitePool,
    project_id: Option<&str>,
    staff_id: Option<&str>,
) -> Result<Vec<AssignmentDetail>> {
    let assignments = list_assignments(pool, project_id, staff_id).await?;
    let mut joiner = DetailJoiner::default();

    let mut details = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        details.push(joiner.join(pool, assignment).await?);
    }
    Ok(details)
}

/// Caches related rows while joining a batch of assignments
#[derive(Default)]
struct DetailJoiner {
    projects: HashMap<String, Project>,
    staff: HashMap<String, Staff>,
    roles: HashMap<String, Role>,
}

impl DetailJoiner {
    async fn join(&mut self, pool: &SqlitePool, assignment: Assignment) -> Result<AssignmentDetail> {
        if !self.projects.contains_key(&assignment.project_id) {
            let project = projects::require_project(pool, &assignment.project_id).await?;
            self.projects.insert(project.id.clone(), project);
        }
        if !self.staff.contains_key(&assignment.staff_id) {
            let member = staff::require_staff(pool, &assignment.staff_id).await?;
            self.staff.insert(member.id.clone(), member);
        }
        if !self.roles.contains_key(&assignment.role_id) {
            let role = roles::require_role(pool, &assignment.role_id).await?;
            self.roles.insert(role.id.clone(), role);
        }

        let missing = |what: &str| Error::Internal(format!("{} vanished during join", what));
        Ok(AssignmentDetail {
            project: self
                .projects
                .get(&assignment.project_id)
                .cloned()
                .ok_or_else(|| missing("project"))?,
            staff: self
                .staff
                .get(&assignment.staff_id)
                .cloned()
                .ok_or_else(|| missing("staff member"))?,
            role: self
                .roles
                .get(&assignment.role_id)
                .cloned()
                .ok_or_else(|| missing("role"))?,
            assignment,
        })
    }
}

pub async fn get_assignment(pool: &SqlitePool, id: &str) -> Result<Option<Assignment>> {
    let sql = format!("{} WHERE id = ?", SELECT_ASSIGNMENT);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(Assignment::from_row).transpose()
}

pub async fn require_assignment(pool: &SqlitePool, id: &str) -> Result<Assignment> {
    get_assignment(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Assignment not found: {}", id)))
}

pub async fn get_assignment_detail(pool: &SqlitePool, id: &str) -> Result<AssignmentDetail> {
    let assignment = require_assignment(pool, id).await?;
    DetailJoiner::default().join(pool, assignment).await
}

async fn find_by_triple(
    pool: &SqlitePool,
    project_id: &str,
    staff_id: &str,
    role_id: &str,
) -> Result<Option<Assignment>> {
    let sql = format!(
        "{} WHERE project_id = ? AND staff_id = ? AND role_id = ?",
        SELECT_ASSIGNMENT
    );
    let row = sqlx::query(&sql)
        .bind(project_id)
        .bind(staff_id)
        .bind(role_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(Assignment::from_row).transpose()
}

fn check_hours(field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(hours) if !hours.is_finite() || hours < 0.0 => Err(Error::InvalidInput(format!(
            "{} must be a non-negative number, got {}",
            field, hours
        ))),
        _ => Ok(()),
    }
}

/// Create or update the assignment for a (project, staff, role) triple
///
/// On update only the supplied hour fields change; on create missing hours are 0.
/// Supplied allocated hours mark the assignment as manually allocated.
pub async fn upsert_assignment(pool: &SqlitePool, upsert: &AssignmentUpsert) -> Result<Assignment> {
    write_upsert(pool, upsert, true).await
}

/// Upsert whose allocated hours are the role's computed share
pub async fn upsert_computed_assignment(
    pool: &SqlitePool,
    upsert: &AssignmentUpsert,
) -> Result<Assignment> {
    write_upsert(pool, upsert, false).await
}

async fn write_upsert(
    pool: &SqlitePool,
    upsert: &AssignmentUpsert,
    manual: bool,
) -> Result<Assignment> {
    for (field, value) in [
        ("project_id", &upsert.project_id),
        ("staff_id", &upsert.staff_id),
        ("role_id", &upsert.role_id),
    ] {
        if value.trim().is_empty() {
            return Err(Error::InvalidInput(format!("{} is required", field)));
        }
    }
    check_hours("allocated_hours", upsert.allocated_hours)?;
    check_hours("logged_hours", upsert.logged_hours)?;

    let now = Utc::now();
    match find_by_triple(pool, &upsert.project_id, &upsert.staff_id, &upsert.role_id).await? {
        Some(mut existing) => {
            if let Some(hours) = upsert.allocated_hours {
                existing.allocated_hours = hours;
                existing.manual_allocation = manual;
            }
            if let Some(hours) = upsert.logged_hours {
                existing.logged_hours = hours;
            }
            existing.updated_at = now;
            write_hours(pool, &existing).await?;
            debug!(assignment_id = %existing.id, "Updated assignment via upsert");
            Ok(existing)
        }
        None => {
            let assignment = Assignment {
                id: uuid_utils::generate(),
                project_id: upsert.project_id.clone(),
                staff_id: upsert.staff_id.clone(),
                role_id: upsert.role_id.clone(),
                allocated_hours: upsert.allocated_hours.unwrap_or(0.0),
                logged_hours: upsert.logged_hours.unwrap_or(0.0),
                manual_allocation: manual && upsert.allocated_hours.is_some(),
                created_at: now,
                updated_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO assignments (
                    id, project_id, staff_id, role_id, allocated_hours, logged_hours,
                    manual_allocation, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&assignment.id)
            .bind(&assignment.project_id)
            .bind(&assignment.staff_id)
            .bind(&assignment.role_id)
            .bind(assignment.allocated_hours)
            .bind(assignment.logged_hours)
            .bind(assignment.manual_allocation)
            .bind(assignment.created_at)
            .bind(assignment.updated_at)
            .execute(pool)
            .await
            .map_err(|e| Error::from_write(e, "assignment"))?;

            info!(
                assignment_id = %assignment.id,
                project_id = %assignment.project_id,
                staff_id = %assignment.staff_id,
                role_id = %assignment.role_id,
                "Created assignment"
            );
            Ok(assignment)
        }
    }
}

async fn write_hours(pool: &SqlitePool, assignment: &Assignment) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE assignments
        SET allocated_hours = ?, logged_hours = ?, manual_allocation = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(assignment.allocated_hours)
    .bind(assignment.logged_hours)
    .bind(assignment.manual_allocation)
    .bind(assignment.updated_at)
    .bind(&assignment.id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_assignment(
    pool: &SqlitePool,
    id: &str,
    update: &AssignmentUpdate,
) -> Result<Assignment> {
    check_hours("allocated_hours", update.allocated_hours)?;
    check_hours("logged_hours", update.logged_hours)?;

    let mut assignment = require_assignment(pool, id).await?;
    if let Some(hours) = update.allocated_hours {
        assignment.allocated_hours = hours;
        assignment.manual_allocation = true;
    }
    if let Some(hours) = update.logged_hours {
        assignment.logged_hours = hours;
    }
    assignment.updated_at = Utc::now();
    write_hours(pool, &assignment).await?;
    Ok(assignment)
}

/// Overwrite allocated hours with a computed value, returning the previous value
///
/// Clears the manual allocation flag.
pub async fn set_allocated_hours(pool: &SqlitePool, id: &str, hours: f64) -> Result<f64> {
    let mut assignment = require_assignment(pool, id).await?;
    let previous = assignment.allocated_hours;
    assignment.allocated_hours = hours;
    assignment.manual_allocation = false;
    assignment.updated_at = Utc::now();
    write_hours(pool, &assignment).await?;
    Ok(previous)
}

/// Add `hours` to the logged total in a single statement
///
/// Negative values act as corrections but cannot take the total below zero.
pub async fn add_logged_hours(pool: &SqlitePool, id: &str, hours: f64) -> Result<Assignment> {
    if !hours.is_finite() {
        return Err(Error::InvalidInput(format!("Hours must be a number, got {}", hours)));
    }

    let result = sqlx::query(
        r#"
        UPDATE assignments
        SET logged_hours = logged_hours + ?, updated_at = ?
        WHERE id = ? AND logged_hours + ? >= 0
        "#,
    )
    .bind(hours)
    .bind(Utc::now())
    .bind(id)
    .bind(hours)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        // Distinguish a missing row from a rejected correction
        require_assignment(pool, id).await?;
        return Err(Error::InvalidInput(
            "Logged hours cannot become negative".to_string(),
        ));
    }

    info!(assignment_id = %id, hours, "Logged hours");
    require_assignment(pool, id).await
}

pub async fn delete_assignment(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM assignments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Assignment not found: {}", id)));
    }
    info!(assignment_id = %id, "Deleted assignment");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{test_pool, Fixture};

    fn upsert(f: &Fixture, allocated: Option<f64>, logged: Option<f64>) -> AssignmentUpsert {
        AssignmentUpsert {
            project_id: f.project.id.clone(),
            staff_id: f.staff.id.clone(),
            role_id: f.developer.id.clone(),
            allocated_hours: allocated,
            logged_hours: logged,
        }
    }

    #[tokio::test]
    async fn test_upsert_same_triple_updates_in_place() {
        let (_dir, pool) = test_pool().await;
        let f = Fixture::create(&pool).await;

        let first = upsert_assignment(&pool, &upsert(&f, Some(100.0), Some(10.0))).await.unwrap();
        let second = upsert_assignment(&pool, &upsert(&f, Some(150.0), None)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.allocated_hours, 150.0);
        assert_eq!(second.logged_hours, 10.0);
        assert_eq!(list_assignments(&pool, Some(&f.project.id), None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_defaults_to_zero_hours() {
        let (_dir, pool) = test_pool().await;
        let f = Fixture::create(&pool).await;

        let created = upsert_assignment(&pool, &upsert(&f, None, None)).await.unwrap();
        assert_eq!(created.allocated_hours, 0.0);
        assert_eq!(created.logged_hours, 0.0);
    }

    #[tokio::test]
    async fn test_manual_allocation_follows_hour_source() {
        let (_dir, pool) = test_pool().await;
        let f = Fixture::create(&pool).await;

        let computed = upsert_computed_assignment(&pool, &upsert(&f, Some(50.0), None))
            .await
            .unwrap();
        assert!(!computed.manual_allocation);

        // Logged hours alone leave the allocation source untouched
        let logged = upsert_assignment(&pool, &upsert(&f, None, Some(2.0))).await.unwrap();
        assert!(!logged.manual_allocation);

        let edited = update_assignment(
            &pool,
            &computed.id,
            &AssignmentUpdate {
                allocated_hours: Some(80.0),
                logged_hours: None,
            },
        )
        .await
        .unwrap();
        assert!(edited.manual_allocation);
        assert!(require_assignment(&pool, &computed.id).await.unwrap().manual_allocation);

        assert_eq!(set_allocated_hours(&pool, &computed.id, 50.0).await.unwrap(), 80.0);
        assert!(!require_assignment(&pool, &computed.id).await.unwrap().manual_allocation);
    }

    #[tokio::test]
    async fn test_upsert_unknown_project_rejected() {
        let (_dir, pool) = test_pool().await;
        let f = Fixture::create(&pool).await;
        let mut bad = upsert(&f, Some(1.0), None);
        bad.project_id = "missing".to_string();

        let err = upsert_assignment(&pool, &bad).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_filters_and_details() {
        let (_dir, pool) = test_pool().await;
        let f = Fixture::create(&pool).await;
        upsert_assignment(&pool, &upsert(&f, Some(40.0), None)).await.unwrap();

        let by_staff = list_assignment_details(&pool, None, Some(&f.staff.id)).await.unwrap();
        assert_eq!(by_staff.len(), 1);
        assert_eq!(by_staff[0].project.name, f.project.name);
        assert_eq!(by_staff[0].role.role_name, "Developer");

        let other = list_assignment_details(&pool, Some("other-project"), None).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_log_hours_accumulates() {
        let (_dir, pool) = test_pool().await;
        let f = Fixture::create(&pool).await;
        let a = upsert_assignment(&pool, &upsert(&f, Some(100.0), Some(5.0))).await.unwrap();

        add_logged_hours(&pool, &a.id, 3.5).await.unwrap();
        let updated = add_logged_hours(&pool, &a.id, 1.5).await.unwrap();
        assert_eq!(updated.logged_hours, 10.0);

        let err = add_logged_hours(&pool, &a.id, -20.0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(matches!(add_logged_hours(&pool, "missing", 1.0).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_project_delete_cascades() {
        let (_dir, pool) = test_pool().await;
        let f = Fixture::create(&pool).await;
        let a = upsert_assignment(&pool, &upsert(&f, Some(10.0), None)).await.unwrap();

        projects::delete_project(&pool, &f.project.id).await.unwrap();
        assert!(get_assignment(&pool, &a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_role_in_use_cannot_be_deleted() {
        let (_dir, pool) = test_pool().await;
        let f = Fixture::create(&pool).await;

        let err = roles::delete_role(&pool, &f.developer.id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "got {:?}", err);
    }
}
