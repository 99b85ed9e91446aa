//! Project database operations
//!
//! `total_hours` is never accepted from callers: every write derives it from
//! the deal size and blended rate.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use super::assignments::list_assignment_details;
use super::models::{patch_text, patch_value, NewProject, Project, ProjectDetail, ProjectUpdate};
use crate::allocation::calculate_total_hours;
use crate::{uuid_utils, Error, Result};

const SELECT_PROJECT: &str = r#"
    SELECT id, name, description, status, deal_size, blended_rate, total_hours,
           start_date, end_date, period_months, enduser_name, partner_name,
           tech_stack, google_drive_url, documents, created_at, updated_at
    FROM projects
"#;

/// Result of a project update
#[derive(Debug, Clone)]
pub struct ProjectUpdateOutcome {
    pub project: Project,
    /// Deal size or blended rate differs from the stored value
    pub pricing_changed: bool,
}

/// All projects, newest first
pub async fn list_projects(pool: &SqlitePool) -> Result<Vec<Project>> {
    let sql = format!("{} ORDER BY created_at DESC", SELECT_PROJECT);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(Project::from_row).collect()
}

pub async fn get_project(pool: &SqlitePool, id: &str) -> Result<Option<Project>> {
    let sql = format!("{} WHERE id = ?", SELECT_PROJECT);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(Project::from_row).transpose()
}

pub async fn require_project(pool: &SqlitePool, id: &str) -> Result<Project> {
    get_project(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Project not found: {}", id)))
}

pub async fn get_project_detail(pool: &SqlitePool, id: &str) -> Result<Option<ProjectDetail>> {
    let Some(project) = get_project(pool, id).await? else {
        return Ok(None);
    };
    let assignments = list_assignment_details(pool, Some(id), None).await?;
    Ok(Some(ProjectDetail { project, assignments }))
}

/// Every project with its assignments, newest first
pub async fn list_project_details(pool: &SqlitePool) -> Result<Vec<ProjectDetail>> {
    let projects = list_projects(pool).await?;
    let all_assignments = list_assignment_details(pool, None, None).await?;

    Ok(projects
        .into_iter()
        .map(|project| {
            let assignments = all_assignments
                .iter()
                .filter(|a| a.assignment.project_id == project.id)
                .cloned()
                .collect();
            ProjectDetail { project, assignments }
        })
        .collect())
}

fn check_deal_size(deal_size: f64) -> Result<()> {
    if !deal_size.is_finite() || deal_size <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "Deal size must be greater than zero, got {}",
            deal_size
        )));
    }
    Ok(())
}

fn check_period(period_months: Option<i64>) -> Result<()> {
    match period_months {
        Some(months) if months < 0 => Err(Error::InvalidInput(format!(
            "Period in months cannot be negative, got {}",
            months
        ))),
        _ => Ok(()),
    }
}

fn check_dates(project: &Project) -> Result<()> {
    if let (Some(start), Some(end)) = (project.start_date, project.end_date) {
        if end < start {
            return Err(Error::InvalidInput(format!(
                "End date {} is before start date {}",
                end, start
            )));
        }
    }
    Ok(())
}

pub async fn insert_project(pool: &SqlitePool, new: &NewProject) -> Result<Project> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Name is required".to_string()));
    }
    check_deal_size(new.deal_size)?;
    check_period(new.period_months)?;
    let total_hours = calculate_total_hours(new.deal_size, new.blended_rate)?;

    let now = Utc::now();
    let project = Project {
        id: uuid_utils::generate(),
        name: name.to_string(),
        description: patch_text(None, Some(new.description.clone())),
        status: new.status,
        deal_size: new.deal_size,
        blended_rate: new.blended_rate,
        total_hours,
        start_date: new.start_date,
        end_date: new.end_date,
        period_months: new.period_months,
        enduser_name: patch_text(None, Some(new.enduser_name.clone())),
        partner_name: patch_text(None, Some(new.partner_name.clone())),
        tech_stack: patch_text(None, Some(new.tech_stack.clone())),
        google_drive_url: patch_text(None, Some(new.google_drive_url.clone())),
        documents: patch_text(None, Some(new.documents.clone())),
        created_at: now,
        updated_at: now,
    };
    check_dates(&project)?;

    sqlx::query(
        r#"
        INSERT INTO projects (
            id, name, description, status, deal_size, blended_rate, total_hours,
            start_date, end_date, period_months, enduser_name, partner_name,
            tech_stack, google_drive_url, documents, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&project.id)
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.status.as_str())
    .bind(project.deal_size)
    .bind(project.blended_rate)
    .bind(project.total_hours)
    .bind(project.start_date)
    .bind(project.end_date)
    .bind(project.period_months)
    .bind(&project.enduser_name)
    .bind(&project.partner_name)
    .bind(&project.tech_stack)
    .bind(&project.google_drive_url)
    .bind(&project.documents)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(pool)
    .await
    .map_err(|e| Error::from_write(e, "project"))?;

    info!(
        project_id = %project.id,
        deal_size = project.deal_size,
        blended_rate = project.blended_rate,
        total_hours = project.total_hours,
        "Created project"
    );
    Ok(project)
}

/// Partial update; total hours are re-derived on every call
///
/// Assignment hours are not touched here, see
/// [`crate::allocation::update_project_with_recalculation`].
pub async fn update_project(
    pool: &SqlitePool,
    id: &str,
    update: &ProjectUpdate,
) -> Result<ProjectUpdateOutcome> {
    let existing = require_project(pool, id).await?;
    let mut project = existing.clone();

    if let Some(name) = &update.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Name cannot be empty".to_string()));
        }
        project.name = name.to_string();
    }
    if let Some(status) = update.status {
        project.status = status;
    }
    if let Some(deal_size) = update.deal_size {
        check_deal_size(deal_size)?;
        project.deal_size = deal_size;
    }
    if let Some(rate) = update.blended_rate {
        project.blended_rate = rate;
    }
    project.total_hours = calculate_total_hours(project.deal_size, project.blended_rate)?;

    project.description = patch_text(project.description, update.description.clone());
    project.start_date = patch_value(project.start_date, update.start_date);
    project.end_date = patch_value(project.end_date, update.end_date);
    project.period_months = patch_value(project.period_months, update.period_months);
    project.enduser_name = patch_text(project.enduser_name, update.enduser_name.clone());
    project.partner_name = patch_text(project.partner_name, update.partner_name.clone());
    project.tech_stack = patch_text(project.tech_stack, update.tech_stack.clone());
    project.google_drive_url = patch_text(project.google_drive_url, update.google_drive_url.clone());
    project.documents = patch_text(project.documents, update.documents.clone());
    check_period(project.period_months)?;
    check_dates(&project)?;
    project.updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE projects SET
            name = ?, description = ?, status = ?, deal_size = ?, blended_rate = ?,
            total_hours = ?, start_date = ?, end_date = ?, period_months = ?,
            enduser_name = ?, partner_name = ?, tech_stack = ?, google_drive_url = ?,
            documents = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.status.as_str())
    .bind(project.deal_size)
    .bind(project.blended_rate)
    .bind(project.total_hours)
    .bind(project.start_date)
    .bind(project.end_date)
    .bind(project.period_months)
    .bind(&project.enduser_name)
    .bind(&project.partner_name)
    .bind(&project.tech_stack)
    .bind(&project.google_drive_url)
    .bind(&project.documents)
    .bind(project.updated_at)
    .bind(&project.id)
    .execute(pool)
    .await
    .map_err(|e| Error::from_write(e, "project"))?;

    let pricing_changed =
        existing.deal_size != project.deal_size || existing.blended_rate != project.blended_rate;

    Ok(ProjectUpdateOutcome {
        project,
        pricing_changed,
    })
}

/// Persist a freshly derived total
pub async fn set_total_hours(pool: &SqlitePool, id: &str, total_hours: f64) -> Result<()> {
    sqlx::query("UPDATE projects SET total_hours = ?, updated_at = ? WHERE id = ?")
        .bind(total_hours)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a project and (by cascade) its assignments
pub async fn delete_project(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| Error::from_delete(e, "project"))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Project not found: {}", id)));
    }
    info!(project_id = %id, "Deleted project");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ProjectStatus;
    use crate::db::test_support::test_pool;
    use chrono::NaiveDate;

    fn website() -> NewProject {
        NewProject {
            name: "Corporate Website Redesign".to_string(),
            deal_size: 75_000.0,
            blended_rate: 125.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_derives_total_hours() {
        let (_dir, pool) = test_pool().await;
        let project = insert_project(&pool, &website()).await.unwrap();

        assert_eq!(project.total_hours, 600.0);
        assert_eq!(project.status, ProjectStatus::Active);

        let stored = require_project(&pool, &project.id).await.unwrap();
        assert_eq!(stored.total_hours, 600.0);
    }

    #[tokio::test]
    async fn test_insert_rejects_bad_pricing() {
        let (_dir, pool) = test_pool().await;

        let mut zero_rate = website();
        zero_rate.blended_rate = 0.0;
        assert!(matches!(insert_project(&pool, &zero_rate).await, Err(Error::InvalidInput(_))));

        let mut zero_deal = website();
        zero_deal.deal_size = 0.0;
        assert!(matches!(insert_project(&pool, &zero_deal).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_update_reports_pricing_change() {
        let (_dir, pool) = test_pool().await;
        let project = insert_project(&pool, &website()).await.unwrap();

        let rename = ProjectUpdate {
            name: Some("Website v2".to_string()),
            ..Default::default()
        };
        let outcome = update_project(&pool, &project.id, &rename).await.unwrap();
        assert!(!outcome.pricing_changed);
        assert_eq!(outcome.project.total_hours, 600.0);

        let resize = ProjectUpdate {
            deal_size: Some(150_000.0),
            ..Default::default()
        };
        let outcome = update_project(&pool, &project.id, &resize).await.unwrap();
        assert!(outcome.pricing_changed);
        assert_eq!(outcome.project.total_hours, 1200.0);
        assert_eq!(outcome.project.name, "Website v2");
    }

    #[tokio::test]
    async fn test_end_before_start_rejected() {
        let (_dir, pool) = test_pool().await;
        let mut new = website();
        new.start_date = NaiveDate::from_ymd_opt(2024, 6, 30);
        new.end_date = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert!(matches!(insert_project(&pool, &new).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_dates_round_trip_and_clear() {
        let (_dir, pool) = test_pool().await;
        let mut new = website();
        new.start_date = NaiveDate::from_ymd_opt(2024, 1, 15);
        new.end_date = NaiveDate::from_ymd_opt(2024, 6, 30);
        let project = insert_project(&pool, &new).await.unwrap();

        let stored = require_project(&pool, &project.id).await.unwrap();
        assert_eq!(stored.start_date, NaiveDate::from_ymd_opt(2024, 1, 15));

        let clear: ProjectUpdate = serde_json::from_str(r#"{"end_date": null}"#).unwrap();
        let outcome = update_project(&pool, &project.id, &clear).await.unwrap();
        assert_eq!(outcome.project.end_date, None);
        assert_eq!(outcome.project.start_date, NaiveDate::from_ymd_opt(2024, 1, 15));
    }
}
