//! Staff database operations

use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::info;

use super::assignments::list_assignment_details;
use super::models::{
    patch_text, AssignmentDetail, NewStaff, Role, Staff, StaffDetail, StaffUpdate,
};
use super::roles::{default_role, list_roles, require_role};
use crate::{uuid_utils, Error, Result};

const SELECT_STAFF: &str = r#"
    SELECT id, name, title, role_id, hourly_cost, hours_quota,
           email, phone, bio, executive_summary,
           skills, education, experience, certifications,
           created_at, updated_at
    FROM staff
"#;

/// All staff members ordered by name
pub async fn list_staff(pool: &SqlitePool) -> Result<Vec<Staff>> {
    let sql = format!("{} ORDER BY name ASC", SELECT_STAFF);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(Staff::from_row).collect()
}

pub async fn get_staff(pool: &SqlitePool, id: &str) -> Result<Option<Staff>> {
    let sql = format!("{} WHERE id = ?", SELECT_STAFF);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(Staff::from_row).transpose()
}

pub async fn require_staff(pool: &SqlitePool, id: &str) -> Result<Staff> {
    get_staff(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Staff member not found: {}", id)))
}

/// Staff member with role, assignments and hour totals
pub async fn get_staff_detail(pool: &SqlitePool, id: &str) -> Result<Option<StaffDetail>> {
    let Some(staff) = get_staff(pool, id).await? else {
        return Ok(None);
    };
    let role = require_role(pool, &staff.role_id).await?;
    let assignments = list_assignment_details(pool, None, Some(id)).await?;
    Ok(Some(StaffDetail::new(staff, role, assignments)))
}

/// Every staff member as a [`StaffDetail`], ordered by name
pub async fn list_staff_details(pool: &SqlitePool) -> Result<Vec<StaffDetail>> {
    let staff = list_staff(pool).await?;
    let roles: HashMap<String, Role> = list_roles(pool)
        .await?
        .into_iter()
        .map(|role| (role.id.clone(), role))
        .collect();

    let mut by_staff: HashMap<String, Vec<AssignmentDetail>> = HashMap::new();
    for detail in list_assignment_details(pool, None, None).await? {
        by_staff
            .entry(detail.assignment.staff_id.clone())
            .or_default()
            .push(detail);
    }

    let mut details = Vec::with_capacity(staff.len());
    for member in staff {
        // role_id is a foreign key, so a miss means the row vanished mid-read
        let role = roles
            .get(&member.role_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Role not found: {}", member.role_id)))?;
        let assignments = by_staff.remove(&member.id).unwrap_or_default();
        details.push(StaffDetail::new(member, role, assignments));
    }
    Ok(details)
}

fn check_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidInput(format!(
            "{} must be a non-negative number, got {}",
            field, value
        )));
    }
    Ok(())
}

pub async fn insert_staff(pool: &SqlitePool, new: &NewStaff) -> Result<Staff> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Name is required".to_string()));
    }
    check_non_negative("hourly_cost", new.hourly_cost)?;
    check_non_negative("hours_quota", new.hours_quota)?;

    let role_id = if new.role_id.trim().is_empty() {
        default_role(pool)
            .await?
            .ok_or_else(|| Error::InvalidInput("No roles defined; create a role first".to_string()))?
            .id
    } else {
        new.role_id.clone()
    };

    let now = Utc::now();
    let staff = Staff {
        id: uuid_utils::generate(),
        name: name.to_string(),
        title: patch_text(None, Some(new.title.clone())),
        role_id,
        hourly_cost: new.hourly_cost,
        hours_quota: new.hours_quota,
        email: patch_text(None, Some(new.email.clone())),
        phone: patch_text(None, Some(new.phone.clone())),
        bio: patch_text(None, Some(new.bio.clone())),
        executive_summary: patch_text(None, Some(new.executive_summary.clone())),
        skills: patch_text(None, Some(new.skills.clone())),
        education: patch_text(None, Some(new.education.clone())),
        experience: patch_text(None, Some(new.experience.clone())),
        certifications: patch_text(None, Some(new.certifications.clone())),
        created_at: now,
        updated_at: now,
    };

    write_staff(pool, &staff, true).await?;
    info!(staff_id = %staff.id, name = %staff.name, "Created staff member");
    Ok(staff)
}

/// Partial update: absent fields keep their value, null or blank text clears it
pub async fn update_staff(pool: &SqlitePool, id: &str, update: &StaffUpdate) -> Result<Staff> {
    let mut staff = require_staff(pool, id).await?;

    if let Some(name) = &update.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Name cannot be empty".to_string()));
        }
        staff.name = name.to_string();
    }
    if let Some(role_id) = &update.role_id {
        staff.role_id = role_id.clone();
    }
    if let Some(cost) = update.hourly_cost {
        check_non_negative("hourly_cost", cost)?;
        staff.hourly_cost = cost;
    }
    if let Some(quota) = update.hours_quota {
        check_non_negative("hours_quota", quota)?;
        staff.hours_quota = quota;
    }
    staff.title = patch_text(staff.title, update.title.clone());
    staff.email = patch_text(staff.email, update.email.clone());
    staff.phone = patch_text(staff.phone, update.phone.clone());
    staff.bio = patch_text(staff.bio, update.bio.clone());
    staff.executive_summary = patch_text(staff.executive_summary, update.executive_summary.clone());
    staff.skills = patch_text(staff.skills, update.skills.clone());
    staff.education = patch_text(staff.education, update.education.clone());
    staff.experience = patch_text(staff.experience, update.experience.clone());
    staff.certifications = patch_text(staff.certifications, update.certifications.clone());
    staff.updated_at = Utc::now();

    write_staff(pool, &staff, false).await?;
    Ok(staff)
}

async fn write_staff(pool: &SqlitePool, staff: &Staff, insert: bool) -> Result<()> {
    let query = if insert {
        sqlx::query(
            r#"
            INSERT INTO staff (
                name, title, role_id, hourly_cost, hours_quota,
                email, phone, bio, executive_summary,
                skills, education, experience, certifications,
                updated_at, created_at, id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
    } else {
        sqlx::query(
            r#"
            UPDATE staff SET
                name = ?, title = ?, role_id = ?, hourly_cost = ?, hours_quota = ?,
                email = ?, phone = ?, bio = ?, executive_summary = ?,
                skills = ?, education = ?, experience = ?, certifications = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
    };

    let query = query
        .bind(&staff.name)
        .bind(&staff.title)
        .bind(&staff.role_id)
        .bind(staff.hourly_cost)
        .bind(staff.hours_quota)
        .bind(&staff.email)
        .bind(&staff.phone)
        .bind(&staff.bio)
        .bind(&staff.executive_summary)
        .bind(&staff.skills)
        .bind(&staff.education)
        .bind(&staff.experience)
        .bind(&staff.certifications)
        .bind(staff.updated_at);
    let query = if insert {
        query.bind(staff.created_at).bind(&staff.id)
    } else {
        query.bind(&staff.id)
    };

    query
        .execute(pool)
        .await
        .map_err(|e| Error::from_write(e, "staff member"))?;

    Ok(())
}

/// Delete a staff member and (by cascade) their assignments
pub async fn delete_staff(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM staff WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| Error::from_delete(e, "staff member"))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Staff member not found: {}", id)));
    }
    info!(staff_id = %id, "Deleted staff member");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::roles::insert_role;
    use crate::db::models::NewRole;
    use crate::db::assignments::upsert_assignment;
    use crate::db::models::AssignmentUpsert;
    use crate::db::test_support::{test_pool, Fixture};

    async fn role(pool: &SqlitePool) -> String {
        insert_role(
            pool,
            &NewRole {
                role_name: "Developer".to_string(),
                default_allocation_percentage: 100.0,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn new_staff(name: &str, role_id: &str) -> NewStaff {
        NewStaff {
            name: name.to_string(),
            role_id: role_id.to_string(),
            hourly_cost: 120.0,
            hours_quota: 40.0,
            skills: Some(r#"["Rust","SQL"]"#.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_list_by_name() {
        let (_dir, pool) = test_pool().await;
        let role_id = role(&pool).await;
        insert_staff(&pool, &new_staff("Zoe", &role_id)).await.unwrap();
        insert_staff(&pool, &new_staff("Adam", &role_id)).await.unwrap();

        let names: Vec<String> = list_staff(&pool).await.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Adam", "Zoe"]);
    }

    #[tokio::test]
    async fn test_details_group_assignments_per_member() {
        let (_dir, pool) = test_pool().await;
        let f = Fixture::create(&pool).await;
        let other = insert_staff(&pool, &new_staff("Adam", &f.developer.id)).await.unwrap();
        upsert_assignment(
            &pool,
            &AssignmentUpsert {
                project_id: f.project.id.clone(),
                staff_id: f.staff.id.clone(),
                role_id: f.developer.id.clone(),
                allocated_hours: Some(30.0),
                logged_hours: Some(4.0),
            },
        )
        .await
        .unwrap();

        let details = list_staff_details(&pool).await.unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].staff.id, other.id);
        assert!(details[0].assignments.is_empty());
        assert_eq!(details[0].role.role_name, "Developer");
        assert_eq!(details[1].staff.id, f.staff.id);
        assert_eq!(details[1].assignments.len(), 1);
        assert_eq!(details[1].total_allocated_hours, 30.0);
        assert_eq!(details[1].total_logged_hours, 4.0);
    }

    #[tokio::test]
    async fn test_missing_role_uses_default() {
        let (_dir, pool) = test_pool().await;
        let role_id = role(&pool).await;

        let new: NewStaff = serde_json::from_str(r#"{"name": "Adam", "hourly_cost": 90}"#).unwrap();
        let staff = insert_staff(&pool, &new).await.unwrap();
        assert_eq!(staff.role_id, role_id);
        assert_eq!(staff.hours_quota, 40.0);
    }

    #[tokio::test]
    async fn test_no_roles_defined() {
        let (_dir, pool) = test_pool().await;
        let err = insert_staff(&pool, &new_staff("Adam", "")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unknown_role_rejected() {
        let (_dir, pool) = test_pool().await;
        let err = insert_staff(&pool, &new_staff("Adam", "no-such-role")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_and_clears() {
        let (_dir, pool) = test_pool().await;
        let role_id = role(&pool).await;
        let mut new = new_staff("Adam", &role_id);
        new.title = Some("Engineer".to_string());
        new.bio = Some("Writes code".to_string());
        let staff = insert_staff(&pool, &new).await.unwrap();

        let update: StaffUpdate =
            serde_json::from_str(r#"{"hourly_cost": 150, "bio": null}"#).unwrap();
        let updated = update_staff(&pool, &staff.id, &update).await.unwrap();

        assert_eq!(updated.hourly_cost, 150.0);
        assert_eq!(updated.title.as_deref(), Some("Engineer"));
        assert_eq!(updated.bio, None);
        assert_eq!(updated.skills.as_deref(), Some(r#"["Rust","SQL"]"#));

        let reloaded = require_staff(&pool, &staff.id).await.unwrap();
        assert_eq!(reloaded.hourly_cost, 150.0);
        assert_eq!(reloaded.bio, None);
        assert_eq!(reloaded.title.as_deref(), Some("Engineer"));
    }

    #[tokio::test]
    async fn test_delete_missing_staff() {
        let (_dir, pool) = test_pool().await;
        assert!(matches!(delete_staff(&pool, "nope").await, Err(Error::NotFound(_))));
    }
}
