//! Role database operations

use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::info;

use super::models::{NewRole, Role, RoleUpdate};
use crate::allocation::validate_percentage_total;
use crate::{uuid_utils, Error, Result};

const SELECT_ROLE: &str = r#"
    SELECT id, role_name, default_allocation_percentage, created_at, updated_at
    FROM roles
"#;

/// All roles, highest default percentage first (ties broken by name)
pub async fn list_roles(pool: &SqlitePool) -> Result<Vec<Role>> {
    let sql = format!(
        "{} ORDER BY default_allocation_percentage DESC, role_name ASC",
        SELECT_ROLE
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(Role::from_row).collect()
}

pub async fn get_role(pool: &SqlitePool, id: &str) -> Result<Option<Role>> {
    let sql = format!("{} WHERE id = ?", SELECT_ROLE);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(Role::from_row).transpose()
}

/// Like [`get_role`] but a missing role is an error
pub async fn require_role(pool: &SqlitePool, id: &str) -> Result<Role> {
    get_role(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Role not found: {}", id)))
}

/// Role new staff members get when none is specified
pub async fn default_role(pool: &SqlitePool) -> Result<Option<Role>> {
    Ok(list_roles(pool).await?.into_iter().next())
}

fn check_percentage(value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidInput(format!(
            "Allocation percentage must be a non-negative number, got {}",
            value
        )));
    }
    Ok(())
}

fn check_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Role name is required".to_string()));
    }
    Ok(name.to_string())
}

pub async fn insert_role(pool: &SqlitePool, new: &NewRole) -> Result<Role> {
    let role_name = check_name(&new.role_name)?;
    check_percentage(new.default_allocation_percentage)?;

    let now = Utc::now();
    let role = Role {
        id: uuid_utils::generate(),
        role_name,
        default_allocation_percentage: new.default_allocation_percentage,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO roles (id, role_name, default_allocation_percentage, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&role.id)
    .bind(&role.role_name)
    .bind(role.default_allocation_percentage)
    .bind(role.created_at)
    .bind(role.updated_at)
    .execute(pool)
    .await
    .map_err(|e| Error::from_write(e, "role"))?;

    info!(role_id = %role.id, role_name = %role.role_name, "Created role");
    Ok(role)
}

/// Rename a role or change its percentage; the 100% total is not checked here
pub async fn update_role(pool: &SqlitePool, id: &str, update: &RoleUpdate) -> Result<Role> {
    let mut role = require_role(pool, id).await?;

    if let Some(name) = &update.role_name {
        role.role_name = check_name(name)?;
    }
    if let Some(percentage) = update.default_allocation_percentage {
        check_percentage(percentage)?;
        role.default_allocation_percentage = percentage;
    }
    role.updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE roles
        SET role_name = ?, default_allocation_percentage = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&role.role_name)
    .bind(role.default_allocation_percentage)
    .bind(role.updated_at)
    .bind(&role.id)
    .execute(pool)
    .await
    .map_err(|e| Error::from_write(e, "role"))?;

    Ok(role)
}

/// Batch update of role percentages
///
/// Each role may appear once and the submitted percentages must total
/// 100 (±0.01). All updates are applied
/// in one transaction; an unknown role id rolls the whole batch back.
pub async fn update_role_percentages(
    pool: &SqlitePool,
    updates: &[(String, f64)],
) -> Result<Vec<Role>> {
    if updates.is_empty() {
        return Err(Error::InvalidInput("Roles array is required".to_string()));
    }
    let mut seen = HashSet::with_capacity(updates.len());
    for (id, percentage) in updates {
        if !seen.insert(id.as_str()) {
            return Err(Error::InvalidInput(format!("Role listed more than once: {}", id)));
        }
        check_percentage(*percentage)?;
    }
    let percentages: Vec<f64> = updates.iter().map(|(_, p)| *p).collect();
    validate_percentage_total(&percentages)?;

    let now = Utc::now();
    let mut tx = pool.begin().await?;
    for (id, percentage) in updates {
        let result = sqlx::query(
            "UPDATE roles SET default_allocation_percentage = ?, updated_at = ? WHERE id = ?",
        )
        .bind(percentage)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(Error::NotFound(format!("Role not found: {}", id)));
        }
    }
    tx.commit().await?;

    info!(count = updates.len(), "Updated role allocation percentages");
    list_roles(pool).await
}

/// Delete a role; fails with `Conflict` while staff or assignments reference it
pub async fn delete_role(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| Error::from_delete(e, "role"))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Role not found: {}", id)));
    }
    info!(role_id = %id, "Deleted role");
    Ok(())
}
