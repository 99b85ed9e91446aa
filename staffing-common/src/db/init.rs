//! Database initialization
//!
//! Opens (creating if needed) the SQLite database and creates the schema.
//! Every statement is idempotent, so this is safe to run on each startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Current schema version, recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 2;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Per-connection pragma; must be set on every pooled connection
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    create_schema_version_table(&pool).await?;
    create_roles_table(&pool).await?;
    create_staff_table(&pool).await?;
    create_projects_table(&pool).await?;
    create_assignments_table(&pool).await?;
    add_manual_allocation_column(&pool).await?;
    record_schema_version(&pool).await?;

    Ok(pool)
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn record_schema_version(pool: &SqlitePool) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the roles table
pub async fn create_roles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS roles (
            id TEXT PRIMARY KEY,
            role_name TEXT NOT NULL UNIQUE,
            default_allocation_percentage REAL NOT NULL
                CHECK (default_allocation_percentage >= 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the staff table
///
/// Profile list fields (skills, education, experience, certifications) hold JSON text.
pub async fn create_staff_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staff (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            title TEXT,
            role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE RESTRICT,
            hourly_cost REAL NOT NULL,
            hours_quota REAL NOT NULL DEFAULT 40,
            email TEXT,
            phone TEXT,
            bio TEXT,
            executive_summary TEXT,
            skills TEXT,
            education TEXT,
            experience TEXT,
            certifications TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_staff_role ON staff(role_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the projects table
pub async fn create_projects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL DEFAULT 'ACTIVE'
                CHECK (status IN ('ACTIVE', 'POTENTIAL', 'COMPLETED')),
            deal_size REAL NOT NULL,
            blended_rate REAL NOT NULL,
            total_hours REAL NOT NULL,
            start_date TEXT,
            end_date TEXT,
            period_months INTEGER,
            enduser_name TEXT,
            partner_name TEXT,
            tech_stack TEXT,
            google_drive_url TEXT,
            documents TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the assignments table
///
/// One row per (project, staff, role) triple.
pub async fn create_assignments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assignments (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            staff_id TEXT NOT NULL REFERENCES staff(id) ON DELETE CASCADE,
            role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE RESTRICT,
            allocated_hours REAL NOT NULL DEFAULT 0,
            logged_hours REAL NOT NULL DEFAULT 0,
            manual_allocation INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (project_id, staff_id, role_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_assignments_project ON assignments(project_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_assignments_staff ON assignments(staff_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Version 1 databases predate `assignments.manual_allocation`
async fn add_manual_allocation_column(pool: &SqlitePool) -> Result<()> {
    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('assignments') WHERE name = 'manual_allocation'",
    )
    .fetch_one(pool)
    .await?;
    if has_column > 0 {
        return Ok(());
    }

    // Another process may have added it between the check and the ALTER
    match sqlx::query(
        "ALTER TABLE assignments ADD COLUMN manual_allocation INTEGER NOT NULL DEFAULT 0",
    )
    .execute(pool)
    .await
    {
        Ok(_) => {
            info!("Added manual_allocation column to assignments");
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_foreign_keys_enabled_on_pooled_connections() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("fk.db")).await.unwrap();

        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_schema_version_recorded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version.db");

        let pool = init_database(&path).await.unwrap();
        pool.close().await;
        let pool = init_database(&path).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_version_one_database_gains_manual_allocation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new().connect(&url).await.unwrap();
        sqlx::query(
            r#"
            CREATE TABLE assignments (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                staff_id TEXT NOT NULL,
                role_id TEXT NOT NULL,
                allocated_hours REAL NOT NULL DEFAULT 0,
                logged_hours REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;

        let pool = init_database(&path).await.unwrap();
        let has_column: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('assignments') WHERE name = 'manual_allocation'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(has_column, 1);
    }
}
