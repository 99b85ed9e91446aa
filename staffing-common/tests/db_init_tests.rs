//! Tests for database initialization on first run and on restart

use staffing_common::db::{init_database, insert_role, list_roles, seed_demo_data, NewRole};
use staffing_common::Error;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("staffing.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_reopen_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("staffing.db");

    let pool = init_database(&db_path).await.unwrap();
    insert_role(
        &pool,
        &NewRole {
            role_name: "Developer".to_string(),
            default_allocation_percentage: 100.0,
        },
    )
    .await
    .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let roles = list_roles(&pool).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].role_name, "Developer");
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("staffing.db")).await.unwrap();

    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();

    for expected in ["assignments", "projects", "roles", "schema_version", "staff"] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_seed_skipped_when_roles_exist() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("staffing.db")).await.unwrap();
    insert_role(
        &pool,
        &NewRole {
            role_name: "Custom".to_string(),
            default_allocation_percentage: 100.0,
        },
    )
    .await
    .unwrap();

    assert!(!seed_demo_data(&pool).await.unwrap());
    assert_eq!(list_roles(&pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_role_is_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("staffing.db")).await.unwrap();
    let role = NewRole {
        role_name: "Developer".to_string(),
        default_allocation_percentage: 50.0,
    };

    insert_role(&pool, &role).await.unwrap();
    assert!(matches!(insert_role(&pool, &role).await, Err(Error::Conflict(_))));
}
