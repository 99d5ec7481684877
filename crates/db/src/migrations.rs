use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Number of migrations recorded as applied. Errors when the bookkeeping
/// table does not exist yet, i.e. migrations never ran against this file.
pub async fn applied_count(pool: &DbPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT count(*) FROM _sqlx_migrations").fetch_one(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "users",
        "documents",
        "approval_processes",
        "approval_steps",
        "idx_documents_status",
        "idx_approval_processes_document_id",
        "idx_approval_processes_initiator_id",
        "idx_approval_processes_status",
        "idx_approval_steps_process_id",
        "idx_approval_steps_assignee_id",
        "idx_approval_steps_status",
    ];

    #[tokio::test]
    async fn migrations_create_all_managed_objects() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master
                 WHERE type IN ('table', 'index') AND name = ?",
            )
            .bind(object)
            .fetch_one(&pool)
            .await
            .expect("query sqlite_master")
            .get::<i64, _>("count");

            assert_eq!(count, 1, "schema object `{object}` missing after migrations");
        }
    }

    #[tokio::test]
    async fn applied_count_reflects_migration_state() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        assert!(super::applied_count(&pool).await.is_err());

        run_pending(&pool).await.expect("run migrations");
        assert!(super::applied_count(&pool).await.expect("count") > 0);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
    }
}
