use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables. Idempotent — safe to run on every start.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Pending-file dedup queue. The primary key enforces the
    // at-most-once-while-pending invariant.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pending_files (
            project_id TEXT NOT NULL,
            path_digest TEXT NOT NULL,
            file_path TEXT NOT NULL,
            enqueued_at INTEGER NOT NULL,
            PRIMARY KEY (project_id, path_digest)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Per-project change state, one row per project, full-replace writes.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS change_state (
            project_id TEXT PRIMARY KEY,
            last_commit_hash TEXT NOT NULL,
            last_content_digest TEXT NOT NULL,
            last_update_ms INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pending_files_project ON pending_files(project_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
