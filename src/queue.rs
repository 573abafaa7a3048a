//! Per-project dedup queue of files awaiting indexing.
//!
//! Membership is keyed by a SHA-256 digest of the file path, not the raw
//! path; the `(project_id, path_digest)` primary key enforces at most one
//! pending item per path. A second enqueue while the first is still pending
//! is a no-op and reports `false`.
//!
//! Dequeue order is deliberately NOT FIFO. The contract is "remove any
//! pending item"; selection iterates by path digest, which is deterministic
//! but unrelated to insertion order. Callers must not rely on ordering.

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

fn path_digest(path: &str) -> String {
    format!("{:x}", Sha256::digest(path.as_bytes()))
}

/// Add a path to the project's pending set.
///
/// Returns `true` iff a new pending item was created; `false` when an item
/// for the same path is already pending.
pub async fn enqueue(pool: &SqlitePool, project_id: &str, path: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO pending_files (project_id, path_digest, file_path, enqueued_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(project_id)
    .bind(path_digest(path))
    .bind(path)
    .bind(chrono::Utc::now().timestamp_millis())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove and return one pending path, or `None` when the queue is empty.
///
/// Removal is unconditional — the item is gone regardless of whether the
/// caller then indexes the file successfully.
pub async fn dequeue(pool: &SqlitePool, project_id: &str) -> Result<Option<String>> {
    let row: Option<(String, String)> = sqlx::query_as(
        r#"
        SELECT path_digest, file_path FROM pending_files
        WHERE project_id = ?
        ORDER BY path_digest
        LIMIT 1
        "#,
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?;

    let Some((digest, path)) = row else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM pending_files WHERE project_id = ? AND path_digest = ?")
        .bind(project_id)
        .bind(&digest)
        .execute(pool)
        .await?;

    Ok(Some(path))
}

pub async fn size(pool: &SqlitePool, project_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_files WHERE project_id = ?")
        .bind(project_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn is_pending(pool: &SqlitePool, project_id: &str, path: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pending_files WHERE project_id = ? AND path_digest = ?",
    )
    .bind(project_id)
    .bind(path_digest(path))
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}
