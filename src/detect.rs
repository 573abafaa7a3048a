//! Working-tree change detection.
//!
//! Decides whether a project changed since the last pass by comparing two
//! signals against the persisted [`ChangeState`]: the HEAD commit hash and a
//! combined digest over the bytes of every file git reports as touched. The
//! digest catches edits that never made it into a commit.
//!
//! Inspection failures (not a repository, no commits yet, git missing) are
//! fail-soft: the detector reports "unchanged" and the project is skipped
//! for this cycle.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::path::Path;
use std::process::Command;
use tracing::warn;

use crate::models::{ChangeReport, ChangeState};

pub async fn detect_changes(
    pool: &SqlitePool,
    project_id: &str,
    project_path: &Path,
) -> Result<ChangeReport> {
    let (changed_files, commit_hash) = match inspect_working_tree(project_path) {
        Ok(v) => v,
        Err(e) => {
            warn!(project = project_id, error = %e, "working tree not inspectable, skipping");
            return Ok(ChangeReport::unchanged());
        }
    };

    let content_digest = digest_changed_files(project_path, &changed_files);

    let last = load_state(pool, project_id).await?;
    let changed = match &last {
        Some(state) => {
            state.last_commit_hash != commit_hash || state.last_content_digest != content_digest
        }
        None => true,
    };

    if changed {
        save_state(
            pool,
            project_id,
            &ChangeState {
                last_commit_hash: commit_hash.clone(),
                last_content_digest: content_digest.clone(),
                last_update_ms: chrono::Utc::now().timestamp_millis(),
            },
        )
        .await?;
    }

    Ok(ChangeReport {
        changed,
        changed_files,
        commit_hash,
        content_digest,
    })
}

/// List touched paths and the HEAD commit hash via the git CLI.
///
/// Touched = modified, added, untracked, rename targets, and deleted —
/// everything `git status --porcelain` reports relative to HEAD.
fn inspect_working_tree(project_path: &Path) -> Result<(Vec<String>, String)> {
    let commit_hash = git_head_sha(project_path)?;

    let output = Command::new("git")
        .args(["status", "--porcelain"])
        .current_dir(project_path)
        .output()
        .with_context(|| "Failed to execute 'git status'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git status failed: {}", stderr.trim());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut files = Vec::new();
    for line in stdout.lines() {
        if line.len() < 4 {
            continue;
        }
        let path_part = &line[3..];
        // Renames are reported as "old -> new"; the new path is the one
        // that exists in the tree.
        let path = match path_part.split_once(" -> ") {
            Some((_, new)) => new,
            None => path_part,
        };
        let path = path.trim().trim_matches('"').to_string();
        if !path.is_empty() && !files.contains(&path) {
            files.push(path);
        }
    }

    Ok((files, commit_hash))
}

fn git_head_sha(project_path: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(project_path)
        .output()
        .with_context(|| "Failed to execute 'git rev-parse'")?;

    if !output.status.success() {
        // No commits yet, or not a repository.
        bail!("git rev-parse HEAD failed");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Hex SHA-256 over the concatenated per-file hex SHA-256s, in the order
/// the changed paths were enumerated. A deleted or unreadable file hashes
/// as empty bytes so it still contributes to the digest.
fn digest_changed_files(project_path: &Path, changed_files: &[String]) -> String {
    let mut combined = Sha256::new();
    for file in changed_files {
        let bytes = std::fs::read(project_path.join(file)).unwrap_or_default();
        let file_digest = format!("{:x}", Sha256::digest(&bytes));
        combined.update(file_digest.as_bytes());
    }
    format!("{:x}", combined.finalize())
}

pub async fn load_state(pool: &SqlitePool, project_id: &str) -> Result<Option<ChangeState>> {
    let row: Option<(String, String, i64)> = sqlx::query_as(
        "SELECT last_commit_hash, last_content_digest, last_update_ms FROM change_state WHERE project_id = ?",
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(hash, digest, ms)| ChangeState {
        last_commit_hash: hash,
        last_content_digest: digest,
        last_update_ms: ms,
    }))
}

/// Full-replace write: hash and digest land together or not at all.
pub async fn save_state(pool: &SqlitePool, project_id: &str, state: &ChangeState) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO change_state (project_id, last_commit_hash, last_content_digest, last_update_ms)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(project_id) DO UPDATE SET
            last_commit_hash = excluded.last_commit_hash,
            last_content_digest = excluded.last_content_digest,
            last_update_ms = excluded.last_update_ms
        "#,
    )
    .bind(project_id)
    .bind(&state.last_commit_hash)
    .bind(&state.last_content_digest)
    .bind(state.last_update_ms)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    fn init_repo(dir: &Path) {
        git(dir, &["init", "-q"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        git(dir, &["config", "user.name", "test"]);
    }

    fn commit_all(dir: &Path, msg: &str) {
        git(dir, &["add", "-A"]);
        git(dir, &["commit", "-q", "-m", msg]);
    }

    async fn test_pool() -> SqlitePool {
        let pool = db::connect_memory().await.unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn non_repository_is_fail_soft() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = test_pool().await;

        let report = detect_changes(&pool, "demo", tmp.path()).await.unwrap();
        assert!(!report.changed);
        assert!(report.changed_files.is_empty());
        // Fail-soft passes never persist state.
        assert!(load_state(&pool, "demo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_pass_persists_state_second_pass_is_quiet() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("main.rs"), "fn main() {}").unwrap();
        commit_all(tmp.path(), "initial");

        let pool = test_pool().await;

        let first = detect_changes(&pool, "demo", tmp.path()).await.unwrap();
        assert!(first.changed);
        let state = load_state(&pool, "demo").await.unwrap().unwrap();
        assert_eq!(state.last_commit_hash, first.commit_hash);
        assert_eq!(state.last_content_digest, first.content_digest);

        let second = detect_changes(&pool, "demo", tmp.path()).await.unwrap();
        assert!(!second.changed);
        assert!(second.changed_files.is_empty());
    }

    #[tokio::test]
    async fn uncommitted_edit_changes_digest_but_not_commit() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("lib.rs"), "pub fn a() {}").unwrap();
        commit_all(tmp.path(), "initial");

        let pool = test_pool().await;
        let baseline = detect_changes(&pool, "demo", tmp.path()).await.unwrap();

        // Edit without committing: commit hash stays put, digest drifts.
        std::fs::write(tmp.path().join("lib.rs"), "pub fn a() { todo!() }").unwrap();
        let report = detect_changes(&pool, "demo", tmp.path()).await.unwrap();

        assert!(report.changed);
        assert_eq!(report.commit_hash, baseline.commit_hash);
        assert_ne!(report.content_digest, baseline.content_digest);
        assert_eq!(report.changed_files, vec!["lib.rs".to_string()]);
    }

    #[tokio::test]
    async fn deleted_file_still_appears_in_changed_set() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("gone.rs"), "x").unwrap();
        commit_all(tmp.path(), "initial");

        let pool = test_pool().await;
        detect_changes(&pool, "demo", tmp.path()).await.unwrap();

        std::fs::remove_file(tmp.path().join("gone.rs")).unwrap();
        let report = detect_changes(&pool, "demo", tmp.path()).await.unwrap();

        assert!(report.changed);
        assert!(report.changed_files.contains(&"gone.rs".to_string()));
    }

    #[tokio::test]
    async fn untracked_file_is_detected() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("a.rs"), "a").unwrap();
        commit_all(tmp.path(), "initial");

        let pool = test_pool().await;
        detect_changes(&pool, "demo", tmp.path()).await.unwrap();

        std::fs::write(tmp.path().join("new.rs"), "new").unwrap();
        let report = detect_changes(&pool, "demo", tmp.path()).await.unwrap();

        assert!(report.changed);
        assert_eq!(report.changed_files, vec!["new.rs".to_string()]);
    }
}
