//! Indexing worker.
//!
//! One pass per project: decide what needs indexing (full scan on the first
//! run, change detection afterwards), push paths through the dedup queue,
//! then drain the queue file by file into the vector index. Per-file
//! failures are logged and skipped; queue and change-state store failures
//! abort the pass and bubble up to the scheduler.

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::IndexingConfig;
use crate::detect;
use crate::index::ProjectIndex;
use crate::models::PassSummary;
use crate::queue;
use crate::scan;

pub async fn process_project(
    pool: &SqlitePool,
    index: &dyn ProjectIndex,
    indexing: &IndexingConfig,
    project_id: &str,
    project_path: &Path,
) -> Result<PassSummary> {
    let mut summary = PassSummary::default();

    // First run = no persisted change state. Enumerate everything; later
    // passes only follow the detector.
    let first_run = detect::load_state(pool, project_id).await?.is_none();

    if first_run {
        let files = scan::list_files(project_path, &indexing.exclude_globs)?;
        for file in &files {
            if queue::enqueue(pool, project_id, file).await? {
                summary.enqueued += 1;
            }
        }
        // Persist the baseline so the next pass is incremental. The files
        // the detector reports here are already covered by the full scan.
        detect::detect_changes(pool, project_id, project_path).await?;
    } else {
        let report = detect::detect_changes(pool, project_id, project_path).await?;
        if report.changed {
            for file in &report.changed_files {
                if queue::enqueue(pool, project_id, file).await? {
                    summary.enqueued += 1;
                }
            }
        }
    }

    // Drain. Dequeue removes the item unconditionally; a failure indexing
    // one file never blocks the rest.
    while let Some(file) = queue::dequeue(pool, project_id).await? {
        let full_path = project_path.join(&file);
        let content = std::fs::read_to_string(&full_path).unwrap_or_default();

        if content.is_empty() {
            // Deleted (or unreadable, or empty) — a removal signal, not an error.
            match index.remove_file(project_id, &file).await {
                Ok(()) => {
                    debug!(project = project_id, file = %file, "removed from index");
                    summary.removed += 1;
                }
                Err(e) => {
                    warn!(project = project_id, file = %file, error = %e, "failed to remove from index");
                    summary.failed += 1;
                }
            }
            continue;
        }

        match index.upsert_file(project_id, &file, &content).await {
            Ok(()) => {
                debug!(project = project_id, file = %file, "indexed");
                summary.indexed += 1;
            }
            Err(e) => {
                warn!(project = project_id, file = %file, error = %e, "failed to index file");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::process::Command;
    use std::sync::Mutex;

    /// In-memory stand-in for the vector index: delete-then-insert keyed
    /// by (project, path), same contract as the Qdrant adapter.
    #[derive(Default)]
    struct MemoryIndex {
        docs: Mutex<HashMap<(String, String), String>>,
        fail_paths: Vec<String>,
    }

    impl MemoryIndex {
        fn doc_count(&self, project: &str) -> usize {
            self.docs
                .lock()
                .unwrap()
                .keys()
                .filter(|(p, _)| p == project)
                .count()
        }

        fn has(&self, project: &str, path: &str) -> bool {
            self.docs
                .lock()
                .unwrap()
                .contains_key(&(project.to_string(), path.to_string()))
        }
    }

    #[async_trait]
    impl ProjectIndex for MemoryIndex {
        async fn upsert_file(
            &self,
            project_id: &str,
            file_path: &str,
            content: &str,
        ) -> Result<()> {
            if self.fail_paths.iter().any(|p| p == file_path) {
                return Err(anyhow!("simulated index failure"));
            }
            let mut docs = self.docs.lock().unwrap();
            let key = (project_id.to_string(), file_path.to_string());
            docs.remove(&key);
            docs.insert(key, content.to_string());
            Ok(())
        }

        async fn remove_file(&self, project_id: &str, file_path: &str) -> Result<()> {
            let mut docs = self.docs.lock().unwrap();
            docs.remove(&(project_id.to_string(), file_path.to_string()));
            Ok(())
        }
    }

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

    async fn test_pool() -> SqlitePool {
        let pool = db::connect_memory().await.unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        pool
    }

    fn indexing_config(root: &Path) -> IndexingConfig {
        IndexingConfig {
            projects_root: root.to_path_buf(),
            interval_secs: 600,
            project_pause_ms: 0,
            exclude_globs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn first_run_full_scan_then_quiet_incremental() {
        // Project holds b.py (committed) and a.py (new, untracked).
        let tmp = tempfile::tempdir().unwrap();
        let proj = tmp.path().join("demo");
        std::fs::create_dir_all(&proj).unwrap();
        init_repo(&proj);
        std::fs::write(proj.join("b.py"), "def b(): pass").unwrap();
        git(&proj, &["add", "-A"]);
        git(&proj, &["commit", "-q", "-m", "initial"]);
        std::fs::write(proj.join("a.py"), "def a(): pass").unwrap();

        let pool = test_pool().await;
        let index = MemoryIndex::default();
        let cfg = indexing_config(tmp.path());

        // First run: full scan enqueues both files.
        let first = process_project(&pool, &index, &cfg, "demo", &proj)
            .await
            .unwrap();
        assert_eq!(first.enqueued, 2);
        assert_eq!(first.indexed, 2);
        assert!(index.has("demo", "a.py"));
        assert!(index.has("demo", "b.py"));
        assert_eq!(queue::size(&pool, "demo").await.unwrap(), 0);

        // No further edits: the incremental pass enqueues nothing.
        let second = process_project(&pool, &index, &cfg, "demo", &proj)
            .await
            .unwrap();
        assert_eq!(second.enqueued, 0);
        assert_eq!(second.indexed, 0);
        assert_eq!(index.doc_count("demo"), 2);
    }

    #[tokio::test]
    async fn reindexing_unchanged_content_keeps_one_document() {
        let tmp = tempfile::tempdir().unwrap();
        let proj = tmp.path().join("demo");
        std::fs::create_dir_all(&proj).unwrap();
        init_repo(&proj);
        std::fs::write(proj.join("lib.rs"), "pub fn f() {}").unwrap();
        git(&proj, &["add", "-A"]);
        git(&proj, &["commit", "-q", "-m", "initial"]);

        let pool = test_pool().await;
        let index = MemoryIndex::default();
        let cfg = indexing_config(tmp.path());

        process_project(&pool, &index, &cfg, "demo", &proj)
            .await
            .unwrap();

        // Force the same path through the queue again with identical content.
        queue::enqueue(&pool, "demo", "lib.rs").await.unwrap();
        process_project(&pool, &index, &cfg, "demo", &proj)
            .await
            .unwrap();

        assert_eq!(index.doc_count("demo"), 1);
    }

    #[tokio::test]
    async fn deleted_file_is_removed_from_index() {
        let tmp = tempfile::tempdir().unwrap();
        let proj = tmp.path().join("demo");
        std::fs::create_dir_all(&proj).unwrap();
        init_repo(&proj);
        std::fs::write(proj.join("old.rs"), "pub fn old() {}").unwrap();
        git(&proj, &["add", "-A"]);
        git(&proj, &["commit", "-q", "-m", "initial"]);

        let pool = test_pool().await;
        let index = MemoryIndex::default();
        let cfg = indexing_config(tmp.path());

        process_project(&pool, &index, &cfg, "demo", &proj)
            .await
            .unwrap();
        assert!(index.has("demo", "old.rs"));

        std::fs::remove_file(proj.join("old.rs")).unwrap();
        let pass = process_project(&pool, &index, &cfg, "demo", &proj)
            .await
            .unwrap();

        assert_eq!(pass.removed, 1);
        assert!(!index.has("demo", "old.rs"));
    }

    #[tokio::test]
    async fn per_file_failure_does_not_abort_the_drain() {
        let tmp = tempfile::tempdir().unwrap();
        let proj = tmp.path().join("demo");
        std::fs::create_dir_all(&proj).unwrap();
        init_repo(&proj);
        std::fs::write(proj.join("bad.rs"), "x").unwrap();
        std::fs::write(proj.join("good.rs"), "y").unwrap();
        git(&proj, &["add", "-A"]);
        git(&proj, &["commit", "-q", "-m", "initial"]);

        let pool = test_pool().await;
        let index = MemoryIndex {
            fail_paths: vec!["bad.rs".to_string()],
            ..Default::default()
        };
        let cfg = indexing_config(tmp.path());

        let pass = process_project(&pool, &index, &cfg, "demo", &proj)
            .await
            .unwrap();

        assert_eq!(pass.failed, 1);
        assert!(index.has("demo", "good.rs"));
        // Failed item was still consumed from the queue.
        assert_eq!(queue::size(&pool, "demo").await.unwrap(), 0);
    }
}
