//! Periodic indexing trigger.
//!
//! Fires immediately on start and then on a fixed interval. Each firing
//! walks the configured projects root, processing every git-repository
//! subdirectory strictly sequentially with a short pause in between — the
//! pipeline deliberately never runs projects in parallel, to bound load on
//! the embedding service and the vector store.
//!
//! A firing that overlaps a still-running pass is dropped entirely
//! (single-flight, process-wide), not queued or delayed.

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::IndexingConfig;
use crate::index::ProjectIndex;
use crate::queue;
use crate::worker;

pub struct Scheduler {
    pool: SqlitePool,
    index: Arc<dyn ProjectIndex>,
    indexing: IndexingConfig,
    busy: AtomicBool,
}

impl Scheduler {
    pub fn new(pool: SqlitePool, index: Arc<dyn ProjectIndex>, indexing: IndexingConfig) -> Self {
        Self {
            pool,
            index,
            indexing,
            busy: AtomicBool::new(false),
        }
    }

    /// Run forever: one pass now, then one per interval tick.
    pub async fn run(&self) -> Result<()> {
        let mut interval = tokio::time::interval(Duration::from_secs(self.indexing.interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.run_once().await;
        }
    }

    /// One scheduling pass. Returns `false` when a previous pass was still
    /// in progress and this firing was dropped.
    pub async fn run_once(&self) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("previous indexing pass still running, skipping this firing");
            return false;
        }

        let projects = match discover_projects(&self.indexing.projects_root) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "could not enumerate projects root");
                self.busy.store(false, Ordering::SeqCst);
                return true;
            }
        };

        info!(count = projects.len(), "starting indexing pass");

        for (project_id, project_path) in &projects {
            match worker::process_project(
                &self.pool,
                self.index.as_ref(),
                &self.indexing,
                project_id,
                project_path,
            )
            .await
            {
                Ok(summary) => {
                    info!(
                        project = %project_id,
                        enqueued = summary.enqueued,
                        indexed = summary.indexed,
                        removed = summary.removed,
                        failed = summary.failed,
                        "project pass complete"
                    );
                }
                Err(e) => {
                    // One project failing never stops the others.
                    error!(project = %project_id, error = %e, "project pass failed");
                }
            }

            tokio::time::sleep(Duration::from_millis(self.indexing.project_pause_ms)).await;
        }

        for (project_id, _) in &projects {
            match queue::size(&self.pool, project_id).await {
                Ok(size) => info!(project = %project_id, pending = size, "queue status"),
                Err(e) => warn!(project = %project_id, error = %e, "queue status unavailable"),
            }
        }

        self.busy.store(false, Ordering::SeqCst);
        true
    }

    #[cfg(test)]
    fn mark_busy(&self) {
        self.busy.store(true, Ordering::SeqCst);
    }
}

/// Candidate projects: direct subdirectories of the root that carry a
/// `.git` marker. Everything else is silently excluded.
pub fn discover_projects(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut projects = Vec::new();

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() || !path.join(".git").exists() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        projects.push((name.to_string(), path.clone()));
    }

    projects.sort();
    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, detect, migrate};
    use async_trait::async_trait;
    use std::process::Command;

    struct NullIndex;

    #[async_trait]
    impl ProjectIndex for NullIndex {
        async fn upsert_file(&self, _: &str, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
        async fn remove_file(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn init_repo(dir: &Path) {
        for args in [
            vec!["init", "-q"],
            vec!["config", "user.email", "test@example.com"],
            vec!["config", "user.name", "test"],
        ] {
            let status = Command::new("git")
                .args(&args)
                .current_dir(dir)
                .status()
                .unwrap();
            assert!(status.success());
        }
    }

    #[test]
    fn discovery_keeps_only_git_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        init_repo(&repo);
        std::fs::create_dir_all(tmp.path().join("plain-dir")).unwrap();
        std::fs::write(tmp.path().join("file.txt"), "x").unwrap();

        let projects = discover_projects(tmp.path()).unwrap();
        let names: Vec<&str> = projects.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["repo"]);
    }

    #[tokio::test]
    async fn overlapping_firing_is_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        init_repo(&repo);
        std::fs::write(repo.join("main.rs"), "fn main() {}").unwrap();

        let pool = db::connect_memory().await.unwrap();
        migrate::apply_schema(&pool).await.unwrap();

        let scheduler = Scheduler::new(
            pool.clone(),
            Arc::new(NullIndex),
            IndexingConfig {
                projects_root: tmp.path().to_path_buf(),
                interval_secs: 600,
                project_pause_ms: 0,
                exclude_globs: Vec::new(),
            },
        );

        // Pretend a pass is in flight: the firing is dropped and nothing
        // touches the store.
        scheduler.mark_busy();
        assert!(!scheduler.run_once().await);
        assert!(detect::load_state(&pool, "repo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn a_pass_processes_every_project() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["alpha", "beta"] {
            let repo = tmp.path().join(name);
            std::fs::create_dir_all(&repo).unwrap();
            init_repo(&repo);
            std::fs::write(repo.join("main.rs"), "fn main() {}").unwrap();
        }

        let pool = db::connect_memory().await.unwrap();
        migrate::apply_schema(&pool).await.unwrap();

        let scheduler = Scheduler::new(
            pool.clone(),
            Arc::new(NullIndex),
            IndexingConfig {
                projects_root: tmp.path().to_path_buf(),
                interval_secs: 600,
                project_pause_ms: 0,
                exclude_globs: Vec::new(),
            },
        );

        assert!(scheduler.run_once().await);
        assert!(detect::load_state(&pool, "alpha").await.unwrap().is_some());
        assert!(detect::load_state(&pool, "beta").await.unwrap().is_some());
    }
}
