//! Core data types used throughout Code Context.

use serde::Serialize;

/// Persisted per-project change state.
///
/// The commit hash and content digest are always written together in a
/// single full-replace upsert; a partially updated row never exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeState {
    pub last_commit_hash: String,
    pub last_content_digest: String,
    pub last_update_ms: i64,
}

/// Result of one change-detection pass over a project's working tree.
#[derive(Debug, Clone)]
pub struct ChangeReport {
    pub changed: bool,
    /// Paths relative to the project root, in git-status enumeration order.
    /// Deleted paths are included; downstream treats them as removals.
    pub changed_files: Vec<String>,
    pub commit_hash: String,
    pub content_digest: String,
}

impl ChangeReport {
    /// The fail-soft report: working tree could not be inspected, so the
    /// project is simply skipped this cycle.
    pub fn unchanged() -> Self {
        Self {
            changed: false,
            changed_files: Vec::new(),
            commit_hash: String::new(),
            content_digest: String::new(),
        }
    }
}

/// A document returned by vector search: one indexed file.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedDocument {
    pub file_path: String,
    pub content: String,
    pub score: f32,
}

/// Outcome of one retrieval-state-machine invocation.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    /// Graded-relevant documents, best set found.
    pub documents: Vec<RetrievedDocument>,
    /// Every query issued, in order, including ones that underperformed.
    pub queries: Vec<String>,
    /// True when the sufficiency rule was met; false when the iteration
    /// cap was exhausted and this is the best-so-far set.
    pub sufficient: bool,
}

/// Summary counters for one indexing pass over a project.
#[derive(Debug, Clone, Default)]
pub struct PassSummary {
    pub enqueued: u64,
    pub indexed: u64,
    pub removed: u64,
    pub failed: u64,
}
