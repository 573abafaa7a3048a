//! Adaptive retrieval state machine.
//!
//! Answers a question against a project's vector index by looping
//! retrieve → grade → rewrite until enough relevant context is found:
//!
//! ```text
//! Prepare ─▶ Retrieve ─▶ Grade ──(≥ min_relevant)──▶ Done
//!               ▲                 │
//!               └──── Rewrite ◀───┘ (not enough, cap not reached)
//! ```
//!
//! The machine is an explicit tagged enum plus a transition loop; the only
//! conditional edge is the sufficiency check after grading. Model-capability
//! failures never abort a run — each decision point degrades to its
//! least-favorable outcome (grade → not relevant, rewrite → keep the query,
//! prepare → use the raw question). Search failures do abort: the index
//! being unreachable is a server-side error, not a degraded grade.
//!
//! Termination is guaranteed by `max_iterations` (one iteration = one
//! retrieve→grade cycle); on exhaustion the machine returns the largest
//! graded-relevant set it saw.

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::index::DocumentSearch;
use crate::llm::RetrievalModel;
use crate::models::{RetrievalOutcome, RetrievedDocument};

/// States of the machine. `Grade` is the only state with a conditional
/// outgoing edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Prepare,
    Retrieve,
    Grade,
    Rewrite,
    Done,
}

/// Per-invocation session state. Never shared across questions; dropped
/// when the run returns.
struct Session {
    question: String,
    query: String,
    previous_queries: Vec<String>,
    file_paths: Vec<String>,
    /// Accumulated retrieved documents, deduplicated by file path.
    /// Append-only: grading never removes from here, it only selects.
    documents: Vec<RetrievedDocument>,
}

pub async fn run(
    search: &dyn DocumentSearch,
    model: &dyn RetrievalModel,
    config: &RetrievalConfig,
    project_id: &str,
    question: &str,
    file_paths: Vec<String>,
) -> Result<RetrievalOutcome> {
    let mut session = Session {
        question: question.to_string(),
        // The raw question doubles as the seed query until Prepare
        // improves on it.
        query: question.to_string(),
        previous_queries: Vec::new(),
        file_paths,
        documents: Vec::new(),
    };

    let mut step = Step::Prepare;
    let mut iterations = 0usize;
    let mut best: Vec<RetrievedDocument> = Vec::new();
    let mut sufficient = false;

    while step != Step::Done {
        step = match step {
            Step::Prepare => {
                match model
                    .initial_query(&session.question, &session.file_paths)
                    .await
                {
                    Ok(seed) => session.query = seed,
                    Err(e) => {
                        warn!(error = %e, "initial query suggestion failed, using raw question");
                    }
                }
                Step::Retrieve
            }

            Step::Retrieve => {
                let hits = search
                    .search(project_id, &session.query, config.top_k)
                    .await?;
                debug!(query = %session.query, hits = hits.len(), "retrieved");

                session.previous_queries.push(session.query.clone());
                for hit in hits {
                    if !session
                        .documents
                        .iter()
                        .any(|d| d.file_path == hit.file_path)
                    {
                        session.documents.push(hit);
                    }
                }
                Step::Grade
            }

            Step::Grade => {
                iterations += 1;

                // Re-grade the full accumulated set: a document dropped in
                // an earlier pass is never permanently excluded.
                let mut relevant = Vec::new();
                for doc in &session.documents {
                    let keep = match model
                        .grade_document(&session.question, &doc.content)
                        .await
                    {
                        Ok(keep) => keep,
                        Err(e) => {
                            warn!(file = %doc.file_path, error = %e, "grading failed, treating as not relevant");
                            false
                        }
                    };
                    if keep {
                        relevant.push(doc.clone());
                    }
                }
                debug!(
                    iteration = iterations,
                    relevant = relevant.len(),
                    accumulated = session.documents.len(),
                    "graded"
                );

                if relevant.len() > best.len() {
                    best = relevant.clone();
                }

                if relevant.len() >= config.min_relevant {
                    best = relevant;
                    sufficient = true;
                    Step::Done
                } else if iterations >= config.max_iterations {
                    warn!(
                        iterations,
                        "iteration cap reached, returning best-so-far set"
                    );
                    Step::Done
                } else {
                    Step::Rewrite
                }
            }

            Step::Rewrite => {
                match model
                    .rewrite_query(
                        &session.question,
                        &session.file_paths,
                        &session.previous_queries,
                    )
                    .await
                {
                    Ok(query) => session.query = query,
                    Err(e) => {
                        warn!(error = %e, "query rewrite failed, keeping previous query");
                    }
                }
                Step::Retrieve
            }

            Step::Done => Step::Done,
        };
    }

    Ok(RetrievalOutcome {
        documents: best,
        queries: session.previous_queries,
        sufficient,
    })
}
