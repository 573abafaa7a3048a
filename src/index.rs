//! Vector-index capability boundary.
//!
//! Two trait seams: [`ProjectIndex`] for the write path (the indexing
//! worker) and [`DocumentSearch`] for the read path (the retrieval state
//! machine). [`QdrantIndex`] implements both over one Qdrant collection per
//! project.
//!
//! Re-indexing a path is delete-then-insert, not a native upsert: Qdrant
//! keys points by opaque id, so the only way to keep at most one document
//! per `(project, filePath)` is to delete by payload match first.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::models::RetrievedDocument;
use crate::qdrant::QdrantClient;

#[async_trait]
pub trait ProjectIndex: Send + Sync {
    /// Replace the indexed document for `(project, file_path)`.
    async fn upsert_file(&self, project_id: &str, file_path: &str, content: &str) -> Result<()>;

    /// Remove the indexed document for `(project, file_path)`, if any.
    async fn remove_file(&self, project_id: &str, file_path: &str) -> Result<()>;
}

#[async_trait]
pub trait DocumentSearch: Send + Sync {
    /// Nearest-neighbor search over a project's indexed documents.
    async fn search(
        &self,
        project_id: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedDocument>>;
}

/// Deterministic collection name for a project's indexed documents.
pub fn collection_name(project_id: &str) -> String {
    format!("code-{}", project_id)
}

pub struct QdrantIndex {
    client: QdrantClient,
    embedder: Arc<dyn Embedder>,
    dims: usize,
    /// Collections already verified to exist, to skip redundant checks.
    ready: Mutex<HashSet<String>>,
}

impl QdrantIndex {
    pub fn new(client: QdrantClient, embedder: Arc<dyn Embedder>, dims: usize) -> Self {
        Self {
            client,
            embedder,
            dims,
            ready: Mutex::new(HashSet::new()),
        }
    }

    async fn ensure(&self, project_id: &str) -> Result<String> {
        let name = collection_name(project_id);

        let known = {
            let ready = self.ready.lock().expect("collection cache poisoned");
            ready.contains(&name)
        };

        if !known {
            self.client.ensure_collection(&name, self.dims).await?;
            let mut ready = self.ready.lock().expect("collection cache poisoned");
            ready.insert(name.clone());
        }

        Ok(name)
    }
}

#[async_trait]
impl ProjectIndex for QdrantIndex {
    async fn upsert_file(&self, project_id: &str, file_path: &str, content: &str) -> Result<()> {
        let collection = self.ensure(project_id).await?;

        let text = format!("### File: {}\n{}", file_path, content);
        let vector = self.embedder.embed(&text).await?;

        // Drop any prior document for this exact path before inserting.
        self.client
            .delete_by_field_match(&collection, "filePath", file_path)
            .await?;

        self.client
            .upsert_point(
                &collection,
                &Uuid::new_v4().to_string(),
                &vector,
                json!({
                    "filePath": file_path,
                    "content": content,
                    "projectId": project_id,
                }),
            )
            .await?;

        Ok(())
    }

    async fn remove_file(&self, project_id: &str, file_path: &str) -> Result<()> {
        let collection = self.ensure(project_id).await?;
        self.client
            .delete_by_field_match(&collection, "filePath", file_path)
            .await
    }
}

#[async_trait]
impl DocumentSearch for QdrantIndex {
    async fn search(
        &self,
        project_id: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        let collection = self.ensure(project_id).await?;
        let vector = self.embedder.embed(query).await?;

        let points = self.client.search(&collection, &vector, k).await?;

        Ok(points
            .into_iter()
            .map(|p| RetrievedDocument {
                file_path: p
                    .payload
                    .get("filePath")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                content: p
                    .payload
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                score: p.score,
            })
            .collect())
    }
}
