//! Thin Qdrant REST client.
//!
//! Hand-rolled over reqwest; only the four capabilities the rest of the
//! crate needs: ensure-collection, upsert point, delete by payload match,
//! and nearest-neighbor search. No policy lives here.

use anyhow::{bail, Result};
use serde_json::json;
use std::time::Duration;

pub struct QdrantClient {
    http: reqwest::Client,
    base_url: String,
}

/// One search hit: similarity score plus the stored payload.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub score: f32,
    pub payload: serde_json::Value,
}

impl QdrantClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create the collection if it does not exist yet.
    pub async fn ensure_collection(&self, name: &str, dims: usize) -> Result<()> {
        let resp = self
            .http
            .get(format!("{}/collections/{}/exists", self.base_url, name))
            .send()
            .await?;

        if resp.status().is_success() {
            let body: serde_json::Value = resp.json().await?;
            let exists = body
                .pointer("/result/exists")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if exists {
                return Ok(());
            }
        }

        let resp = self
            .http
            .put(format!("{}/collections/{}", self.base_url, name))
            .json(&json!({
                "vectors": { "size": dims, "distance": "Cosine" }
            }))
            .send()
            .await?;

        let status = resp.status();
        // 409 = created concurrently, which is fine.
        if !status.is_success() && status.as_u16() != 409 {
            let body = resp.text().await.unwrap_or_default();
            bail!("Qdrant create collection '{}' failed ({}): {}", name, status, body);
        }

        Ok(())
    }

    pub async fn upsert_point(
        &self,
        collection: &str,
        id: &str,
        vector: &[f32],
        payload: serde_json::Value,
    ) -> Result<()> {
        let resp = self
            .http
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.base_url, collection
            ))
            .json(&json!({
                "points": [{ "id": id, "vector": vector, "payload": payload }]
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Qdrant upsert into '{}' failed ({}): {}", collection, status, body);
        }

        Ok(())
    }

    /// Delete every point whose payload field exactly matches `value`.
    pub async fn delete_by_field_match(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<()> {
        let resp = self
            .http
            .post(format!(
                "{}/collections/{}/points/delete?wait=true",
                self.base_url, collection
            ))
            .json(&json!({
                "filter": {
                    "must": [{ "key": field, "match": { "value": value } }]
                }
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Qdrant delete from '{}' failed ({}): {}", collection, status, body);
        }

        Ok(())
    }

    pub async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let resp = self
            .http
            .post(format!(
                "{}/collections/{}/points/search",
                self.base_url, collection
            ))
            .json(&json!({
                "vector": vector,
                "limit": limit,
                "with_payload": true
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Qdrant search in '{}' failed ({}): {}", collection, status, body);
        }

        let body: serde_json::Value = resp.json().await?;
        let hits = body
            .get("result")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();

        let mut points = Vec::with_capacity(hits.len());
        for hit in hits {
            let score = hit.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32;
            let payload = hit.get("payload").cloned().unwrap_or(json!({}));
            points.push(ScoredPoint { score, payload });
        }

        Ok(points)
    }
}
