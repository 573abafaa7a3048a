//! Embedding provider abstraction.
//!
//! The indexing worker and the search path both go through [`Embedder`];
//! the production implementation calls Ollama's `/api/embeddings` endpoint
//! with retry and exponential backoff for transient failures.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use crate::config::OllamaConfig;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text into a vector. Order and dimensionality are the
    /// provider's concern; callers only pass vectors through to the index.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedding provider backed by Ollama.
pub struct OllamaEmbedder {
    http: reqwest::Client,
    base_url: String,
    model: String,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.embed_model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({ "model": self.model, "prompt": text });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(format!("{}/api/embeddings", self.base_url))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_embedding(&json);
                    }

                    // Server overloaded — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("Ollama error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Ollama embeddings error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }
}

fn parse_embedding(json: &serde_json::Value) -> Result<Vec<f32>> {
    let values = json
        .get("embedding")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embedding"))?;

    if values.is_empty() {
        bail!("Invalid Ollama response: empty embedding");
    }

    Ok(values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_embedding_array() {
        let json = serde_json::json!({ "embedding": [0.25, -1.5, 3.0] });
        let vec = parse_embedding(&json).unwrap();
        assert_eq!(vec, vec![0.25f32, -1.5, 3.0]);
    }

    #[test]
    fn rejects_missing_or_empty_embedding() {
        assert!(parse_embedding(&serde_json::json!({})).is_err());
        assert!(parse_embedding(&serde_json::json!({ "embedding": [] })).is_err());
    }
}
