//! Model-backed retrieval capabilities.
//!
//! [`RetrievalModel`] is the seam the state machine depends on: an initial
//! query suggestion, a query rewrite, and a binary relevance grade. The
//! production implementation talks to Ollama's `/api/generate` endpoint;
//! tests substitute their own implementations.
//!
//! Every method returns `Result`; the caller maps failures to the
//! least-favorable outcome for that decision point (grade → not relevant,
//! rewrite → keep the previous query, initial query → use the raw question).

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use crate::config::OllamaConfig;
use crate::prompts;

#[async_trait]
pub trait RetrievalModel: Send + Sync {
    /// Seed query for the first retrieval pass.
    async fn initial_query(&self, question: &str, file_paths: &[String]) -> Result<String>;

    /// A fresh query, given everything already tried.
    async fn rewrite_query(
        &self,
        question: &str,
        file_paths: &[String],
        previous_queries: &[String],
    ) -> Result<String>;

    /// `true` iff the document is relevant to the question.
    async fn grade_document(&self, question: &str, content: &str) -> Result<bool>;
}

/// Completion model backed by Ollama.
pub struct OllamaModel {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaModel {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
        })
    }

    /// One non-streaming completion. `json_mode` constrains the model to
    /// emit a single JSON object.
    async fn generate(&self, prompt: &str, json_mode: bool) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": 0 }
        });
        if json_mode {
            body["format"] = json!("json");
        }

        let resp = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            bail!("Ollama generate error {}: {}", status, body_text);
        }

        let json: serde_json::Value = resp.json().await?;
        let response = json
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing 'response'"))?;

        Ok(response.trim().to_string())
    }
}

#[async_trait]
impl RetrievalModel for OllamaModel {
    async fn initial_query(&self, question: &str, file_paths: &[String]) -> Result<String> {
        let prompt = prompts::initial_query(question, &file_paths.join(","));
        let raw = self.generate(&prompt, true).await?;
        let parsed: serde_json::Value = serde_json::from_str(&raw)?;

        let paths = parsed
            .get("filePaths")
            .and_then(|p| p.as_array())
            .ok_or_else(|| anyhow::anyhow!("Initial-query response missing 'filePaths'"))?;

        let query = paths
            .iter()
            .filter_map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        if query.is_empty() {
            bail!("Initial-query response contained no file paths");
        }

        Ok(query)
    }

    async fn rewrite_query(
        &self,
        question: &str,
        file_paths: &[String],
        previous_queries: &[String],
    ) -> Result<String> {
        let prompt = prompts::rewrite_query(
            question,
            &file_paths.join(","),
            &previous_queries.join("\n"),
        );
        let query = self.generate(&prompt, false).await?;

        if query.is_empty() {
            bail!("Rewrite response was empty");
        }

        Ok(query)
    }

    async fn grade_document(&self, question: &str, content: &str) -> Result<bool> {
        let prompt = prompts::grade_document(question, content);
        let raw = self.generate(&prompt, true).await?;
        let parsed: serde_json::Value = serde_json::from_str(&raw)?;

        let score = parsed
            .get("score")
            .and_then(|s| s.as_str())
            .ok_or_else(|| anyhow::anyhow!("Grader response missing 'score'"))?;

        Ok(score.eq_ignore_ascii_case("yes"))
    }
}
