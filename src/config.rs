use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    /// Directory whose git-repository subdirectories are treated as projects.
    pub projects_root: PathBuf,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Pause between projects within one scheduler pass.
    #[serde(default = "default_project_pause_ms")]
    pub project_pause_ms: u64,
    /// Extra exclude globs applied on top of the built-in ignore rules.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_interval_secs() -> u64 {
    600
}
fn default_project_pause_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            dims: default_dims(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            embed_model: default_embed_model(),
            chat_model: default_chat_model(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_embed_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_chat_model() -> String {
    "llama3.1:latest".to_string()
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Documents fetched per vector search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Graded-relevant documents required to stop the loop.
    #[serde(default = "default_min_relevant")]
    pub min_relevant: usize,
    /// Hard cap on retrieve→grade cycles.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_relevant: default_min_relevant(),
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_min_relevant() -> usize {
    3
}
fn default_max_iterations() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.retrieval.min_relevant == 0 {
        anyhow::bail!("retrieval.min_relevant must be >= 1");
    }
    if config.retrieval.max_iterations == 0 {
        anyhow::bail!("retrieval.max_iterations must be >= 1");
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.qdrant.dims == 0 {
        anyhow::bail!("qdrant.dims must be > 0");
    }
    if config.indexing.interval_secs == 0 {
        anyhow::bail!("indexing.interval_secs must be > 0");
    }

    Ok(config)
}
