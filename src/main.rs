//! # Code Context CLI (`codectx`)
//!
//! Commands for initializing the local store, running the indexing worker,
//! querying a project, and starting the HTTP query server.
//!
//! ```bash
//! codectx init                          # create the local store
//! codectx projects                      # list discovered projects
//! codectx index demo                    # one indexing pass for one project
//! codectx watch                         # run the periodic indexing worker
//! codectx query "how is auth handled" --project demo
//! codectx serve                         # start the HTTP query server
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use code_context::config::{self, Config};
use code_context::embedding::OllamaEmbedder;
use code_context::index::QdrantIndex;
use code_context::llm::OllamaModel;
use code_context::qdrant::QdrantClient;
use code_context::{db, migrate, retrieval, scan, scheduler, server, worker};

/// Code Context — keeps a vector-searchable index of source trees in sync
/// and answers questions about them.
#[derive(Parser)]
#[command(
    name = "codectx",
    about = "Keeps a vector-searchable index of source trees in sync and answers questions about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./codectx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local store (queue + change state). Idempotent.
    Init,

    /// List candidate projects under the configured projects root.
    Projects,

    /// Run one indexing pass for a single project.
    Index {
        /// Project name (directory under the projects root).
        project: String,
    },

    /// Run the periodic indexing worker until terminated.
    Watch,

    /// Ask a question against a project's index.
    Query {
        /// The question, in natural language.
        question: String,

        /// Project name (directory under the projects root).
        #[arg(long)]
        project: String,
    },

    /// Start the HTTP query server.
    Serve,
}

fn build_index(config: &Config) -> Result<Arc<QdrantIndex>> {
    let qdrant = QdrantClient::new(&config.qdrant.url, config.qdrant.timeout_secs)?;
    let embedder = Arc::new(OllamaEmbedder::new(&config.ollama)?);
    Ok(Arc::new(QdrantIndex::new(
        qdrant,
        embedder,
        config.qdrant.dims,
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Store initialized successfully.");
        }

        Commands::Projects => {
            let projects = scheduler::discover_projects(&cfg.indexing.projects_root)?;
            if projects.is_empty() {
                println!(
                    "No git projects found under {}",
                    cfg.indexing.projects_root.display()
                );
            }
            for (name, path) in projects {
                println!("{}  {}", name, path.display());
            }
        }

        Commands::Index { project } => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;

            let project_path = cfg.indexing.projects_root.join(&project);
            let index = build_index(&cfg)?;

            let summary =
                worker::process_project(&pool, index.as_ref(), &cfg.indexing, &project, &project_path)
                    .await?;

            println!("index {}", project);
            println!("  enqueued: {}", summary.enqueued);
            println!("  indexed:  {}", summary.indexed);
            println!("  removed:  {}", summary.removed);
            println!("  failed:   {}", summary.failed);
            println!("ok");

            pool.close().await;
        }

        Commands::Watch => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;

            let index = build_index(&cfg)?;
            let scheduler = scheduler::Scheduler::new(pool, index, cfg.indexing.clone());
            scheduler.run().await?;
        }

        Commands::Query { question, project } => {
            let index = build_index(&cfg)?;
            let model = OllamaModel::new(&cfg.ollama)?;

            let project_path = cfg.indexing.projects_root.join(&project);
            let file_paths = scan::list_files(&project_path, &cfg.indexing.exclude_globs)?;

            let outcome = retrieval::run(
                index.as_ref(),
                &model,
                &cfg.retrieval,
                &project,
                &question,
                file_paths,
            )
            .await?;

            if !outcome.sufficient {
                println!("(iteration cap reached — best-effort results)");
            }
            println!("queries tried: {}", outcome.queries.join(" | "));
            println!("documents: {}", outcome.documents.len());
            for doc in outcome.documents {
                println!("--- {} (score {:.3})", doc.file_path, doc.score);
                println!("{}", doc.content);
            }
        }

        Commands::Serve => {
            let index = build_index(&cfg)?;
            let model = Arc::new(OllamaModel::new(&cfg.ollama)?);
            server::run_server(&cfg, index, model).await?;
        }
    }

    Ok(())
}
