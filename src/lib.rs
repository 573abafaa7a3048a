//! # Code Context
//!
//! Keeps a vector-searchable index of source-code working trees synchronized
//! with their on-disk state, and answers natural-language questions about a
//! project by iteratively retrieving, grading, and re-querying that index.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌───────────┐   ┌──────────┐
//! │ Scheduler │──▶│  Detector   │──▶│ Dedup Queue│──▶│  Worker   │
//! │ (interval)│   │ (git+digest)│   │  (sqlite)  │   │ (drain)   │
//! └───────────┘   └────────────┘   └───────────┘   └────┬─────┘
//!                                                       │ embed+upsert
//!                                                       ▼
//!                 ┌────────────┐   search          ┌──────────┐
//!                 │ Retrieval   │◀─────────────────│  Qdrant   │
//!                 │ FSM         │                  │ (1 coll./ │
//!                 │ (ret/grade/ │                  │  project) │
//!                 │  rewrite)   │                  └──────────┘
//!                 └────┬───────┘
//!                      ▼
//!                 CLI + HTTP (axum)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`detect`] | Working-tree change detection |
//! | [`queue`] | Per-project dedup queue of pending files |
//! | [`scan`] | Full-scan file enumeration with ignore rules |
//! | [`worker`] | Indexing worker (queue drain → vector index) |
//! | [`scheduler`] | Periodic single-flight trigger |
//! | [`qdrant`] | Thin Qdrant REST client |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Grading / query-rewriting model capabilities |
//! | [`retrieval`] | Adaptive retrieve→grade→rewrite state machine |
//! | [`index`] | Vector-index capability boundary |
//! | [`server`] | HTTP query entry point |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod detect;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod prompts;
pub mod qdrant;
pub mod queue;
pub mod retrieval;
pub mod scan;
pub mod scheduler;
pub mod server;
pub mod worker;
