//! # finquery
//!
//! **Schema-aware natural-language querying for financial SQLite databases.**
//!
//! finquery indexes natural-language descriptions of a database schema in a
//! persistent vector index, translates user questions into SQLite queries
//! against the retrieved schema, executes them, summarizes the results, and
//! optionally enriches them with live market and regulatory-filing data.
//! Every request leaves a full reasoning trail in an audit table.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌───────────┐   ┌────────────┐
//! │ Question  │──▶│ Retrieval  │──▶│ Analysis  │──▶│ Enrichment │
//! │           │   │ index+SQL  │   │ summarize │   │ Yahoo/EDGAR│
//! └───────────┘   └─────┬──────┘   └───────────┘   └─────┬──────┘
//!                       │                                │
//!                       ▼                                ▼
//!                 ┌──────────┐                    ┌────────────┐
//!                 │  SQLite  │                    │  Response  │
//!                 │ + audit  │                    │ + reasoning│
//!                 └──────────┘                    └────────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. `finq index-schema` introspects the database and indexes one
//!    description per table, column, and foreign key ([`schema_index`]).
//! 2. A question retrieves the nearest schema descriptions from the
//!    [`index`], and the [`translate`] module turns them into one SQLite
//!    query.
//! 3. The [`executor`] runs the query and decodes rows dynamically.
//! 4. The [`pipeline::analysis`] stage summarizes the rows; failures
//!    degrade to a deterministic row-count answer.
//! 5. The [`pipeline::enrichment`] stage attaches market quotes or SEC
//!    filings when the question asks for them ([`enrich`]).
//! 6. The [`pipeline::orchestrator`] assembles the response and writes one
//!    [`audit`] record per request.
//!
//! ## Quick Start
//!
//! ```bash
//! finq init                          # create database and tables
//! finq index-schema                  # index schema descriptions
//! finq ask "top companies by revenue"
//! finq serve                         # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Typed pipeline error kinds |
//! | [`models`] | Core data types: documents, outcomes, responses |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`embedding`] | Embedding provider trait, OpenAI/Ollama implementations |
//! | [`completion`] | Chat-completion provider trait, OpenAI implementation |
//! | [`index`] | Persistent brute-force vector index |
//! | [`schema_index`] | Schema introspection and description indexing |
//! | [`translate`] | Natural-language to SQL translation |
//! | [`executor`] | SQL execution with dynamic JSON row decoding |
//! | [`enrich`] | Yahoo Finance and SEC EDGAR providers |
//! | [`pipeline`] | Retrieval, analysis, and enrichment stages plus orchestrator |
//! | [`audit`] | Query audit trail over `query_logs` |
//! | [`stats`] | Database and index statistics |
//! | [`server`] | JSON HTTP API (Axum) with CORS |
//!
//! ## Configuration
//!
//! finquery is configured via a TOML file (default: `config/finquery.toml`).
//! See [`config`] for all available options and [`config::load_config`] for
//! validation rules.

pub mod audit;
pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod enrich;
pub mod error;
pub mod executor;
pub mod index;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod schema_index;
pub mod server;
pub mod stats;
pub mod translate;

pub use error::PipelineError;
pub use models::{DocMeta, DocumentRecord, QueryResponse, SearchHit};
pub use pipeline::Orchestrator;
