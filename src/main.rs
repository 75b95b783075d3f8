//! # finquery CLI (`finq`)
//!
//! The `finq` binary is the primary interface for finquery. It provides
//! commands for database initialization, schema indexing, one-shot
//! questions, audit history, statistics, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! finq --config ./config/finquery.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `finq init` | Create the SQLite database and run schema migrations |
//! | `finq index-schema` | Introspect the database and index schema descriptions |
//! | `finq ask "<question>"` | Run one question through the pipeline |
//! | `finq history` | Show recent audit entries |
//! | `finq stats` | Show query-log, table, and index statistics |
//! | `finq serve` | Start the JSON HTTP server |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use finquery::audit::fetch_history;
use finquery::completion::{CompletionProvider, OpenAiCompletion};
use finquery::config::{load_config, Config};
use finquery::db::connect;
use finquery::embedding::create_provider;
use finquery::enrich::{EdgarFilingProvider, YahooQuoteProvider};
use finquery::executor::SqliteExecutor;
use finquery::index::VectorIndex;
use finquery::migrate::run_migrations;
use finquery::pipeline::analysis::AnalysisStage;
use finquery::pipeline::enrichment::EnrichmentStage;
use finquery::pipeline::retrieval::RetrievalStage;
use finquery::pipeline::Orchestrator;
use finquery::schema_index::SchemaCatalog;
use finquery::server::{run_server, AppState};
use finquery::stats::{collect_stats, print_stats};
use finquery::translate::QueryTranslator;

/// finquery CLI — schema-aware natural-language querying for financial
/// SQLite databases.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/finquery.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "finq",
    about = "finquery — schema-aware natural-language querying for financial databases",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/finquery.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Introspect the database and index schema descriptions.
    ///
    /// Generates one description per table, column, and foreign key and
    /// adds the new ones to the vector index. Requires an embedding
    /// provider to be configured.
    IndexSchema,

    /// Run one question through the query pipeline.
    Ask {
        /// The natural-language question.
        question: String,
    },

    /// Show recent audit entries, newest first.
    History {
        /// Maximum number of entries to show.
        #[arg(long, default_value_t = 20)]
        limit: i64,

        /// Number of entries to skip.
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Show query-log counters, table row counts, and index statistics.
    Stats,

    /// Start the JSON HTTP server.
    Serve,
}

/// Build the full pipeline wiring from configuration.
async fn build_state(cfg: &Config) -> Result<AppState> {
    let pool = connect(&cfg.db.path).await?;
    run_migrations(&pool).await?;

    let embedder = create_provider(&cfg.embedding)?;
    let dims = cfg.embedding.dims.unwrap_or(0);
    let index = Arc::new(VectorIndex::open(dims, &cfg.index.path, embedder)?);
    let catalog = Arc::new(SchemaCatalog::new(pool.clone(), index.clone()));

    let completion: Arc<dyn CompletionProvider> = Arc::new(OpenAiCompletion::new(&cfg.llm)?);
    let translator = QueryTranslator::new(completion.clone(), &cfg.llm);
    let executor = Arc::new(SqliteExecutor::new(pool.clone()));

    let retrieval = RetrievalStage::new(catalog.clone(), translator, executor, &cfg.retrieval);
    let analysis = AnalysisStage::new(completion, &cfg.llm);
    let enrichment = EnrichmentStage::new(
        Arc::new(YahooQuoteProvider::new(&cfg.enrichment)?),
        Arc::new(EdgarFilingProvider::new(&cfg.enrichment)?),
    );

    let orchestrator = Arc::new(Orchestrator::new(
        retrieval,
        analysis,
        enrichment,
        pool.clone(),
        &cfg.retrieval,
    ));

    Ok(AppState {
        pool,
        index,
        catalog,
        orchestrator,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = connect(&cfg.db.path).await?;
            run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::IndexSchema => {
            let pool = connect(&cfg.db.path).await?;
            run_migrations(&pool).await?;

            let embedder = create_provider(&cfg.embedding)?;
            let dims = cfg.embedding.dims.unwrap_or(0);
            let index = Arc::new(VectorIndex::open(dims, &cfg.index.path, embedder)?);
            let catalog = SchemaCatalog::new(pool, index.clone());

            let added = catalog.index_schema().await?;
            let stats = index.stats();
            println!(
                "Indexed {} new schema descriptions ({} total).",
                added, stats.total_documents
            );
        }
        Commands::Ask { question } => {
            let state = build_state(&cfg).await?;
            let response = state.orchestrator.process(&question).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::History { limit, offset } => {
            let pool = connect(&cfg.db.path).await?;
            run_migrations(&pool).await?;

            let entries = fetch_history(&pool, limit, offset).await?;
            if entries.is_empty() {
                println!("No queries recorded yet.");
            }
            for entry in entries {
                let status = if entry.success { "ok" } else { "failed" };
                println!(
                    "[{}] {} ({}) — {}",
                    entry.created_at, entry.user_query, status,
                    entry
                        .final_answer
                        .or(entry.error_message)
                        .unwrap_or_default()
                );
            }
        }
        Commands::Stats => {
            let pool = connect(&cfg.db.path).await?;
            run_migrations(&pool).await?;

            let embedder = create_provider(&cfg.embedding)?;
            let dims = cfg.embedding.dims.unwrap_or(0);
            let index = VectorIndex::open(dims, &cfg.index.path, embedder)?;

            let stats = collect_stats(&pool, &index).await?;
            print_stats(&stats);
        }
        Commands::Serve => {
            let state = build_state(&cfg).await?;
            run_server(&cfg, state).await?;
        }
    }

    Ok(())
}
