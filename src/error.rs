//! Typed error kinds for the query pipeline.
//!
//! The pipeline distinguishes failures that abort a request
//! ([`PipelineError::TranslationFailed`], [`PipelineError::ExecutionFailed`])
//! from failures that degrade gracefully (embedding outages become empty
//! search results, enrichment errors become reasoning-trail entries).
//! Everything outside the pipeline proper uses `anyhow::Result`.

use thiserror::Error;

/// Errors raised by the retrieval pipeline and its capability providers.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// An external capability call (embedding, completion, enrichment)
    /// failed at the transport or quota level.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// No usable SQL query could be produced for the question.
    #[error("query translation failed: {0}")]
    TranslationFailed(String),

    /// The database engine rejected the generated SQL.
    #[error("query execution failed: {0}")]
    ExecutionFailed(String),

    /// A vector with the wrong dimensionality was handed to the index.
    /// This is a precondition violation; the index is left unchanged.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Persisted index artifacts are missing, unreadable, or mutually
    /// inconsistent. Callers degrade to an empty index.
    #[error("index persistence corrupt: {0}")]
    PersistenceCorrupt(String),
}
