//! Core data types shared across the retrieval pipeline.
//!
//! These types represent the indexed schema descriptions, search results,
//! stage outcomes, and the final response that flows out of the orchestrator.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A row returned by the query executor: column name → JSON value.
pub type JsonRow = serde_json::Map<String, serde_json::Value>;

/// Interpretive metadata attached to one indexed schema description.
///
/// Closed tagged variant rather than an open mapping, so consumers cannot
/// depend on undeclared keys. The tag serializes as `"type"` with values
/// `table`, `column`, and `relationship`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocMeta {
    Table {
        table_name: String,
    },
    Column {
        table_name: String,
        column_name: String,
        column_type: String,
    },
    Relationship {
        table_name: String,
        from_columns: Vec<String>,
        referred_table: String,
        referred_columns: Vec<String>,
    },
}

impl DocMeta {
    /// The table this schema element belongs to.
    pub fn table_name(&self) -> &str {
        match self {
            DocMeta::Table { table_name } => table_name,
            DocMeta::Column { table_name, .. } => table_name,
            DocMeta::Relationship { table_name, .. } => table_name,
        }
    }
}

/// One indexed text unit plus its metadata. Never mutated after insertion;
/// its position in the record sequence is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub text: String,
    pub meta: DocMeta,
}

/// One nearest-neighbor search result. Smaller distance = more similar.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub record: DocumentRecord,
    pub distance: f32,
}

/// O(1) summary of the vector index, used for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_documents: usize,
    pub dimensions: usize,
    pub metadata_count: usize,
}

/// One step in a stage's reasoning trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningEntry {
    pub agent: String,
    pub step: String,
    pub details: serde_json::Value,
    pub timestamp: String,
}

/// Append-only reasoning trail for one stage instance.
#[derive(Debug, Clone)]
pub struct ReasoningLog {
    agent: String,
    entries: Vec<ReasoningEntry>,
}

impl ReasoningLog {
    pub fn new(agent: &str) -> Self {
        Self {
            agent: agent.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, step: &str, details: serde_json::Value) {
        self.entries.push(ReasoningEntry {
            agent: self.agent.clone(),
            step: step.to_string(),
            details,
            timestamp: Utc::now().to_rfc3339(),
        });
    }

    pub fn entries(&self) -> &[ReasoningEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ReasoningEntry> {
        self.entries
    }
}

/// Rows and column names produced by executing one SQL query.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<JsonRow>,
}

/// Result of a successful Retrieval stage.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub sql: String,
    pub rows: Vec<JsonRow>,
    pub row_count: usize,
    pub relevant_tables: Vec<String>,
    pub reasoning: Vec<ReasoningEntry>,
}

/// Result of a failed Retrieval stage. Carries whatever reasoning trail
/// existed when the stage aborted.
#[derive(Debug, Clone)]
pub struct RetrievalFailure {
    pub error: String,
    pub sql: Option<String>,
    pub reasoning: Vec<ReasoningEntry>,
}

/// Result of the Analysis stage. Always produced: when the summarization
/// call fails, `degraded` is set and the fields hold the deterministic
/// row-count fallback.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub answer: String,
    pub summary: String,
    pub insights: Vec<String>,
    pub degraded: bool,
    pub reasoning: Vec<ReasoningEntry>,
}

/// Result of the Enrichment stage. `skipped` is true when no enrichment
/// keyword matched and no provider was consulted.
#[derive(Debug, Clone)]
pub struct EnrichmentOutcome {
    pub enriched_data: JsonRow,
    pub skipped: bool,
    pub reasoning: Vec<ReasoningEntry>,
}

/// Per-stage status labels reported in the final response.
#[derive(Debug, Clone, Serialize)]
pub struct AgentFlow {
    pub retrieval: String,
    pub analysis: String,
    pub enrichment: String,
}

/// The final response assembled by the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub insights: Vec<String>,
    pub data: Vec<JsonRow>,
    pub row_count: usize,
    pub relevant_tables: Vec<String>,
    pub enriched_data: JsonRow,
    pub execution_time_ms: f64,
    pub agent_flow: AgentFlow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
