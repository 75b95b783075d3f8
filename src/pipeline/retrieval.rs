//! Retrieval stage: schema search, SQL generation, execution.

use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::executor::QueryExecutor;
use crate::models::{ReasoningLog, RetrievalFailure, RetrievalOutcome};
use crate::schema_index::SchemaCatalog;
use crate::translate::QueryTranslator;

pub struct RetrievalStage {
    catalog: Arc<SchemaCatalog>,
    translator: QueryTranslator,
    executor: Arc<dyn QueryExecutor>,
    table_k: usize,
    column_k: usize,
}

impl RetrievalStage {
    pub fn new(
        catalog: Arc<SchemaCatalog>,
        translator: QueryTranslator,
        executor: Arc<dyn QueryExecutor>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            catalog,
            translator,
            executor,
            table_k: config.table_k,
            column_k: config.column_k,
        }
    }

    /// Run retrieval for one question.
    ///
    /// Every step is recorded in the reasoning trail, including the step
    /// that failed when the stage aborts.
    pub async fn run(&self, question: &str) -> Result<RetrievalOutcome, RetrievalFailure> {
        let mut log = ReasoningLog::new("retrieval");
        log.push("query_received", serde_json::json!({ "query": question }));

        let tables = self.catalog.relevant_tables(question, self.table_k).await;
        let columns = self.catalog.relevant_columns(question, self.column_k).await;
        log.push(
            "schema_retrieval",
            serde_json::json!({
                "relevant_tables": tables,
                "column_groups": columns.len(),
            }),
        );

        let translation = match self.translator.generate(question, &tables, &columns).await {
            Ok(t) => {
                log.push("sql_generated", serde_json::json!({ "sql": t.sql }));
                t
            }
            Err(e) => {
                log.push(
                    "sql_generation_failed",
                    serde_json::json!({ "error": e.to_string() }),
                );
                return Err(RetrievalFailure {
                    error: e.to_string(),
                    sql: None,
                    reasoning: log.into_entries(),
                });
            }
        };

        let result = match self.executor.execute(&translation.sql).await {
            Ok(r) => {
                log.push(
                    "query_executed",
                    serde_json::json!({ "row_count": r.rows.len() }),
                );
                r
            }
            Err(e) => {
                log.push(
                    "query_execution_failed",
                    serde_json::json!({ "error": e.to_string(), "sql": translation.sql }),
                );
                return Err(RetrievalFailure {
                    error: e.to_string(),
                    sql: Some(translation.sql),
                    reasoning: log.into_entries(),
                });
            }
        };

        let row_count = result.rows.len();
        Ok(RetrievalOutcome {
            sql: translation.sql,
            rows: result.rows,
            row_count,
            relevant_tables: translation.tables,
            reasoning: log.into_entries(),
        })
    }
}
