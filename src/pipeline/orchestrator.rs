//! Orchestrator: runs the stage sequence and assembles the response.
//!
//! Exactly one audit record is written per request, whether the pipeline
//! completes or aborts in retrieval. Audit-sink failures are reported on
//! stderr and never affect the response.

use sqlx::SqlitePool;
use std::time::Instant;

use crate::audit::{record_query, AuditRecord};
use crate::config::RetrievalConfig;
use crate::models::{
    AgentFlow, AnalysisOutcome, EnrichmentOutcome, QueryResponse, ReasoningEntry, RetrievalOutcome,
};
use crate::pipeline::analysis::AnalysisStage;
use crate::pipeline::enrichment::EnrichmentStage;
use crate::pipeline::retrieval::RetrievalStage;

pub struct Orchestrator {
    retrieval: RetrievalStage,
    analysis: AnalysisStage,
    enrichment: EnrichmentStage,
    pool: SqlitePool,
    sample_rows: usize,
}

impl Orchestrator {
    pub fn new(
        retrieval: RetrievalStage,
        analysis: AnalysisStage,
        enrichment: EnrichmentStage,
        pool: SqlitePool,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            retrieval,
            analysis,
            enrichment,
            pool,
            sample_rows: config.sample_rows,
        }
    }

    /// Process one question end to end.
    ///
    /// Retrieval failure aborts the request; analysis and enrichment never
    /// run in that case and leave no reasoning behind.
    pub async fn process(&self, question: &str) -> QueryResponse {
        let start = Instant::now();

        let retrieval = match self.retrieval.run(question).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                self.audit(&AuditRecord {
                    user_query: question.to_string(),
                    generated_sql: failure.sql.clone(),
                    sql_result: None,
                    final_answer: None,
                    context_used: None,
                    agent_reasoning: reasoning_json(&failure.reasoning),
                    execution_time_ms: elapsed_ms,
                    success: false,
                    error_message: Some(failure.error.clone()),
                })
                .await;

                return QueryResponse {
                    success: false,
                    query: question.to_string(),
                    sql: failure.sql,
                    answer: None,
                    summary: None,
                    insights: Vec::new(),
                    data: Vec::new(),
                    row_count: 0,
                    relevant_tables: Vec::new(),
                    enriched_data: Default::default(),
                    execution_time_ms: elapsed_ms,
                    agent_flow: AgentFlow {
                        retrieval: "failed".to_string(),
                        analysis: "not_run".to_string(),
                        enrichment: "not_run".to_string(),
                    },
                    error: Some(failure.error),
                };
            }
        };

        let analysis = self
            .analysis
            .run(question, &retrieval.sql, &retrieval.rows)
            .await;
        let enrichment = self.enrichment.run(question, &retrieval.rows).await;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.finish(question, retrieval, analysis, enrichment, elapsed_ms)
            .await
    }

    async fn finish(
        &self,
        question: &str,
        retrieval: RetrievalOutcome,
        analysis: AnalysisOutcome,
        enrichment: EnrichmentOutcome,
        elapsed_ms: f64,
    ) -> QueryResponse {
        let mut reasoning = retrieval.reasoning.clone();
        reasoning.extend(analysis.reasoning.iter().cloned());
        reasoning.extend(enrichment.reasoning.iter().cloned());

        let sample = &retrieval.rows[..retrieval.rows.len().min(self.sample_rows)];
        let sql_result = serde_json::to_string(sample).ok();

        self.audit(&AuditRecord {
            user_query: question.to_string(),
            generated_sql: Some(retrieval.sql.clone()),
            sql_result,
            final_answer: Some(analysis.answer.clone()),
            context_used: Some(retrieval.relevant_tables.join(", ")),
            agent_reasoning: reasoning_json(&reasoning),
            execution_time_ms: elapsed_ms,
            success: true,
            error_message: None,
        })
        .await;

        QueryResponse {
            success: true,
            query: question.to_string(),
            sql: Some(retrieval.sql),
            answer: Some(analysis.answer),
            summary: Some(analysis.summary),
            insights: analysis.insights,
            data: retrieval.rows,
            row_count: retrieval.row_count,
            relevant_tables: retrieval.relevant_tables,
            enriched_data: enrichment.enriched_data,
            execution_time_ms: elapsed_ms,
            agent_flow: AgentFlow {
                retrieval: "completed".to_string(),
                analysis: if analysis.degraded {
                    "degraded".to_string()
                } else {
                    "completed".to_string()
                },
                enrichment: if enrichment.skipped {
                    "skipped".to_string()
                } else {
                    "completed".to_string()
                },
            },
            error: None,
        }
    }

    async fn audit(&self, record: &AuditRecord) {
        if let Err(e) = record_query(&self.pool, record).await {
            eprintln!("Warning: failed to write audit record: {}", e);
        }
    }
}

fn reasoning_json(entries: &[ReasoningEntry]) -> String {
    serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_string())
}
