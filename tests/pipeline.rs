//! End-to-end pipeline tests over an in-memory database with scripted
//! providers. No network access and no external models.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use finquery::completion::{CompletionOptions, CompletionProvider};
use finquery::config::{LlmConfig, RetrievalConfig};
use finquery::embedding::EmbeddingProvider;
use finquery::enrich::{FilingProvider, FilingResult, MarketDataProvider, MarketSnapshot};
use finquery::executor::SqliteExecutor;
use finquery::index::VectorIndex;
use finquery::migrate::run_migrations;
use finquery::pipeline::analysis::AnalysisStage;
use finquery::pipeline::enrichment::EnrichmentStage;
use finquery::pipeline::retrieval::RetrievalStage;
use finquery::pipeline::Orchestrator;
use finquery::schema_index::SchemaCatalog;
use finquery::translate::QueryTranslator;

const DIMS: usize = 8;

/// Deterministic keyword embedder: related texts land near each other.
struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-mock"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v = vec![0.0f32; DIMS];
                for (i, kw) in ["compan", "revenue", "ticker", "portfolio", "price", "metric"]
                    .iter()
                    .enumerate()
                {
                    if lower.contains(kw) {
                        v[i] = 1.0;
                    }
                }
                v
            })
            .collect())
    }
}

/// Scripted completion provider. SQL-generation calls (plain text) get the
/// configured query; analysis calls (JSON mode) get the configured summary.
struct ScriptedCompletion {
    sql_reply: Result<String, String>,
    analysis_reply: Result<String, String>,
}

impl ScriptedCompletion {
    fn working(sql: &str) -> Self {
        Self {
            sql_reply: Ok(sql.to_string()),
            analysis_reply: Ok(serde_json::json!({
                "answer": "Acme leads on revenue.",
                "summary": "One company dominates.",
                "insights": ["Revenue is concentrated"]
            })
            .to_string()),
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    fn model_name(&self) -> &str {
        "scripted"
    }
    async fn complete(
        &self,
        _system: &str,
        _user: &str,
        options: &CompletionOptions,
    ) -> Result<String> {
        let reply = if options.json_response {
            &self.analysis_reply
        } else {
            &self.sql_reply
        };
        match reply {
            Ok(s) => Ok(s.clone()),
            Err(e) => anyhow::bail!("{}", e),
        }
    }
}

struct MockMarket {
    fail: bool,
}

#[async_trait]
impl MarketDataProvider for MockMarket {
    async fn market_snapshot(&self, ticker: &str) -> Result<Option<MarketSnapshot>> {
        if self.fail {
            anyhow::bail!("quote service down");
        }
        Ok(Some(MarketSnapshot {
            ticker: ticker.to_string(),
            current_price: Some(99.0),
            market_cap: Some(1_000_000.0),
            pe_ratio: None,
            dividend_yield: None,
            week_52_high: None,
            week_52_low: None,
            volume: Some(1000),
            fetched_at: Utc::now().to_rfc3339(),
        }))
    }
}

struct MockFiling;

#[async_trait]
impl FilingProvider for MockFiling {
    async fn regulatory_filing(&self, company: &str) -> Result<Option<FilingResult>> {
        Ok(Some(FilingResult {
            company: company.to_string(),
            search_results: serde_json::json!({"filings": ["10-K"]}),
            fetched_at: Utc::now().to_rfc3339(),
        }))
    }
}

struct Harness {
    pool: SqlitePool,
    orchestrator: Orchestrator,
}

async fn harness(completion: ScriptedCompletion, market_fail: bool) -> Harness {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    sqlx::query(
        "INSERT INTO companies (name, ticker, sector) VALUES \
         ('Acme Corp', 'ACME', 'Technology'), \
         ('Globex', 'GLBX', 'Industrials')",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO financial_statements (company_id, statement_date, revenue) VALUES \
         (1, '2025-12-31', 500.0), (2, '2025-12-31', 120.0)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let index = Arc::new(VectorIndex::in_memory(DIMS, Arc::new(KeywordEmbedder)));
    let catalog = Arc::new(SchemaCatalog::new(pool.clone(), index));
    catalog.index_schema().await.unwrap();

    let completion: Arc<dyn CompletionProvider> = Arc::new(completion);
    let llm = LlmConfig::default();
    let retrieval_cfg = RetrievalConfig::default();

    let retrieval = RetrievalStage::new(
        catalog,
        QueryTranslator::new(completion.clone(), &llm),
        Arc::new(SqliteExecutor::new(pool.clone())),
        &retrieval_cfg,
    );
    let analysis = AnalysisStage::new(completion, &llm);
    let enrichment = EnrichmentStage::new(
        Arc::new(MockMarket { fail: market_fail }),
        Arc::new(MockFiling),
    );

    let orchestrator = Orchestrator::new(retrieval, analysis, enrichment, pool.clone(), &retrieval_cfg);
    Harness { pool, orchestrator }
}

async fn audit_rows(pool: &SqlitePool) -> Vec<(String, bool, Option<String>)> {
    sqlx::query("SELECT user_query, success, error_message FROM query_logs ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap()
        .iter()
        .map(|r| {
            (
                r.get::<String, _>("user_query"),
                r.get::<i64, _>("success") != 0,
                r.get::<Option<String>, _>("error_message"),
            )
        })
        .collect()
}

#[tokio::test]
async fn successful_question_returns_data_and_audits_once() {
    let h = harness(
        ScriptedCompletion::working(
            "SELECT c.name, fs.revenue FROM companies c \
             JOIN financial_statements fs ON fs.company_id = c.id \
             ORDER BY fs.revenue DESC",
        ),
        false,
    )
    .await;

    let response = h
        .orchestrator
        .process("Which company had the highest revenue?")
        .await;

    assert!(response.success);
    assert_eq!(response.row_count, 2);
    assert_eq!(response.data[0]["name"], serde_json::json!("Acme Corp"));
    assert_eq!(response.answer.as_deref(), Some("Acme leads on revenue."));
    assert_eq!(response.agent_flow.retrieval, "completed");
    assert_eq!(response.agent_flow.analysis, "completed");
    // No market/filing keywords in the question.
    assert_eq!(response.agent_flow.enrichment, "skipped");
    assert!(response.enriched_data.is_empty());
    assert!(response.relevant_tables.contains(&"financial_statements".to_string()));

    let rows = audit_rows(&h.pool).await;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].1);
    assert!(rows[0].2.is_none());
}

#[tokio::test]
async fn translation_failure_aborts_with_failed_audit() {
    let h = harness(
        ScriptedCompletion {
            sql_reply: Err("model unreachable".to_string()),
            analysis_reply: Ok("{}".to_string()),
        },
        false,
    )
    .await;

    let response = h.orchestrator.process("highest revenue?").await;

    assert!(!response.success);
    assert!(response.error.is_some());
    assert!(response.answer.is_none());
    assert!(response.data.is_empty());
    assert_eq!(response.agent_flow.retrieval, "failed");
    assert_eq!(response.agent_flow.analysis, "not_run");
    assert_eq!(response.agent_flow.enrichment, "not_run");

    let rows = audit_rows(&h.pool).await;
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].1);
    assert!(rows[0].2.as_deref().unwrap().contains("model unreachable"));
}

#[tokio::test]
async fn execution_failure_aborts_with_sql_preserved() {
    let h = harness(
        ScriptedCompletion::working("SELECT * FROM no_such_table"),
        false,
    )
    .await;

    let response = h.orchestrator.process("anything about revenue").await;

    assert!(!response.success);
    assert_eq!(response.sql.as_deref(), Some("SELECT * FROM no_such_table"));
    assert!(response.error.is_some());

    // Failed retrieval still leaves its reasoning in the audit record.
    let reasoning: String = sqlx::query("SELECT agent_reasoning FROM query_logs")
        .fetch_one(&h.pool)
        .await
        .unwrap()
        .get("agent_reasoning");
    assert!(reasoning.contains("query_execution_failed"));
    assert!(!reasoning.contains("analysis_started"));
}

#[tokio::test]
async fn analysis_failure_degrades_but_succeeds() {
    let h = harness(
        ScriptedCompletion {
            sql_reply: Ok("SELECT name, ticker FROM companies".to_string()),
            analysis_reply: Err("summarizer down".to_string()),
        },
        false,
    )
    .await;

    let response = h.orchestrator.process("list the companies").await;

    assert!(response.success);
    assert_eq!(response.agent_flow.analysis, "degraded");
    assert_eq!(response.answer.as_deref(), Some("The query returned 2 results."));

    let rows = audit_rows(&h.pool).await;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].1);
}

#[tokio::test]
async fn market_question_with_ticker_gets_enriched() {
    let h = harness(
        ScriptedCompletion::working("SELECT name, ticker FROM companies ORDER BY id"),
        false,
    )
    .await;

    let response = h
        .orchestrator
        .process("What is the stock price of Acme?")
        .await;

    assert!(response.success);
    assert_eq!(response.agent_flow.enrichment, "completed");
    let market = &response.enriched_data["market_data"];
    assert_eq!(market["ticker"], "ACME");
    assert_eq!(market["current_price"], 99.0);
}

#[tokio::test]
async fn enrichment_failure_never_flips_success() {
    let h = harness(
        ScriptedCompletion::working("SELECT name, ticker FROM companies ORDER BY id"),
        true,
    )
    .await;

    let response = h
        .orchestrator
        .process("What is the stock price of Acme?")
        .await;

    assert!(response.success);
    assert!(response.enriched_data.is_empty());
    assert_eq!(response.agent_flow.enrichment, "completed");

    let rows = audit_rows(&h.pool).await;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].1);
}

#[tokio::test]
async fn filing_question_gets_filing_block() {
    let h = harness(
        ScriptedCompletion::working("SELECT name FROM companies ORDER BY id"),
        false,
    )
    .await;

    let response = h
        .orchestrator
        .process("Show SEC filings for our companies")
        .await;

    assert!(response.success);
    assert_eq!(
        response.enriched_data["sec_filings"]["company"],
        serde_json::json!("Acme Corp")
    );
}

#[tokio::test]
async fn empty_result_set_still_succeeds() {
    let h = harness(
        ScriptedCompletion {
            sql_reply: Ok("SELECT name FROM companies WHERE sector = 'Aerospace'".to_string()),
            analysis_reply: Err("summarizer down".to_string()),
        },
        false,
    )
    .await;

    let response = h.orchestrator.process("aerospace companies by revenue").await;

    assert!(response.success);
    assert_eq!(response.row_count, 0);
    assert_eq!(response.answer.as_deref(), Some("The query returned no results."));
}
