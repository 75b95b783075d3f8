//! Query audit trail.
//!
//! Every completed request, successful or not, becomes exactly one row in
//! `query_logs`. Records are never updated after insertion.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

/// One audit record, assembled by the orchestrator.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub user_query: String,
    pub generated_sql: Option<String>,
    /// JSON sample of result rows, bounded by the configured sample size.
    pub sql_result: Option<String>,
    pub final_answer: Option<String>,
    pub context_used: Option<String>,
    /// Full reasoning trail as a JSON array.
    pub agent_reasoning: String,
    pub execution_time_ms: f64,
    pub success: bool,
    pub error_message: Option<String>,
}

/// A row read back from the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub user_query: String,
    pub generated_sql: Option<String>,
    pub final_answer: Option<String>,
    pub execution_time_ms: Option<f64>,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: String,
}

pub async fn record_query(pool: &SqlitePool, record: &AuditRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO query_logs \
         (user_query, generated_sql, sql_result, final_answer, context_used, \
          agent_reasoning, execution_time_ms, success, error_message) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.user_query)
    .bind(&record.generated_sql)
    .bind(&record.sql_result)
    .bind(&record.final_answer)
    .bind(&record.context_used)
    .bind(&record.agent_reasoning)
    .bind(record.execution_time_ms)
    .bind(record.success as i64)
    .bind(&record.error_message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch recent audit entries, newest first.
pub async fn fetch_history(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<HistoryEntry>> {
    let rows = sqlx::query(
        "SELECT id, user_query, generated_sql, final_answer, execution_time_ms, \
         success, error_message, created_at \
         FROM query_logs ORDER BY id DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(HistoryEntry {
                id: row.try_get("id")?,
                user_query: row.try_get("user_query")?,
                generated_sql: row.try_get("generated_sql")?,
                final_answer: row.try_get("final_answer")?,
                execution_time_ms: row.try_get("execution_time_ms")?,
                success: row.try_get::<i64, _>("success")? != 0,
                error_message: row.try_get("error_message")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::run_migrations;

    async fn setup() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn sample_record(query: &str, success: bool) -> AuditRecord {
        AuditRecord {
            user_query: query.to_string(),
            generated_sql: Some("SELECT 1".to_string()),
            sql_result: Some("[]".to_string()),
            final_answer: success.then(|| "One result.".to_string()),
            context_used: None,
            agent_reasoning: "[]".to_string(),
            execution_time_ms: 12.5,
            success,
            error_message: (!success).then(|| "boom".to_string()),
        }
    }

    #[tokio::test]
    async fn test_record_and_fetch() {
        let pool = setup().await;
        record_query(&pool, &sample_record("first", true))
            .await
            .unwrap();
        record_query(&pool, &sample_record("second", false))
            .await
            .unwrap();

        let history = fetch_history(&pool, 10, 0).await.unwrap();
        assert_eq!(history.len(), 2);
        // Newest first.
        assert_eq!(history[0].user_query, "second");
        assert!(!history[0].success);
        assert_eq!(history[0].error_message.as_deref(), Some("boom"));
        assert!(history[1].success);
    }

    #[tokio::test]
    async fn test_fetch_pagination() {
        let pool = setup().await;
        for i in 0..5 {
            record_query(&pool, &sample_record(&format!("q{}", i), true))
                .await
                .unwrap();
        }

        let page = fetch_history(&pool, 2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].user_query, "q2");
        assert_eq!(page[1].user_query, "q1");
    }
}
