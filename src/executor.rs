//! SQL execution with JSON row decoding.
//!
//! Generated queries return arbitrary column shapes, so rows are decoded
//! dynamically by the declared SQLite type of each column rather than
//! through typed `FromRow` structs.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

use crate::error::PipelineError;
use crate::models::{JsonRow, ResultSet};

/// Trait seam for SQL execution, so pipeline tests can run against a
/// scripted executor.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<ResultSet, PipelineError>;
}

pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str) -> Result<ResultSet, PipelineError> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PipelineError::ExecutionFailed(e.to_string()))?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let decoded = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResultSet {
            columns,
            rows: decoded,
        })
    }
}

fn decode_row(row: &SqliteRow) -> Result<JsonRow, PipelineError> {
    let mut map = JsonRow::new();

    for (i, column) in row.columns().iter().enumerate() {
        let raw = row
            .try_get_raw(i)
            .map_err(|e| PipelineError::ExecutionFailed(e.to_string()))?;

        let value = if raw.is_null() {
            serde_json::Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => row
                    .try_get::<i64, _>(i)
                    .map(serde_json::Value::from)
                    .unwrap_or(serde_json::Value::Null),
                "REAL" => row
                    .try_get::<f64, _>(i)
                    .map(serde_json::Value::from)
                    .unwrap_or(serde_json::Value::Null),
                "TEXT" => row
                    .try_get::<String, _>(i)
                    .map(serde_json::Value::from)
                    .unwrap_or(serde_json::Value::Null),
                // BLOB and anything exotic: best-effort string, else null.
                _ => row
                    .try_get::<String, _>(i)
                    .map(serde_json::Value::from)
                    .unwrap_or(serde_json::Value::Null),
            }
        };

        map.insert(column.name().to_string(), value);
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> SqliteExecutor {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE companies (id INTEGER PRIMARY KEY, name TEXT, ticker TEXT, founded REAL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO companies (name, ticker, founded) VALUES \
             ('Acme Corp', 'ACME', 1999.0), \
             ('Globex', NULL, 1947.0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        SqliteExecutor::new(pool)
    }

    #[tokio::test]
    async fn test_execute_decodes_types() {
        let executor = setup().await;
        let result = executor
            .execute("SELECT id, name, ticker, founded FROM companies ORDER BY id")
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["id", "name", "ticker", "founded"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0]["id"], serde_json::json!(1));
        assert_eq!(result.rows[0]["name"], serde_json::json!("Acme Corp"));
        assert_eq!(result.rows[0]["founded"], serde_json::json!(1999.0));
        assert_eq!(result.rows[1]["ticker"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_execute_empty_result() {
        let executor = setup().await;
        let result = executor
            .execute("SELECT * FROM companies WHERE name = 'nobody'")
            .await
            .unwrap();
        assert!(result.rows.is_empty());
        assert!(result.columns.is_empty());
    }

    #[tokio::test]
    async fn test_execute_invalid_sql_fails() {
        let executor = setup().await;
        let result = executor.execute("SELECT * FROM missing_table").await;
        assert!(matches!(result, Err(PipelineError::ExecutionFailed(_))));
    }

    #[tokio::test]
    async fn test_execute_aggregate() {
        let executor = setup().await;
        let result = executor
            .execute("SELECT COUNT(*) AS n, AVG(founded) AS avg_founded FROM companies")
            .await
            .unwrap();
        assert_eq!(result.rows[0]["n"], serde_json::json!(2));
        assert!(result.rows[0]["avg_founded"].is_f64());
    }
}
