//! Aggregate statistics over the database and the schema index.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::index::VectorIndex;
use crate::models::IndexStats;

#[derive(Debug, Clone, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_queries: i64,
    pub successful_queries: i64,
    pub failed_queries: i64,
    pub success_rate: f64,
    pub table_counts: Vec<TableCount>,
    pub index: IndexStats,
}

/// Collect query-log counters, per-table row counts, and index stats.
pub async fn collect_stats(pool: &SqlitePool, index: &VectorIndex) -> Result<Stats> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total, \
         COALESCE(SUM(success), 0) AS ok \
         FROM query_logs",
    )
    .fetch_one(pool)
    .await?;
    let total: i64 = row.try_get("total")?;
    let ok: i64 = row.try_get("ok")?;

    let success_rate = if total > 0 {
        ok as f64 / total as f64
    } else {
        0.0
    };

    let tables = sqlx::query(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let mut table_counts = Vec::with_capacity(tables.len());
    for table in tables {
        let name: String = table.try_get("name")?;
        // Table names come from sqlite_master.
        let count_row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", name))
            .fetch_one(pool)
            .await?;
        let n: i64 = count_row.try_get("n")?;
        table_counts.push(TableCount { table: name, rows: n });
    }

    Ok(Stats {
        total_queries: total,
        successful_queries: ok,
        failed_queries: total - ok,
        success_rate,
        table_counts,
        index: index.stats(),
    })
}

/// Print stats in a human-readable layout for the CLI.
pub fn print_stats(stats: &Stats) {
    println!("Query log:");
    println!("  total:      {}", stats.total_queries);
    println!("  successful: {}", stats.successful_queries);
    println!("  failed:     {}", stats.failed_queries);
    println!("  success rate: {:.1}%", stats.success_rate * 100.0);
    println!();
    println!("Tables:");
    for tc in &stats.table_counts {
        println!("  {:<24} {} rows", tc.table, tc.rows);
    }
    println!();
    println!("Schema index:");
    println!("  documents:  {}", stats.index.total_documents);
    println!("  dimensions: {}", stats.index.dimensions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DisabledProvider, EmbeddingProvider};
    use crate::migrate::run_migrations;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_collect_stats_empty() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(DisabledProvider);
        let index = VectorIndex::in_memory(0, provider);

        let stats = collect_stats(&pool, &index).await.unwrap();
        assert_eq!(stats.total_queries, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert!(stats
            .table_counts
            .iter()
            .any(|tc| tc.table == "companies" && tc.rows == 0));
    }

    #[tokio::test]
    async fn test_collect_stats_counts_outcomes() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO query_logs (user_query, agent_reasoning, success) VALUES \
             ('a', '[]', 1), ('b', '[]', 1), ('c', '[]', 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let provider: Arc<dyn EmbeddingProvider> = Arc::new(DisabledProvider);
        let index = VectorIndex::in_memory(0, provider);
        let stats = collect_stats(&pool, &index).await.unwrap();

        assert_eq!(stats.total_queries, 3);
        assert_eq!(stats.successful_queries, 2);
        assert_eq!(stats.failed_queries, 1);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-9);
    }
}
