//! Schema catalog: introspects the SQLite database and indexes
//! natural-language descriptions of its tables, columns, and foreign keys.
//!
//! Three description templates, one per schema element kind:
//! - `Table: {name}`
//! - `Table {t}, Column {c} (type: {ty})`
//! - `Table {t} has foreign key ({cols}) referencing {rt}({rcols})`
//!
//! Re-indexing after a schema change only adds descriptions for the new
//! elements; unchanged texts are suppressed by the index's dedup set.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use crate::index::VectorIndex;
use crate::models::DocMeta;

pub struct SchemaCatalog {
    pool: SqlitePool,
    index: Arc<VectorIndex>,
}

impl SchemaCatalog {
    pub fn new(pool: SqlitePool, index: Arc<VectorIndex>) -> Self {
        Self { pool, index }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Introspect every user table and index its descriptions.
    ///
    /// Returns the number of descriptions newly added.
    pub async fn index_schema(&self) -> Result<usize> {
        let mut texts = Vec::new();
        let mut metas = Vec::new();

        for table in self.user_tables().await? {
            texts.push(format!("Table: {}", table));
            metas.push(DocMeta::Table {
                table_name: table.clone(),
            });

            // Table names come from sqlite_master, so interpolation into
            // PRAGMA statements is safe here.
            let columns = sqlx::query(&format!("PRAGMA table_info({})", table))
                .fetch_all(&self.pool)
                .await?;
            for col in columns {
                let name: String = col.try_get("name")?;
                let col_type: String = col.try_get("type")?;
                texts.push(format!(
                    "Table {}, Column {} (type: {})",
                    table, name, col_type
                ));
                metas.push(DocMeta::Column {
                    table_name: table.clone(),
                    column_name: name,
                    column_type: col_type,
                });
            }

            let fks = sqlx::query(&format!("PRAGMA foreign_key_list({})", table))
                .fetch_all(&self.pool)
                .await?;

            // foreign_key_list returns one row per column of each key,
            // grouped by id. Collect rows of the same id into one key.
            let mut grouped: Vec<(i64, String, Vec<String>, Vec<String>)> = Vec::new();
            for fk in fks {
                let id: i64 = fk.try_get("id")?;
                let referred: String = fk.try_get("table")?;
                let from: String = fk.try_get("from")?;
                let to: String = fk.try_get("to")?;
                match grouped.iter_mut().find(|(gid, ..)| *gid == id) {
                    Some((_, _, froms, tos)) => {
                        froms.push(from);
                        tos.push(to);
                    }
                    None => grouped.push((id, referred, vec![from], vec![to])),
                }
            }

            for (_, referred, froms, tos) in grouped {
                texts.push(format!(
                    "Table {} has foreign key ({}) referencing {}({})",
                    table,
                    froms.join(", "),
                    referred,
                    tos.join(", ")
                ));
                metas.push(DocMeta::Relationship {
                    table_name: table.clone(),
                    from_columns: froms,
                    referred_table: referred,
                    referred_columns: tos,
                });
            }
        }

        let added = self.index.add_documents(texts, metas).await?;
        Ok(added)
    }

    async fn user_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| r.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }

    /// Distinct table names relevant to the question, nearest first.
    pub async fn relevant_tables(&self, question: &str, k: usize) -> Vec<String> {
        let hits = self.index.search(question, k).await;
        let mut tables = Vec::new();
        for hit in hits {
            let table = hit.record.meta.table_name().to_string();
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
        tables
    }

    /// Relevant columns grouped by table, in discovery order.
    ///
    /// Only column descriptions contribute; table and relationship hits
    /// are skipped.
    pub async fn relevant_columns(&self, question: &str, k: usize) -> Vec<(String, Vec<String>)> {
        let hits = self.index.search(question, k).await;
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for hit in hits {
            if let DocMeta::Column {
                table_name,
                column_name,
                ..
            } = hit.record.meta
            {
                match grouped.iter_mut().find(|(t, _)| *t == table_name) {
                    Some((_, cols)) => {
                        if !cols.contains(&column_name) {
                            cols.push(column_name);
                        }
                    }
                    None => grouped.push((table_name, vec![column_name])),
                }
            }
        }
        grouped
    }
}
