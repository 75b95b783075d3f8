//! Natural-language to SQL translation.
//!
//! Builds a schema context block from the catalog's relevant tables and
//! columns, asks the completion provider for a single SQLite query, and
//! strips any markdown fences from the reply. Translation either yields a
//! complete query or fails; there is no partial output.

use std::sync::Arc;

use crate::completion::{CompletionOptions, CompletionProvider};
use crate::config::LlmConfig;
use crate::error::PipelineError;

const SYSTEM_PROMPT: &str = "You are an expert SQL developer. Generate a single SQLite query \
that answers the user's question using only the tables and columns provided. \
Respond with the SQL query alone, no explanation and no markdown.";

/// A generated query plus the schema context that produced it.
#[derive(Debug, Clone)]
pub struct Translation {
    pub sql: String,
    pub tables: Vec<String>,
    pub context: String,
}

pub struct QueryTranslator {
    provider: Arc<dyn CompletionProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl QueryTranslator {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            temperature: config.sql_temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Generate a SQLite query for the question given retrieved schema.
    pub async fn generate(
        &self,
        question: &str,
        tables: &[String],
        columns: &[(String, Vec<String>)],
    ) -> Result<Translation, PipelineError> {
        let context = format_schema_context(tables, columns);

        let user_prompt = format!(
            "Database schema:\n{}\n\nQuestion: {}\n\nSQLite query:",
            context, question
        );

        let options = CompletionOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            json_response: false,
        };

        let raw = self
            .provider
            .complete(SYSTEM_PROMPT, &user_prompt, &options)
            .await
            .map_err(|e| PipelineError::TranslationFailed(e.to_string()))?;

        let sql = strip_code_fences(&raw);
        if sql.is_empty() {
            return Err(PipelineError::TranslationFailed(
                "model returned an empty query".to_string(),
            ));
        }

        Ok(Translation {
            sql,
            tables: tables.to_vec(),
            context,
        })
    }
}

/// Render retrieved schema as a compact context block.
fn format_schema_context(tables: &[String], columns: &[(String, Vec<String>)]) -> String {
    let mut lines = Vec::new();
    for table in tables {
        match columns.iter().find(|(t, _)| t == table) {
            Some((_, cols)) if !cols.is_empty() => {
                lines.push(format!("Table '{}': columns ({})", table, cols.join(", ")));
            }
            _ => lines.push(format!("Table '{}'", table)),
        }
    }
    // Columns whose table was not in the relevant-tables list still help.
    for (table, cols) in columns {
        if !tables.contains(table) {
            lines.push(format!("Table '{}': columns ({})", table, cols.join(", ")));
        }
    }
    lines.join("\n")
}

/// Remove ```sql / ``` fences and surrounding whitespace from model output.
fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```sql")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let without_close = without_open.strip_suffix("```").unwrap_or(without_open);
    without_close.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct CannedCompletion {
        reply: String,
    }

    #[async_trait]
    impl CompletionProvider for CannedCompletion {
        fn model_name(&self) -> &str {
            "canned"
        }
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _options: &CompletionOptions,
        ) -> Result<String> {
            Ok(self.reply.clone())
        }
    }

    struct FailingCompletion;

    #[async_trait]
    impl CompletionProvider for FailingCompletion {
        fn model_name(&self) -> &str {
            "failing"
        }
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _options: &CompletionOptions,
        ) -> Result<String> {
            anyhow::bail!("model unreachable")
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(
            strip_code_fences("```sql\nSELECT 1\n```"),
            "SELECT 1"
        );
        assert_eq!(strip_code_fences("```\nSELECT 2\n```"), "SELECT 2");
        assert_eq!(strip_code_fences("  SELECT 3  "), "SELECT 3");
    }

    #[test]
    fn test_format_schema_context() {
        let tables = vec!["companies".to_string()];
        let columns = vec![(
            "companies".to_string(),
            vec!["name".to_string(), "ticker".to_string()],
        )];
        let ctx = format_schema_context(&tables, &columns);
        assert_eq!(ctx, "Table 'companies': columns (name, ticker)");
    }

    #[test]
    fn test_format_schema_context_orphan_columns() {
        let tables = vec!["companies".to_string()];
        let columns = vec![(
            "market_data".to_string(),
            vec!["close_price".to_string()],
        )];
        let ctx = format_schema_context(&tables, &columns);
        assert!(ctx.contains("Table 'companies'"));
        assert!(ctx.contains("Table 'market_data': columns (close_price)"));
    }

    #[tokio::test]
    async fn test_generate_strips_fences() {
        let translator = QueryTranslator::new(
            Arc::new(CannedCompletion {
                reply: "```sql\nSELECT name FROM companies\n```".to_string(),
            }),
            &LlmConfig::default(),
        );
        let t = translator
            .generate("company names", &["companies".to_string()], &[])
            .await
            .unwrap();
        assert_eq!(t.sql, "SELECT name FROM companies");
        assert_eq!(t.tables, vec!["companies".to_string()]);
    }

    #[tokio::test]
    async fn test_generate_empty_reply_fails() {
        let translator = QueryTranslator::new(
            Arc::new(CannedCompletion {
                reply: "```sql\n```".to_string(),
            }),
            &LlmConfig::default(),
        );
        let result = translator.generate("anything", &[], &[]).await;
        assert!(matches!(result, Err(PipelineError::TranslationFailed(_))));
    }

    #[tokio::test]
    async fn test_generate_provider_error_fails() {
        let translator =
            QueryTranslator::new(Arc::new(FailingCompletion), &LlmConfig::default());
        let result = translator.generate("anything", &[], &[]).await;
        assert!(matches!(result, Err(PipelineError::TranslationFailed(_))));
    }
}
