//! Analysis stage: natural-language summarization of result rows.
//!
//! This stage never fails the request. When the summarization call errors
//! or returns unparseable output, the stage falls back to a deterministic
//! row-count answer and marks the outcome as degraded.

use std::sync::Arc;

use crate::completion::{CompletionOptions, CompletionProvider};
use crate::config::LlmConfig;
use crate::models::{AnalysisOutcome, JsonRow, ReasoningLog};

const SYSTEM_PROMPT: &str = "You are a financial analyst. Given a question and query results, \
respond with a JSON object containing exactly these keys: \
\"answer\" (string, a direct answer to the question), \
\"summary\" (string, one or two sentences), \
\"insights\" (array of strings, notable observations).";

/// Rows beyond this count are elided from the prompt to bound token usage.
const MAX_PROMPT_ROWS: usize = 20;

pub struct AnalysisStage {
    provider: Arc<dyn CompletionProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl AnalysisStage {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            temperature: config.analysis_temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub async fn run(&self, question: &str, sql: &str, rows: &[JsonRow]) -> AnalysisOutcome {
        let mut log = ReasoningLog::new("analysis");
        log.push(
            "analysis_started",
            serde_json::json!({ "row_count": rows.len() }),
        );

        let shown = &rows[..rows.len().min(MAX_PROMPT_ROWS)];
        let rows_json = serde_json::to_string(shown).unwrap_or_else(|_| "[]".to_string());

        let user_prompt = format!(
            "Question: {}\n\nSQL executed: {}\n\nResults ({} rows total, {} shown):\n{}",
            question,
            sql,
            rows.len(),
            shown.len(),
            rows_json
        );

        let options = CompletionOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            json_response: true,
        };

        match self
            .provider
            .complete(SYSTEM_PROMPT, &user_prompt, &options)
            .await
        {
            Ok(raw) => match parse_analysis(&raw) {
                Some((answer, summary, insights)) => {
                    log.push("analysis_completed", serde_json::json!({ "degraded": false }));
                    AnalysisOutcome {
                        answer,
                        summary,
                        insights,
                        degraded: false,
                        reasoning: log.into_entries(),
                    }
                }
                None => {
                    log.push(
                        "analysis_fallback",
                        serde_json::json!({ "reason": "unparseable model output" }),
                    );
                    fallback_outcome(rows.len(), log)
                }
            },
            Err(e) => {
                log.push(
                    "analysis_fallback",
                    serde_json::json!({ "reason": e.to_string() }),
                );
                fallback_outcome(rows.len(), log)
            }
        }
    }
}

fn parse_analysis(raw: &str) -> Option<(String, String, Vec<String>)> {
    let json: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
    let answer = json.get("answer")?.as_str()?.to_string();
    let summary = json.get("summary")?.as_str()?.to_string();
    let insights = json
        .get("insights")
        .and_then(|i| i.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    Some((answer, summary, insights))
}

fn fallback_outcome(row_count: usize, log: ReasoningLog) -> AnalysisOutcome {
    let answer = match row_count {
        0 => "The query returned no results.".to_string(),
        1 => "The query returned 1 result.".to_string(),
        n => format!("The query returned {} results.", n),
    };
    AnalysisOutcome {
        answer: answer.clone(),
        summary: answer,
        insights: Vec::new(),
        degraded: true,
        reasoning: log.into_entries(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct CannedCompletion {
        reply: Result<String, String>,
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
            match &self.reply {
                Ok(s) => Ok(s.clone()),
                Err(e) => anyhow::bail!("{}", e),
            }
        }
    }

    fn row(value: serde_json::Value) -> JsonRow {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_analysis_parses_model_json() {
        let stage = AnalysisStage::new(
            Arc::new(CannedCompletion {
                reply: Ok(serde_json::json!({
                    "answer": "Acme had the highest revenue.",
                    "summary": "One company stands out.",
                    "insights": ["Revenue grew 12%"]
                })
                .to_string()),
            }),
            &LlmConfig::default(),
        );

        let rows = vec![row(serde_json::json!({"name": "Acme", "revenue": 100.0}))];
        let outcome = stage.run("highest revenue?", "SELECT 1", &rows).await;

        assert!(!outcome.degraded);
        assert_eq!(outcome.answer, "Acme had the highest revenue.");
        assert_eq!(outcome.insights, vec!["Revenue grew 12%"]);
    }

    #[tokio::test]
    async fn test_analysis_falls_back_on_provider_error() {
        let stage = AnalysisStage::new(
            Arc::new(CannedCompletion {
                reply: Err("model unreachable".to_string()),
            }),
            &LlmConfig::default(),
        );

        let rows = vec![
            row(serde_json::json!({"n": 1})),
            row(serde_json::json!({"n": 2})),
        ];
        let outcome = stage.run("count?", "SELECT 1", &rows).await;

        assert!(outcome.degraded);
        assert_eq!(outcome.answer, "The query returned 2 results.");
        assert!(outcome.insights.is_empty());
    }

    #[tokio::test]
    async fn test_analysis_falls_back_on_garbage_output() {
        let stage = AnalysisStage::new(
            Arc::new(CannedCompletion {
                reply: Ok("not json at all".to_string()),
            }),
            &LlmConfig::default(),
        );

        let outcome = stage.run("anything", "SELECT 1", &[]).await;
        assert!(outcome.degraded);
        assert_eq!(outcome.answer, "The query returned no results.");
    }

    #[test]
    fn test_parse_analysis_requires_answer_and_summary() {
        assert!(parse_analysis(r#"{"answer": "a", "summary": "s"}"#).is_some());
        assert!(parse_analysis(r#"{"answer": "a"}"#).is_none());
        assert!(parse_analysis("[]").is_none());
    }
}
