use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Path prefix for the persisted index artifacts
    /// (`<path>.vectors` and `<path>.meta.json`).
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

/// Settings for the language-generation provider used by query
/// translation and result analysis.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Determinism knob for SQL generation. Kept low so the same question
    /// tends to produce the same query on repeat runs.
    #[serde(default = "default_sql_temperature")]
    pub sql_temperature: f32,
    #[serde(default = "default_analysis_temperature")]
    pub analysis_temperature: f32,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            sql_temperature: default_sql_temperature(),
            analysis_temperature: default_analysis_temperature(),
            max_tokens: default_llm_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_sql_temperature() -> f32 {
    0.1
}
fn default_analysis_temperature() -> f32 {
    0.3
}
fn default_llm_max_tokens() -> u32 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// k for table-relevance search.
    #[serde(default = "default_table_k")]
    pub table_k: usize,
    /// k for column-relevance search.
    #[serde(default = "default_column_k")]
    pub column_k: usize,
    /// Rows included in the audit-record result sample.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            table_k: default_table_k(),
            column_k: default_column_k(),
            sample_rows: default_sample_rows(),
        }
    }
}

fn default_table_k() -> usize {
    5
}
fn default_column_k() -> usize {
    10
}
fn default_sample_rows() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    /// User-Agent sent to SEC EDGAR, which rejects anonymous clients.
    #[serde(default)]
    pub edgar_user_agent: Option<String>,
    #[serde(default = "default_enrich_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            edgar_user_agent: None,
            timeout_secs: default_enrich_timeout_secs(),
        }
    }
}

fn default_enrich_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    // Validate retrieval
    if config.retrieval.table_k == 0 || config.retrieval.column_k == 0 {
        anyhow::bail!("retrieval.table_k and retrieval.column_k must be >= 1");
    }

    // Validate llm
    if !(0.0..=2.0).contains(&config.llm.sql_temperature)
        || !(0.0..=2.0).contains(&config.llm.analysis_temperature)
    {
        anyhow::bail!("llm temperatures must be in [0.0, 2.0]");
    }
    if config.llm.max_tokens == 0 {
        anyhow::bail!("llm.max_tokens must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_disabled_by_default() {
        let cfg = EmbeddingConfig::default();
        assert!(!cfg.is_enabled());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml_str = r#"
[db]
path = "data/finquery.sqlite"

[index]
path = "data/schema_index"

[server]
bind = "127.0.0.1:7430"
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.embedding.provider, "disabled");
        assert_eq!(cfg.retrieval.table_k, 5);
        assert_eq!(cfg.retrieval.column_k, 10);
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert!((cfg.llm.sql_temperature - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_parse_full_embedding_section() {
        let toml_str = r#"
[db]
path = "data/finquery.sqlite"

[index]
path = "data/schema_index"

[embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = 1536
batch_size = 32

[server]
bind = "127.0.0.1:7430"
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert!(cfg.embedding.is_enabled());
        assert_eq!(cfg.embedding.dims, Some(1536));
        assert_eq!(cfg.embedding.batch_size, 32);
        assert_eq!(cfg.embedding.max_retries, 5);
    }
}
