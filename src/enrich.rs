//! External data enrichment: live market quotes and regulatory filings.
//!
//! Enrichment is keyword-gated and strictly best-effort. A provider error
//! never fails the request; it becomes a reasoning-trail entry and the
//! response simply omits that block.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;

use crate::config::EnrichmentConfig;
use crate::models::JsonRow;

const MARKET_KEYWORDS: &[&str] = &["stock", "ticker", "market", "price", "yahoo"];
const FILING_KEYWORDS: &[&str] = &["sec", "edgar", "filing", "10-k", "10-q"];

/// A point-in-time market quote for one ticker.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub ticker: String,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub week_52_high: Option<f64>,
    pub week_52_low: Option<f64>,
    pub volume: Option<i64>,
    pub fetched_at: String,
}

/// A regulatory filing lookup result for one company.
#[derive(Debug, Clone, Serialize)]
pub struct FilingResult {
    pub company: String,
    pub search_results: serde_json::Value,
    pub fetched_at: String,
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch a quote for the ticker. `Ok(None)` means the ticker was not
    /// found; `Err` means the provider itself failed.
    async fn market_snapshot(&self, ticker: &str) -> Result<Option<MarketSnapshot>>;
}

#[async_trait]
pub trait FilingProvider: Send + Sync {
    async fn regulatory_filing(&self, company: &str) -> Result<Option<FilingResult>>;
}

/// Yahoo Finance quote provider.
pub struct YahooQuoteProvider {
    client: reqwest::Client,
}

impl YahooQuoteProvider {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MarketDataProvider for YahooQuoteProvider {
    async fn market_snapshot(&self, ticker: &str) -> Result<Option<MarketSnapshot>> {
        let url = format!(
            "https://query1.finance.yahoo.com/v7/finance/quote?symbols={}",
            ticker
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("Yahoo Finance returned {}", status);
        }

        let json: serde_json::Value = response.json().await?;
        let quote = json
            .pointer("/quoteResponse/result/0")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        if quote.is_null() {
            return Ok(None);
        }

        Ok(Some(MarketSnapshot {
            ticker: ticker.to_string(),
            current_price: quote.get("regularMarketPrice").and_then(|v| v.as_f64()),
            market_cap: quote.get("marketCap").and_then(|v| v.as_f64()),
            pe_ratio: quote.get("trailingPE").and_then(|v| v.as_f64()),
            dividend_yield: quote
                .get("trailingAnnualDividendYield")
                .and_then(|v| v.as_f64()),
            week_52_high: quote.get("fiftyTwoWeekHigh").and_then(|v| v.as_f64()),
            week_52_low: quote.get("fiftyTwoWeekLow").and_then(|v| v.as_f64()),
            volume: quote.get("regularMarketVolume").and_then(|v| v.as_i64()),
            fetched_at: Utc::now().to_rfc3339(),
        }))
    }
}

/// SEC EDGAR company-filings provider.
///
/// EDGAR requires an identifying User-Agent; when none is configured the
/// provider declines the lookup instead of sending an anonymous request.
pub struct EdgarFilingProvider {
    user_agent: Option<String>,
    client: reqwest::Client,
}

impl EdgarFilingProvider {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            user_agent: config.edgar_user_agent.clone(),
            client,
        })
    }
}

#[async_trait]
impl FilingProvider for EdgarFilingProvider {
    async fn regulatory_filing(&self, company: &str) -> Result<Option<FilingResult>> {
        let Some(user_agent) = &self.user_agent else {
            return Ok(None);
        };

        let url = format!(
            "https://www.sec.gov/cgi-bin/browse-edgar?company={}&action=getcompany&output=json",
            company
        );

        let response = self
            .client
            .get(&url)
            .header("User-Agent", user_agent)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            bail!("SEC EDGAR returned {}", status);
        }

        let json: serde_json::Value = response.json().await?;

        Ok(Some(FilingResult {
            company: company.to_string(),
            search_results: json,
            fetched_at: Utc::now().to_rfc3339(),
        }))
    }
}

/// Whether the question asks for live market data.
pub fn wants_market_data(question: &str) -> bool {
    let lower = question.to_lowercase();
    MARKET_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Whether the question asks for regulatory filings.
pub fn wants_filing_data(question: &str) -> bool {
    let lower = question.to_lowercase();
    FILING_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// First ticker symbol found in the result rows, if any.
pub fn extract_ticker(rows: &[JsonRow]) -> Option<String> {
    rows.iter()
        .find_map(|row| row.get("ticker").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

/// First company name found in the result rows, falling back to ticker.
pub fn extract_company(rows: &[JsonRow]) -> Option<String> {
    rows.iter()
        .find_map(|row| row.get("name").and_then(|v| v.as_str()))
        .or_else(|| {
            rows.iter()
                .find_map(|row| row.get("ticker").and_then(|v| v.as_str()))
        })
        .map(|s| s.to_string())
}
