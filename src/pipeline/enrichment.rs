//! Enrichment stage: keyword-gated, best-effort external lookups.

use std::sync::Arc;

use crate::enrich::{
    extract_company, extract_ticker, wants_filing_data, wants_market_data, FilingProvider,
    MarketDataProvider,
};
use crate::models::{EnrichmentOutcome, JsonRow, ReasoningLog};

pub struct EnrichmentStage {
    market: Arc<dyn MarketDataProvider>,
    filing: Arc<dyn FilingProvider>,
}

impl EnrichmentStage {
    pub fn new(market: Arc<dyn MarketDataProvider>, filing: Arc<dyn FilingProvider>) -> Self {
        Self { market, filing }
    }

    /// Run enrichment for one question over its result rows.
    ///
    /// No keyword match means the stage is skipped entirely. Provider
    /// failures and missing identifiers are recorded in the reasoning
    /// trail and leave the corresponding block absent.
    pub async fn run(&self, question: &str, rows: &[JsonRow]) -> EnrichmentOutcome {
        let mut log = ReasoningLog::new("enrichment");

        let market_wanted = wants_market_data(question);
        let filing_wanted = wants_filing_data(question);

        if !market_wanted && !filing_wanted {
            log.push("enrichment_skipped", serde_json::json!({ "reason": "no keywords" }));
            return EnrichmentOutcome {
                enriched_data: JsonRow::new(),
                skipped: true,
                reasoning: log.into_entries(),
            };
        }

        let mut enriched = JsonRow::new();

        let market_fut = async {
            if !market_wanted {
                return None;
            }
            match extract_ticker(rows) {
                Some(ticker) => Some((ticker.clone(), self.market.market_snapshot(&ticker).await)),
                None => None,
            }
        };

        let filing_fut = async {
            if !filing_wanted {
                return None;
            }
            match extract_company(rows) {
                Some(company) => Some((
                    company.clone(),
                    self.filing.regulatory_filing(&company).await,
                )),
                None => None,
            }
        };

        let (market_result, filing_result) = tokio::join!(market_fut, filing_fut);

        if market_wanted {
            match market_result {
                Some((ticker, Ok(Some(snapshot)))) => {
                    log.push(
                        "market_data_fetched",
                        serde_json::json!({ "ticker": ticker }),
                    );
                    if let Ok(value) = serde_json::to_value(&snapshot) {
                        enriched.insert("market_data".to_string(), value);
                    }
                }
                Some((ticker, Ok(None))) => {
                    log.push(
                        "market_data_unavailable",
                        serde_json::json!({ "ticker": ticker }),
                    );
                }
                Some((ticker, Err(e))) => {
                    log.push(
                        "market_data_failed",
                        serde_json::json!({ "ticker": ticker, "error": e.to_string() }),
                    );
                }
                None => {
                    log.push(
                        "market_data_skipped",
                        serde_json::json!({ "reason": "no ticker in results" }),
                    );
                }
            }
        }

        if filing_wanted {
            match filing_result {
                Some((company, Ok(Some(filing)))) => {
                    log.push(
                        "filing_data_fetched",
                        serde_json::json!({ "company": company }),
                    );
                    if let Ok(value) = serde_json::to_value(&filing) {
                        enriched.insert("sec_filings".to_string(), value);
                    }
                }
                Some((company, Ok(None))) => {
                    log.push(
                        "filing_data_unavailable",
                        serde_json::json!({ "company": company }),
                    );
                }
                Some((company, Err(e))) => {
                    log.push(
                        "filing_data_failed",
                        serde_json::json!({ "company": company, "error": e.to_string() }),
                    );
                }
                None => {
                    log.push(
                        "filing_data_skipped",
                        serde_json::json!({ "reason": "no company in results" }),
                    );
                }
            }
        }

        EnrichmentOutcome {
            enriched_data: enriched,
            skipped: false,
            reasoning: log.into_entries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{FilingResult, MarketSnapshot};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;

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
                current_price: Some(101.5),
                market_cap: None,
                pe_ratio: None,
                dividend_yield: None,
                week_52_high: None,
                week_52_low: None,
                volume: None,
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
                search_results: serde_json::json!({"filings": []}),
                fetched_at: Utc::now().to_rfc3339(),
            }))
        }
    }

    fn row(value: serde_json::Value) -> JsonRow {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_no_keywords_skips() {
        let stage = EnrichmentStage::new(Arc::new(MockMarket { fail: false }), Arc::new(MockFiling));
        let outcome = stage.run("total revenue by company", &[]).await;
        assert!(outcome.skipped);
        assert!(outcome.enriched_data.is_empty());
        assert_eq!(outcome.reasoning[0].step, "enrichment_skipped");
    }

    #[tokio::test]
    async fn test_market_keyword_with_ticker_fetches() {
        let stage = EnrichmentStage::new(Arc::new(MockMarket { fail: false }), Arc::new(MockFiling));
        let rows = vec![row(serde_json::json!({"name": "Acme", "ticker": "ACME"}))];
        let outcome = stage.run("what is the stock price of Acme?", &rows).await;

        assert!(!outcome.skipped);
        let market = &outcome.enriched_data["market_data"];
        assert_eq!(market["ticker"], "ACME");
        assert_eq!(market["current_price"], 101.5);
    }

    #[tokio::test]
    async fn test_market_keyword_without_ticker_noted() {
        let stage = EnrichmentStage::new(Arc::new(MockMarket { fail: false }), Arc::new(MockFiling));
        let rows = vec![row(serde_json::json!({"revenue": 100.0}))];
        let outcome = stage.run("stock price?", &rows).await;

        assert!(!outcome.skipped);
        assert!(outcome.enriched_data.is_empty());
        assert!(outcome
            .reasoning
            .iter()
            .any(|e| e.step == "market_data_skipped"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_best_effort() {
        let stage = EnrichmentStage::new(Arc::new(MockMarket { fail: true }), Arc::new(MockFiling));
        let rows = vec![row(serde_json::json!({"ticker": "ACME"}))];
        let outcome = stage.run("stock price?", &rows).await;

        assert!(!outcome.skipped);
        assert!(outcome.enriched_data.is_empty());
        assert!(outcome
            .reasoning
            .iter()
            .any(|e| e.step == "market_data_failed"));
    }

    #[tokio::test]
    async fn test_filing_keyword_fetches() {
        let stage = EnrichmentStage::new(Arc::new(MockMarket { fail: false }), Arc::new(MockFiling));
        let rows = vec![row(serde_json::json!({"name": "Acme"}))];
        let outcome = stage.run("show SEC filings for Acme", &rows).await;

        assert!(outcome.enriched_data.contains_key("sec_filings"));
        assert_eq!(outcome.enriched_data["sec_filings"]["company"], "Acme");
    }
}
