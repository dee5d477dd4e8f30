use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::analysis::technicals::CryptoIndicators;
use crate::llm::prompt::PromptInputs;
use crate::models::{Article, AuctionResult, FearGreed, FetchResult, ResearchDomain};

/// Domains whose newest titles are quoted in the unified prompt.
const PROMPT_PAPER_DOMAINS: [&str; 3] = ["AI Research", "Quantum Computing", "Biotechnology"];
const PROMPT_PAPERS_PER_DOMAIN: usize = 2;
const PROMPT_HEADLINES: usize = 10;

/// Everything fetched during one run. Dashboards only read from here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataStore {
    /// Spot prices keyed by registry key (`JPY`, `BTC`, ...)
    pub prices: HashMap<String, f64>,
    /// Weekly indicator rows keyed by Yahoo symbol
    pub crypto: HashMap<String, CryptoIndicators>,
    pub treasury: Option<AuctionResult>,
    pub fear_greed: Option<FearGreed>,
    pub news: Vec<Article>,
    pub arxiv: BTreeMap<String, ResearchDomain>,
    pub fetched_at: BTreeMap<String, String>,
    pub failures: Vec<String>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the envelope's timestamp and error, returning its payload.
    pub fn absorb<T>(&mut self, key: &str, result: FetchResult<T>) -> Option<T> {
        self.fetched_at.insert(key.to_string(), result.fetched_at.clone());
        if !result.success {
            let reason = result.error.clone().unwrap_or_else(|| "unknown error".to_string());
            tracing::warn!("  {} fetch failed: {}", key, reason);
            self.failures.push(format!("{}: {}", key, reason));
        } else if let Some(partial) = &result.error {
            tracing::warn!("  {} partially fetched ({})", key, partial);
        }
        result.into_data()
    }

    pub fn price(&self, key: &str) -> Option<f64> {
        self.prices.get(key).copied()
    }

    pub fn btc(&self) -> Option<&CryptoIndicators> {
        self.crypto.get("BTC-USD")
    }

    pub fn eth(&self) -> Option<&CryptoIndicators> {
        self.crypto.get("ETH-USD")
    }

    pub fn bid_to_cover(&self) -> Option<f64> {
        self.treasury.as_ref().and_then(|t| t.bid_to_cover_ratio)
    }

    pub fn headlines(&self, limit: usize) -> Vec<String> {
        self.news.iter().take(limit).map(|a| a.title.clone()).collect()
    }

    pub fn prompt_inputs(&self) -> PromptInputs {
        let btc = self.btc();

        let paper_titles = PROMPT_PAPER_DOMAINS
            .iter()
            .filter_map(|domain| self.arxiv.get(*domain))
            .flat_map(|d| d.recent_papers.iter().take(PROMPT_PAPERS_PER_DOMAIN))
            .map(|p| p.title.clone())
            .collect();

        PromptInputs {
            jpy: self.price("JPY"),
            cnh: self.price("CNH"),
            tnx: self.price("TNX"),
            move_index: self.price("MOVE"),
            vix: self.price("VIX"),
            bid_to_cover: self.bid_to_cover(),
            // Spot quote first, weekly close as a stand-in
            btc_price: self.price("BTC").or_else(|| btc.map(|b| b.price)),
            eth_price: self.price("ETH").or_else(|| self.eth().map(|e| e.price)),
            btc_rsi: btc.and_then(|b| b.rsi),
            btc_trend: btc.map(|b| b.trend.to_string()),
            fng_value: self.fear_greed.as_ref().map(|f| f.value),
            fng_class: self.fear_greed.as_ref().map(|f| f.classification.clone()),
            oil: self.price("OIL"),
            dxy: self.price("DXY"),
            gold: self.price("GOLD"),
            sp500: self.price("SP500"),
            tasi: self.price("TASI"),
            headlines: self.headlines(PROMPT_HEADLINES),
            paper_titles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Paper;

    fn paper(title: &str) -> Paper {
        Paper { title: title.into(), summary: String::new(), date: "2025-01-01".into(), link: String::new() }
    }

    #[test]
    fn test_prompt_inputs_picks_two_papers_per_domain() {
        let mut store = DataStore::new();
        for domain in ["AI Research", "Semiconductors", "Biotechnology"] {
            store.arxiv.insert(domain.to_string(), ResearchDomain {
                total_volume: 10,
                recent_papers: (0..4).map(|i| paper(&format!("{} {}", domain, i))).collect(),
            });
        }
        let inputs = store.prompt_inputs();
        assert_eq!(inputs.paper_titles, vec!["AI Research 0", "AI Research 1", "Biotechnology 0", "Biotechnology 1"]);
    }

    #[test]
    fn test_prompt_inputs_caps_headlines_and_falls_back_to_weekly_close() {
        let mut store = DataStore::new();
        store.news = (0..15)
            .map(|i| Article { title: format!("H{}", i), source: "s".into(), url: None, published_at: None })
            .collect();
        let closes: Vec<f64> = (1..=30).map(|v| v as f64 * 1000.0).collect();
        store.crypto.insert("BTC-USD".into(), CryptoIndicators::from_closes(&closes).unwrap());

        let inputs = store.prompt_inputs();
        assert_eq!(inputs.headlines.len(), 10);
        assert_eq!(inputs.btc_price, Some(30000.0));
        assert_eq!(inputs.btc_trend.as_deref(), Some("Bullish"));
        assert!(inputs.jpy.is_none());
    }

    #[test]
    fn test_absorb_records_failures() {
        let mut store = DataStore::new();
        let got: Option<FearGreed> = store.absorb("fear_greed", FetchResult::failed_with("alt", "timeout", FearGreed::neutral()));
        assert_eq!(got.unwrap().value, 50);
        assert_eq!(store.failures, vec!["fear_greed: timeout"]);
        assert!(store.fetched_at.contains_key("fear_greed"));
    }
}
