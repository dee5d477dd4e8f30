use crate::core::rate_limiter::RateLimiter;
use crate::db::{self, ttl};
use crate::models::{FetchResult, Paper, ResearchDomain};
use super::{cached, http_client};
use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::time::Duration;

const SOURCE: &str = "arxiv";
const API_URL: &str = "http://export.arxiv.org/api/query";
const MAX_RESULTS: u32 = 5;
const SUMMARY_CHARS: usize = 200;

/// Research domains and their arXiv category queries.
pub const DOMAINS: [(&str, &str); 5] = [
    ("AI Research", "cat:cs.AI OR cat:cs.LG"),
    ("Advanced Manufacturing", "cat:cs.RO OR cat:cs.SY"),
    ("Biotechnology", "cat:q-bio.BM OR cat:q-bio.GN"),
    ("Quantum Computing", "cat:quant-ph"),
    ("Semiconductors", "cat:cond-mat.mes-hall OR cat:cs.ET"),
];

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "opensearch:totalResults", alias = "totalResults")]
    total_results: Option<String>,
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
}

pub struct ArxivFetcher {
    client: Client,
    pool: Option<SqlitePool>,
}

impl ArxivFetcher {
    pub fn new(pool: Option<SqlitePool>) -> Self {
        Self {
            client: http_client(Duration::from_secs(30)),
            pool,
        }
    }

    pub async fn fetch_domain(&self, query: &str) -> Result<ResearchDomain> {
        let key = db::cache_key(&[SOURCE, query]);
        cached(self.pool.as_ref(), &key, SOURCE, ttl::ARXIV, || async {
            let max_results = MAX_RESULTS.to_string();
            let resp = self.client
                .get(API_URL)
                .query(&[
                    ("search_query", query),
                    ("start", "0"),
                    ("max_results", max_results.as_str()),
                    ("sortBy", "submittedDate"),
                    ("sortOrder", "descending"),
                ])
                .send()
                .await?;

            if !resp.status().is_success() {
                return Err(anyhow!("arXiv API Error: {}", resp.status()));
            }

            let body = resp.text().await?;
            parse_atom(&body)
        })
        .await
    }

    /// All domains, one request at a time (arXiv asks clients to pace themselves).
    pub async fn fetch_all(&self) -> FetchResult<BTreeMap<String, ResearchDomain>> {
        let mut domains = BTreeMap::new();
        let mut errors = Vec::new();

        for (i, (name, query)) in DOMAINS.iter().enumerate() {
            if i > 0 {
                RateLimiter::wait(SOURCE).await;
            }
            tracing::info!("  Fetching {}...", name);
            match self.fetch_domain(query).await {
                Ok(domain) => {
                    domains.insert(name.to_string(), domain);
                }
                Err(e) => {
                    tracing::warn!("  Failed {}: {}", name, e);
                    errors.push(format!("{}: {}", name, e));
                }
            }
        }

        if domains.is_empty() {
            return FetchResult::failed(SOURCE, errors.join("; "));
        }
        let mut result = FetchResult::ok(SOURCE, domains);
        if !errors.is_empty() {
            result.error = Some(errors.join("; "));
        }
        result
    }
}

pub fn parse_atom(xml: &str) -> Result<ResearchDomain> {
    let feed: Feed = quick_xml::de::from_str(xml)
        .map_err(|e| anyhow!("Failed to parse arXiv feed: {}", e))?;

    let total_volume = feed.total_results
        .and_then(|t| t.trim().parse::<u64>().ok())
        .unwrap_or(0);

    let recent_papers = feed.entries
        .into_iter()
        .map(|entry| Paper {
            title: entry.title
                .map(|t| collapse_whitespace(&t))
                .unwrap_or_else(|| "Unknown".to_string()),
            summary: entry.summary
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(|s| format!("{}...", s.chars().take(SUMMARY_CHARS).collect::<String>()))
                .unwrap_or_default(),
            date: entry.published
                .map(|p| p.chars().take(10).collect())
                .unwrap_or_default(),
            link: entry.id.unwrap_or_default(),
        })
        .collect();

    Ok(ResearchDomain { total_volume, recent_papers })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
