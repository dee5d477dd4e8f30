use crate::db::{self, ttl};
use crate::models::{Article, FetchResult};
use super::{cached, http_client};
use anyhow::{Result, anyhow};
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::time::Duration;

const SOURCE: &str = "rss";

pub const NEWS_FEEDS: [&str; 4] = [
    "https://finance.yahoo.com/news/rssindex",
    "https://cointelegraph.com/rss",
    "https://www.marketwatch.com/rss/topstories",
    "https://www.artificialintelligence-news.com/feed/",
];

pub const CRYPTO_FEED: &str = "https://cointelegraph.com/rss";

const PER_FEED: usize = 5;
const MAX_ARTICLES: usize = 20;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "$text", default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    /// `<link>` and `<atom:link href=".."/>` share a local name; only the first with text is used
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

pub struct NewsFetcher {
    client: Client,
    pool: Option<SqlitePool>,
}

impl NewsFetcher {
    pub fn new(pool: Option<SqlitePool>) -> Self {
        Self {
            client: http_client(Duration::from_secs(15)),
            pool,
        }
    }

    /// First few items of a single feed.
    pub async fn fetch_feed(&self, url: &str, limit: usize) -> Result<Vec<Article>> {
        let key = db::cache_key(&[SOURCE, url]);
        let articles: Vec<Article> = cached(self.pool.as_ref(), &key, SOURCE, ttl::RSS, || async {
            tracing::info!("  Fetching {}...", url);
            let resp = self.client.get(url).send().await?;
            if !resp.status().is_success() {
                return Err(anyhow!("RSS Error {}: {}", url, resp.status()));
            }
            let body = resp.text().await?;
            parse_feed(&body, PER_FEED)
        })
        .await?;

        Ok(articles.into_iter().take(limit).collect())
    }

    /// Headlines across all configured feeds, feed order preserved. Broken feeds are skipped.
    pub async fn fetch_all(&self) -> FetchResult<Vec<Article>> {
        let results = join_all(NEWS_FEEDS.iter().map(|url| self.fetch_feed(url, PER_FEED))).await;

        let mut articles = Vec::new();
        let mut errors = Vec::new();
        for (url, res) in NEWS_FEEDS.iter().zip(results) {
            match res {
                Ok(items) => articles.extend(items),
                Err(e) => {
                    tracing::debug!("  Feed error {}: {}", url, e);
                    errors.push(e.to_string());
                }
            }
        }
        articles.truncate(MAX_ARTICLES);

        if articles.is_empty() && !errors.is_empty() {
            return FetchResult::failed(SOURCE, errors.join("; "));
        }
        FetchResult::ok(SOURCE, articles)
    }

    /// Plain headline strings for the compass page.
    pub async fn fetch_headlines(&self, url: &str, limit: usize) -> Vec<String> {
        match self.fetch_feed(url, limit).await {
            Ok(articles) if !articles.is_empty() => articles.into_iter().map(|a| a.title).collect(),
            Ok(_) => vec!["No news available.".to_string()],
            Err(e) => {
                tracing::warn!("News error: {}", e);
                vec!["No news available.".to_string()]
            }
        }
    }
}

pub fn parse_feed(xml: &str, limit: usize) -> Result<Vec<Article>> {
    let rss: Rss = quick_xml::de::from_str(xml)
        .map_err(|e| anyhow!("Failed to parse RSS: {}", e))?;

    let source = rss.channel.title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    Ok(rss.channel.items
        .into_iter()
        .take(limit)
        .map(|item| Article {
            title: item.title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "No title".to_string()),
            source: source.clone(),
            url: item.links
                .into_iter()
                .filter_map(|l| l.text)
                .map(|l| l.trim().to_string())
                .find(|l| !l.is_empty()),
            published_at: item.pub_date,
        })
        .collect())
}
