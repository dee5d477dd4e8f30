use crate::db::{self, ttl};
use crate::models::{FearGreed, FetchResult};
use super::{cached, http_client};
use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::time::Duration;

const SOURCE: &str = "alternative.me";

#[derive(Deserialize)]
struct FngResponse {
    data: Vec<FngData>,
}

#[derive(Deserialize)]
struct FngData {
    value: String,
    value_classification: Option<String>,
    timestamp: String,
}

pub struct AlternativeFetcher {
    client: Client,
    pool: Option<SqlitePool>,
}

impl AlternativeFetcher {
    pub fn new(pool: Option<SqlitePool>) -> Self {
        Self {
            client: http_client(Duration::from_secs(10)),
            pool,
        }
    }

    async fn get_index(&self, limit: u32) -> Result<FngResponse> {
        let url = format!("https://api.alternative.me/fng/?limit={}&format=json", limit);

        let resp = self.client.get(&url)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow!("Alternative API Error: {}", resp.status()));
        }

        Ok(resp.json().await?)
    }

    /// Today's crypto Fear & Greed reading; neutral fallback on failure.
    pub async fn fetch_latest(&self) -> FetchResult<FearGreed> {
        let res = cached(self.pool.as_ref(), &db::cache_key(&[SOURCE, "latest"]), SOURCE, ttl::FEAR_GREED, || async {
            let json = self.get_index(1).await?;
            Self::parse_latest(json)
        })
        .await;

        match res {
            Ok(fng) => FetchResult::ok(SOURCE, fng),
            Err(e) => {
                tracing::warn!("  Failed F&G: {}", e);
                FetchResult::failed_with(SOURCE, e, FearGreed::neutral())
            }
        }
    }

    fn parse_latest(json: FngResponse) -> Result<FearGreed> {
        let item = json.data.into_iter().next()
            .ok_or_else(|| anyhow!("Empty Fear & Greed response"))?;

        let value = item.value.trim().parse::<i64>()
            .map_err(|e| anyhow!("Invalid Fear & Greed value '{}': {}", item.value, e))?;

        Ok(FearGreed {
            value,
            classification: item.value_classification.unwrap_or_else(|| "Unknown".to_string()),
            timestamp: Some(item.timestamp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(raw: serde_json::Value) -> FngResponse {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_parse_latest() {
        let json = response(serde_json::json!({
            "data": [{ "value": "72", "value_classification": "Greed", "timestamp": "1735689600" }]
        }));
        let fng = AlternativeFetcher::parse_latest(json).unwrap();
        assert_eq!(fng.value, 72);
        assert_eq!(fng.classification, "Greed");
        assert_eq!(fng.timestamp.as_deref(), Some("1735689600"));
    }

    #[test]
    fn test_parse_latest_empty_is_error() {
        let json = response(serde_json::json!({ "data": [] }));
        assert!(AlternativeFetcher::parse_latest(json).is_err());
    }
}
