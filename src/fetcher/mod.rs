use async_trait::async_trait;
use anyhow::Result;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;
use std::future::Future;
use std::time::Duration;

use crate::db;
use crate::models::DataPoint;

pub mod fred;
pub mod yahoo;
pub mod treasury;
pub mod alternative;
pub mod news;
pub mod arxiv;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_data(&self, series_id: &str) -> Result<Vec<DataPoint>>;
}

pub fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Serve `key` from the cache when fresh, otherwise run `fetch` and store its result.
/// Cache failures are logged and never mask a successful fetch.
pub async fn cached<T, F, Fut>(
    pool: Option<&SqlitePool>,
    key: &str,
    source: &str,
    ttl: Duration,
    fetch: F,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if let Some(pool) = pool {
        match db::get_cached::<T>(pool, key, ttl).await {
            Ok(Some(hit)) => {
                tracing::debug!("Cache hit: {}", key);
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Cache read failed for {}: {}", key, e),
        }
    }

    let value = fetch().await?;

    if let Some(pool) = pool {
        if let Err(e) = db::set_cache(pool, key, source, &value).await {
            tracing::warn!("Cache write failed for {}: {}", key, e);
        }
    }
    Ok(value)
}
