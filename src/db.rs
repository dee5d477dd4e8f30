use sqlx::sqlite::{SqlitePoolOptions, SqlitePool};
use sqlx::Row;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::time::Duration;

/// Cache lifetimes per upstream source.
pub mod ttl {
    use std::time::Duration;

    pub const MARKET: Duration = Duration::from_secs(60);
    pub const INDICATORS: Duration = Duration::from_secs(300);
    pub const TREASURY: Duration = Duration::from_secs(300);
    pub const RSS: Duration = Duration::from_secs(600);
    pub const FEAR_GREED: Duration = Duration::from_secs(900);
    pub const ARXIV: Duration = Duration::from_secs(3600);
    pub const FRED: Duration = Duration::from_secs(3600);
}

pub async fn init(data_dir: &Path) -> Result<SqlitePool> {
    let cache_dir = data_dir.join("cache");
    tokio::fs::create_dir_all(&cache_dir).await?;

    let db_path = cache_dir.join("alpha_loop.db");
    let database_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());

    tracing::debug!("Connecting to SQLite cache: {}", database_url);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory pool (each sqlite memory connection is its own database).
pub async fn init_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub fn cache_key(parts: &[&str]) -> String {
    parts
        .join("_")
        .chars()
        .map(|c| match c {
            '=' | '^' | '-' | '.' | ' ' | '/' => '_',
            other => other,
        })
        .collect()
}

pub async fn get_cached<T: DeserializeOwned>(
    pool: &SqlitePool,
    key: &str,
    max_age: Duration,
) -> Result<Option<T>> {
    let row = sqlx::query("SELECT payload, fetched_at FROM fetch_cache WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let fetched_at: DateTime<Utc> = row.try_get("fetched_at")?;
    let age = Utc::now().signed_duration_since(fetched_at);
    let max_age = chrono::Duration::from_std(max_age)?;
    if age > max_age {
        return Ok(None);
    }

    let payload: String = row.try_get("payload")?;
    match serde_json::from_str(&payload) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!("Discarding corrupt cache entry {}: {}", key, e);
            Ok(None)
        }
    }
}

pub async fn set_cache<T: Serialize>(
    pool: &SqlitePool,
    key: &str,
    source: &str,
    value: &T,
) -> Result<()> {
    set_cache_at(pool, key, source, value, Utc::now()).await
}

pub async fn set_cache_at<T: Serialize>(
    pool: &SqlitePool,
    key: &str,
    source: &str,
    value: &T,
    fetched_at: DateTime<Utc>,
) -> Result<()> {
    let payload = serde_json::to_string(value)?;

    sqlx::query(
        "INSERT INTO fetch_cache (key, source, payload, fetched_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (key) DO UPDATE
         SET source = EXCLUDED.source, payload = EXCLUDED.payload, fetched_at = EXCLUDED.fetched_at",
    )
    .bind(key)
    .bind(source)
    .bind(payload)
    .bind(fetched_at)
    .execute(pool)
    .await?;

    Ok(())
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AiReportRow {
    pub id: i64,
    pub provider: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub preview: String,
}

pub async fn save_ai_report(pool: &SqlitePool, provider: &str, model: &str, content: &str) -> Result<i64> {
    let row = sqlx::query(
        "INSERT INTO ai_reports (provider, model, content, created_at) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(provider)
    .bind(model)
    .bind(content)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row.try_get("id")?)
}

pub async fn recent_ai_reports(pool: &SqlitePool, limit: i64) -> Result<Vec<AiReportRow>> {
    let rows = sqlx::query(
        "SELECT id, provider, model, content, created_at FROM ai_reports ORDER BY id DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut reports = Vec::with_capacity(rows.len());
    for row in rows {
        let content: String = row.try_get("content")?;
        reports.push(AiReportRow {
            id: row.try_get("id")?,
            provider: row.try_get("provider")?,
            model: row.try_get("model")?,
            created_at: row.try_get("created_at")?,
            preview: content.chars().take(120).collect(),
        });
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_sanitizes_symbols() {
        assert_eq!(cache_key(&["yahoo", "^TNX"]), "yahoo__TNX");
        assert_eq!(cache_key(&["yahoo", "DX-Y.NYB"]), "yahoo_DX_Y_NYB");
        assert_eq!(cache_key(&["arxiv", "AI Research"]), "arxiv_AI_Research");
        assert_eq!(cache_key(&["yahoo", "JPY=X"]), "yahoo_JPY_X");
    }

    #[tokio::test]
    async fn test_cache_roundtrip_and_expiry() {
        let pool = init_memory().await.unwrap();

        set_cache(&pool, "k", "test", &vec![1.0, 2.0]).await.unwrap();
        let hit: Option<Vec<f64>> = get_cached(&pool, "k", Duration::from_secs(60)).await.unwrap();
        assert_eq!(hit, Some(vec![1.0, 2.0]));

        let stale = Utc::now() - chrono::Duration::seconds(120);
        set_cache_at(&pool, "k", "test", &vec![3.0], stale).await.unwrap();
        let miss: Option<Vec<f64>> = get_cached(&pool, "k", Duration::from_secs(60)).await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_a_miss() {
        let pool = init_memory().await.unwrap();
        set_cache(&pool, "k", "test", &"text").await.unwrap();
        let wrong_shape: Option<Vec<f64>> = get_cached(&pool, "k", Duration::from_secs(60)).await.unwrap();
        assert!(wrong_shape.is_none());
    }

    #[tokio::test]
    async fn test_ai_report_history_newest_first() {
        let pool = init_memory().await.unwrap();
        save_ai_report(&pool, "openrouter", "model-a", "{\"a\":1}").await.unwrap();
        save_ai_report(&pool, "openrouter", "model-b", "{\"b\":2}").await.unwrap();

        let reports = recent_ai_reports(&pool, 10).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].model, "model-b");
        assert_eq!(reports[1].preview, "{\"a\":1}");
    }
}
