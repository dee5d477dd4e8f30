use crate::analysis::CryptoIndicators;
use crate::db::{self, ttl};
use crate::models::{Candle, DataPoint, FetchResult};
use super::{cached, DataSource};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{Utc, TimeZone};
use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use std::collections::HashMap;
use yahoo_finance_api as yahoo;
use time::OffsetDateTime;

const SOURCE: &str = "yahoo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Daily,
    Weekly,
}

impl Interval {
    fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
        }
    }
}

pub struct YahooFetcher {
    pool: Option<SqlitePool>,
}

impl YahooFetcher {
    pub fn new() -> Self {
        YahooFetcher { pool: None }
    }

    pub fn with_cache(pool: SqlitePool) -> Self {
        YahooFetcher { pool: Some(pool) }
    }

    fn connector() -> Result<yahoo::YahooConnector> {
        yahoo::YahooConnector::new().map_err(|e| anyhow!("Failed to init Yahoo Connector: {}", e))
    }

    /// Latest traded price, falling back to the last daily close of the past week.
    pub async fn fetch_price(&self, symbol: &str) -> Result<f64> {
        let key = db::cache_key(&[SOURCE, "price", symbol]);
        cached(self.pool.as_ref(), &key, SOURCE, ttl::MARKET, || async {
            let provider = Self::connector()?;

            let latest = match provider.get_latest_quotes(symbol, "1d").await {
                Ok(resp) => resp.last_quote().ok().map(|q| q.close),
                Err(e) => {
                    tracing::debug!("Latest quote failed for {}: {}", symbol, e);
                    None
                }
            };

            match latest.filter(|p| p.is_finite() && *p > 0.0) {
                Some(price) => Ok(price),
                None => {
                    let candles = self.fetch_history_uncached(symbol, Interval::Daily, 7).await?;
                    candles
                        .last()
                        .map(|c| c.close)
                        .ok_or_else(|| anyhow!("No price returned for symbol: {}", symbol))
                }
            }
        })
        .await
    }

    /// Prices for `(key, symbol)` pairs, fetched concurrently. Failed symbols are absent.
    pub async fn fetch_prices(
        &self,
        tickers: &[(&str, &str)],
        max_parallel: usize,
    ) -> FetchResult<HashMap<String, f64>> {
        let owned: Vec<(String, String)> = tickers.iter().map(|(k, s)| (k.to_string(), s.to_string())).collect();
        let results: Vec<(String, Result<f64>)> = stream::iter(owned)
            .map(|(key, symbol): (String, String)| async move {
                tracing::info!("  Fetching {} ({})...", key, symbol);
                let price = self.fetch_price(&symbol).await;
                (key, price)
            })
            .buffer_unordered(max_parallel.max(1))
            .collect()
            .await;

        let mut prices = HashMap::new();
        let mut failed = Vec::new();
        for (key, res) in results {
            match res {
                Ok(price) => {
                    prices.insert(key, price);
                }
                Err(e) => {
                    tracing::warn!("  Failed {}: {}", key, e);
                    failed.push(key);
                }
            }
        }

        if prices.is_empty() && !tickers.is_empty() {
            return FetchResult::failed(SOURCE, "No market prices could be fetched");
        }
        let mut result = FetchResult::ok(SOURCE, prices);
        if !failed.is_empty() {
            failed.sort();
            result.error = Some(format!("missing: {}", failed.join(", ")));
        }
        result
    }

    pub async fn fetch_history(&self, symbol: &str, interval: Interval, days: i64) -> Result<Vec<Candle>> {
        let key = db::cache_key(&[SOURCE, "history", interval.as_str(), &days.to_string(), symbol]);
        cached(self.pool.as_ref(), &key, SOURCE, ttl::INDICATORS, || {
            self.fetch_history_uncached(symbol, interval, days)
        })
        .await
    }

    async fn fetch_history_uncached(&self, symbol: &str, interval: Interval, days: i64) -> Result<Vec<Candle>> {
        let provider = Self::connector()?;

        let now = OffsetDateTime::now_utc();
        let start = now - time::Duration::days(days);

        let resp = provider
            .get_quote_history_interval(symbol, start, now, interval.as_str())
            .await
            .map_err(|e| anyhow!("Yahoo API Error: {}", e))?;

        let quotes = resp.quotes()
            .map_err(|e| anyhow!("Failed to parse Yahoo quotes: {}", e))?;

        let mut candles: Vec<Candle> = quotes
            .into_iter()
            .filter(|q| q.close.is_finite() && q.close > 0.0)
            .filter_map(|q| {
                let timestamp = Utc.timestamp_opt(q.timestamp as i64, 0).single()?;
                Some(Candle {
                    timestamp,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                })
            })
            .collect();

        if candles.is_empty() {
            return Err(anyhow!("No data returned for symbol: {}", symbol));
        }

        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }

    /// Five years of weekly closes reduced to the latest indicator row.
    pub async fn fetch_with_indicators(&self, symbol: &str) -> FetchResult<CryptoIndicators> {
        match self.fetch_history(symbol, Interval::Weekly, 365 * 5).await {
            Ok(candles) => {
                let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
                match CryptoIndicators::from_closes(&closes) {
                    Some(ind) => FetchResult::ok(SOURCE, ind),
                    None => FetchResult::failed(SOURCE, format!("No closes for {}", symbol)),
                }
            }
            Err(e) => FetchResult::failed(SOURCE, e),
        }
    }
}

#[async_trait]
impl DataSource for YahooFetcher {
    fn name(&self) -> &str {
        "Yahoo"
    }

    /// One year of daily closes.
    async fn fetch_data(&self, symbol: &str) -> Result<Vec<DataPoint>> {
        let candles = self.fetch_history(symbol, Interval::Daily, 365).await?;
        Ok(candles
            .into_iter()
            .map(|c| DataPoint { timestamp: c.timestamp, value: c.close })
            .collect())
    }
}
