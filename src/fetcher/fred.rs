use async_trait::async_trait;
use crate::core::rate_limiter::RateLimiter;
use crate::db::{self, ttl};
use crate::error::FetchError;
use crate::models::{DataPoint, FetchResult};
use super::{cached, DataSource};
use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use chrono::{TimeZone, Utc};

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

/// 10Y, 2Y, Fed Funds, CPI
pub const MACRO_SERIES: [&str; 4] = ["DGS10", "DGS2", "FEDFUNDS", "CPIAUCSL"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MacroSnapshot {
    pub dgs10: Option<f64>,
    pub dgs2: Option<f64>,
    pub fed_funds: Option<f64>,
    pub cpi: Option<f64>,
}

impl MacroSnapshot {
    /// 10Y minus 2Y; negative means inverted.
    pub fn yield_curve(&self) -> Option<f64> {
        Some(self.dgs10? - self.dgs2?)
    }
}

pub struct FredFetcher {
    api_key: String,
    client: Client,
    pool: Option<SqlitePool>,
}

impl FredFetcher {
    pub fn new(api_key: String, pool: Option<SqlitePool>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("AlphaLoop/1.0"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { api_key, client, pool }
    }

    /// Latest value of each macro series. Missing series stay `None`.
    pub async fn fetch_macro_snapshot(&self) -> FetchResult<MacroSnapshot> {
        let mut snapshot = MacroSnapshot::default();
        let mut errors = Vec::new();

        for (i, series) in MACRO_SERIES.iter().enumerate() {
            if i > 0 {
                RateLimiter::wait("FRED").await;
            }
            let latest = match self.fetch_data(series).await {
                Ok(points) => points.last().map(|p| p.value),
                Err(e) => {
                    tracing::warn!("FRED {} failed: {}", series, e);
                    errors.push(format!("{}: {}", series, e));
                    None
                }
            };
            match *series {
                "DGS10" => snapshot.dgs10 = latest,
                "DGS2" => snapshot.dgs2 = latest,
                "FEDFUNDS" => snapshot.fed_funds = latest,
                _ => snapshot.cpi = latest,
            }
        }

        if errors.len() == MACRO_SERIES.len() {
            return FetchResult::failed("fred", errors.join("; "));
        }
        FetchResult::ok("fred", snapshot)
    }
}

#[async_trait]
impl DataSource for FredFetcher {
    fn name(&self) -> &str {
        "fred"
    }

    async fn fetch_data(&self, series_id: &str) -> Result<Vec<DataPoint>> {
        let sanitized_key = self.api_key.trim().to_string();
        if sanitized_key.is_empty() {
            return Err(FetchError::MissingKey("FRED_API_KEY").into());
        }

        let key = db::cache_key(&["fred", series_id]);
        cached(self.pool.as_ref(), &key, "fred", ttl::FRED, || async {
            // Five years is enough for every consumer
            let start = (Utc::now() - chrono::Duration::days(365 * 5)).format("%Y-%m-%d");
            let url = format!(
                "https://api.stlouisfed.org/fred/series/observations?series_id={}&api_key={}&file_type=json&observation_start={}",
                series_id, sanitized_key, start
            );

            let resp = self.client.get(&url).send().await?;

            if !resp.status().is_success() {
                let status = resp.status();
                let error_text = resp.text().await.unwrap_or_default();
                return Err(anyhow!("FRED API Error: {} - Body: {}", status, error_text));
            }

            let json: Value = resp.json().await?;
            Self::parse_observations(&json)
        })
        .await
    }
}

impl FredFetcher {
    fn parse_observations(json: &Value) -> Result<Vec<DataPoint>> {
        let observations = json["observations"]
            .as_array()
            .ok_or_else(|| anyhow!("No observations found in FRED response"))?;

        let mut data_points = Vec::new();

        for obs in observations {
            if let (Some(date_str), Some(value_str)) = (obs["date"].as_str(), obs["value"].as_str()) {
                // "." marks a missing observation
                if value_str == "." {
                    continue;
                }

                if let Ok(value) = value_str.parse::<f64>() {
                    let naive_date = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")?;
                    let Some(midnight) = naive_date.and_hms_opt(0, 0, 0) else {
                        continue;
                    };
                    data_points.push(DataPoint {
                        timestamp: Utc.from_utc_datetime(&midnight),
                        value,
                    });
                }
            }
        }

        Ok(data_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_response() {
        let json_data = json!({
            "observations": [
                { "date": "2023-01-01", "value": "123.45" },
                { "date": "2023-01-02", "value": "124.56" }
            ]
        });

        let points = FredFetcher::parse_observations(&json_data).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, 123.45);
        assert_eq!(points[1].value, 124.56);
    }

    #[test]
    fn test_parse_missing_value() {
        let json_data = json!({
            "observations": [
                { "date": "2023-01-01", "value": "." },
                { "date": "2023-01-02", "value": "100.0" }
            ]
        });

        let points = FredFetcher::parse_observations(&json_data).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 100.0);
    }

    #[test]
    fn test_parse_invalid_format() {
        let json_data = json!({ "error": "bad request" });
        let result = FredFetcher::parse_observations(&json_data);
        assert!(result.is_err());
    }

    #[test]
    fn test_yield_curve() {
        let snap = MacroSnapshot { dgs10: Some(4.25), dgs2: Some(4.5), ..Default::default() };
        assert!((snap.yield_curve().unwrap() + 0.25).abs() < 1e-12);
        assert!(MacroSnapshot::default().yield_curve().is_none());
    }

    #[tokio::test]
    async fn test_empty_key_rejected_without_network() {
        let fetcher = FredFetcher::new("   ".to_string(), None);
        let err = fetcher.fetch_data("DGS10").await.unwrap_err();
        assert!(err.to_string().contains("FRED_API_KEY"));
    }
}
