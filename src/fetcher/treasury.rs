use crate::db::{self, ttl};
use crate::error::FetchError;
use crate::models::{AuctionResult, FetchResult};
use super::{cached, http_client};
use anyhow::{Result, anyhow};
use reqwest::Client;
use serde_json::Value;
use sqlx::SqlitePool;
use std::time::Duration;

const SOURCE: &str = "treasury";
const AUCTIONS_URL: &str =
    "https://api.fiscaldata.treasury.gov/services/api/fiscal_service/v1/accounting/od/auctions_query";

pub struct TreasuryFetcher {
    client: Client,
    pool: Option<SqlitePool>,
}

impl TreasuryFetcher {
    pub fn new(pool: Option<SqlitePool>) -> Self {
        Self {
            client: http_client(Duration::from_secs(10)),
            pool,
        }
    }

    /// Most recent auction for a security, e.g. `("10-Year", "Note")`.
    pub async fn fetch_latest_auction(&self, term: &str, security_type: &str) -> FetchResult<AuctionResult> {
        let key = db::cache_key(&[SOURCE, term, security_type]);
        let res = cached(self.pool.as_ref(), &key, SOURCE, ttl::TREASURY, || async {
            let filter = format!("security_term:eq:{},security_type:eq:{}", term, security_type);
            let resp = self.client
                .get(AUCTIONS_URL)
                .query(&[("filter", filter.as_str()), ("sort", "-auction_date"), ("page[size]", "1")])
                .send()
                .await?;

            if !resp.status().is_success() {
                return Err(FetchError::Status { source_name: "Treasury".into(), status: resp.status().as_u16() }.into());
            }

            let json: Value = resp.json().await?;
            Self::parse_auction(&json, term, security_type)?
                .ok_or_else(|| anyhow!(FetchError::NoData(format!("{} {} auctions", term, security_type))))
        })
        .await;

        match res {
            Ok(auction) => FetchResult::ok(SOURCE, auction),
            Err(e) => {
                tracing::warn!("  Failed treasury data: {}", e);
                FetchResult::failed(SOURCE, e)
            }
        }
    }

    fn parse_auction(json: &Value, term: &str, security_type: &str) -> Result<Option<AuctionResult>> {
        let rows = json["data"]
            .as_array()
            .ok_or_else(|| anyhow!(FetchError::Parse("Treasury".into())))?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        Ok(Some(AuctionResult {
            security_term: row["security_term"].as_str().unwrap_or(term).to_string(),
            security_type: row["security_type"].as_str().unwrap_or(security_type).to_string(),
            auction_date: row["auction_date"].as_str().map(str::to_string),
            bid_to_cover_ratio: parse_number(&row["bid_to_cover_ratio"]),
            high_yield: parse_number(&row["high_yield"]),
            offering_amount: parse_number(&row["offering_amt"]),
        }))
    }
}

/// The fiscal data API encodes numbers as strings and missing values as `"null"`.
fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_latest_auction() {
        let json_data = json!({
            "data": [{
                "auction_date": "2025-01-08",
                "security_term": "10-Year",
                "security_type": "Note",
                "bid_to_cover_ratio": "2.53",
                "high_yield": "4.680",
                "offering_amt": "39000000000"
            }]
        });

        let auction = TreasuryFetcher::parse_auction(&json_data, "10-Year", "Note").unwrap().unwrap();
        assert_eq!(auction.auction_date.as_deref(), Some("2025-01-08"));
        assert_eq!(auction.bid_to_cover_ratio, Some(2.53));
        assert_eq!(auction.high_yield, Some(4.68));
        assert_eq!(auction.offering_amount, Some(39_000_000_000.0));
    }

    #[test]
    fn test_null_strings_become_none() {
        let json_data = json!({
            "data": [{ "auction_date": "2025-02-11", "bid_to_cover_ratio": "null" }]
        });

        let auction = TreasuryFetcher::parse_auction(&json_data, "10-Year", "Note").unwrap().unwrap();
        assert_eq!(auction.bid_to_cover_ratio, None);
        assert_eq!(auction.security_term, "10-Year");
    }

    #[test]
    fn test_empty_data() {
        let json_data = json!({ "data": [] });
        assert!(TreasuryFetcher::parse_auction(&json_data, "10-Year", "Note").unwrap().is_none());
    }

    #[test]
    fn test_missing_data_key_is_error() {
        let json_data = json!({ "error": "bad filter" });
        assert!(TreasuryFetcher::parse_auction(&json_data, "10-Year", "Note").is_err());
    }
}
