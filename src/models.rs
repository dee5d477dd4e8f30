use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};

/// Uniform envelope returned by every fetcher.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FetchResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub source: String,
    pub fetched_at: String,
    pub error: Option<String>,
}

impl<T> FetchResult<T> {
    pub fn ok(source: &str, data: T) -> Self {
        FetchResult {
            success: true,
            data: Some(data),
            source: source.to_string(),
            fetched_at: Utc::now().to_rfc3339(),
            error: None,
        }
    }

    pub fn failed(source: &str, error: impl ToString) -> Self {
        FetchResult {
            success: false,
            data: None,
            source: source.to_string(),
            fetched_at: Utc::now().to_rfc3339(),
            error: Some(error.to_string()),
        }
    }

    /// Failure that still carries a usable fallback payload.
    pub fn failed_with(source: &str, error: impl ToString, fallback: T) -> Self {
        FetchResult {
            data: Some(fallback),
            ..Self::failed(source, error)
        }
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FearGreed {
    pub value: i64,
    pub classification: String,
    pub timestamp: Option<String>,
}

impl FearGreed {
    pub fn neutral() -> Self {
        FearGreed {
            value: 50,
            classification: "Neutral".to_string(),
            timestamp: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuctionResult {
    pub security_term: String,
    pub security_type: String,
    pub auction_date: Option<String>,
    pub bid_to_cover_ratio: Option<f64>,
    pub high_yield: Option<f64>,
    pub offering_amount: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Article {
    pub title: String,
    pub source: String,
    pub url: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Paper {
    pub title: String,
    pub summary: String,
    pub date: String,
    pub link: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResearchDomain {
    pub total_volume: u64,
    pub recent_papers: Vec<Paper>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_with_keeps_fallback() {
        let res = FetchResult::failed_with("alternative.me", "timeout", FearGreed::neutral());
        assert!(!res.success);
        assert_eq!(res.error.as_deref(), Some("timeout"));
        assert_eq!(res.data.unwrap().value, 50);
    }

    #[test]
    fn test_article_serializes_camel_case_date() {
        let article = Article {
            title: "Rates".into(),
            source: "Wire".into(),
            url: None,
            published_at: Some("Mon, 01 Jan 2024".into()),
        };
        let json = serde_json::to_value(&article).unwrap();
        assert_eq!(json["publishedAt"], "Mon, 01 Jan 2024");
    }
}
