use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DashboardId, Header};
use crate::analysis::technicals::Trend;
use crate::core::store::DataStore;
use crate::llm::analysis::CoinAnalysis;
use crate::models::FearGreed;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FearGreedView {
    pub value: i64,
    pub classification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinScoring {
    #[serde(rename = "momentum")]
    pub momentum_strength: f64,
    #[serde(rename = "rotation_strength")]
    pub rotation_signal: f64,
    pub setup_quality: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinDashboard {
    #[serde(flatten)]
    pub header: Header,
    pub scoring: CoinScoring,
    pub btc_price: Option<f64>,
    pub eth_price: Option<f64>,
    pub momentum: String,
    pub rsi: Option<f64>,
    pub trend: Option<Trend>,
    pub fear_and_greed: FearGreedView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_level: Option<String>,
    pub ai_analysis: String,
}

/// 5 baseline, +2 bullish weekly trend, +1 RSI above 60, +1 greed above 60.
fn momentum_strength(trend: Option<Trend>, rsi: Option<f64>, fng: i64) -> f64 {
    let mut score = 5.0;
    if trend == Some(Trend::Bullish) {
        score += 2.0;
    }
    if rsi.is_some_and(|r| r > 60.0) {
        score += 1.0;
    }
    if fng > 60 {
        score += 1.0;
    }
    f64::min(score, 10.0)
}

pub fn build(store: &DataStore, ai: Option<&CoinAnalysis>, now: DateTime<Utc>) -> CoinDashboard {
    let btc = store.btc();
    let fng = store.fear_greed.clone().unwrap_or_else(FearGreed::neutral);
    let trend = btc.map(|b| b.trend);
    let rsi = btc.and_then(|b| b.rsi).map(|r| (r * 100.0).round() / 100.0);

    CoinDashboard {
        header: Header::new(DashboardId::Coin, now),
        scoring: CoinScoring {
            momentum_strength: momentum_strength(trend, rsi, fng.value),
            rotation_signal: 5.0,
            setup_quality: 6.5,
        },
        btc_price: store.price("BTC").or_else(|| btc.map(|b| b.price)),
        eth_price: store.price("ETH").or_else(|| store.eth().map(|e| e.price)),
        momentum: ai
            .and_then(|a| a.momentum.clone())
            .unwrap_or_else(|| "Neutral".to_string()),
        rsi,
        trend,
        fear_and_greed: FearGreedView {
            value: fng.value,
            classification: fng.classification,
        },
        key_level: ai.and_then(|a| a.key_level.clone()),
        ai_analysis: ai
            .and_then(|a| a.analysis.clone())
            .unwrap_or_else(|| "Analysis temporarily unavailable".to_string()),
    }
}
