use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::{pointer_str, read_latest, DashboardId, Header};
use crate::llm::analysis::StrategyAnalysis;

/// Upstream documents as last written to disk.
#[derive(Debug, Clone, Default)]
pub struct SavedInputs {
    pub shield: Option<Value>,
    pub coin: Option<Value>,
    pub map: Option<Value>,
}

impl SavedInputs {
    pub async fn load(data_dir: &Path) -> Self {
        SavedInputs {
            shield: read_latest(data_dir, DashboardId::Shield).await,
            coin: read_latest(data_dir, DashboardId::Coin).await,
            map: read_latest(data_dir, DashboardId::Map).await,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StanceInputs {
    pub risk: String,
    pub crypto: String,
    #[serde(rename = "macro")]
    pub macro_mood: String,
    pub frontier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyScoring {
    pub stance_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDashboard {
    #[serde(flatten)]
    pub header: Header,
    pub scoring: StrategyScoring,
    pub stance: String,
    pub mindset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conviction: Option<String>,
    pub inputs: StanceInputs,
    pub ai_analysis: String,
}

fn stance_confidence(stance: &str) -> f64 {
    match stance.trim().to_lowercase().as_str() {
        "aggressive" => 9.0,
        "accumulative" => 7.0,
        "defensive" => 3.0,
        _ => 5.0,
    }
}

pub fn build(saved: &SavedInputs, ai: Option<&StrategyAnalysis>, now: DateTime<Utc>) -> StrategyDashboard {
    let inputs = StanceInputs {
        risk: pointer_str(saved.shield.as_ref(), "/risk_assessment/level").unwrap_or_else(|| "LOW".into()),
        crypto: pointer_str(saved.coin.as_ref(), "/momentum").unwrap_or_else(|| "Neutral".into()),
        macro_mood: pointer_str(saved.map.as_ref(), "/tasi_mood").unwrap_or_else(|| "Neutral".into()),
        frontier: "Active".to_string(),
    };

    let stance = ai
        .and_then(|a| a.stance.clone())
        .unwrap_or_else(|| "Neutral".to_string());

    StrategyDashboard {
        header: Header::new(DashboardId::Strategy, now),
        scoring: StrategyScoring {
            stance_confidence: stance_confidence(&stance),
        },
        stance,
        mindset: ai
            .and_then(|a| a.mindset.clone())
            .unwrap_or_else(|| "Wait for clarity".to_string()),
        conviction: ai.and_then(|a| a.conviction.clone()),
        inputs,
        ai_analysis: ai
            .and_then(|a| a.analysis.clone())
            .unwrap_or_else(|| "Analysis temporarily unavailable".to_string()),
    }
}
