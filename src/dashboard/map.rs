use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DashboardId, Header};
use crate::core::store::DataStore;
use crate::llm::analysis::MapAnalysis;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroValues {
    pub oil: Option<f64>,
    pub dxy: Option<f64>,
    pub gold: Option<f64>,
    pub sp500: Option<f64>,
    pub tasi: Option<f64>,
    pub treasury_10y: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapScoring {
    /// TASI mood as 8 / 5 / 3
    pub stance_strength: f64,
    pub volatility_risk: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDashboard {
    #[serde(flatten)]
    pub header: Header,
    pub scoring: MapScoring,
    #[serde(rename = "macro")]
    pub macro_values: MacroValues,
    pub tasi_mood: String,
    pub drivers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasi_forecast: Option<String>,
    pub ai_analysis: String,
}

fn mood_score(mood: &str) -> f64 {
    match mood.trim().to_lowercase().as_str() {
        "positive" => 8.0,
        "negative" => 3.0,
        _ => 5.0,
    }
}

fn volatility_risk(tnx: Option<f64>, oil: Option<f64>) -> f64 {
    let mut risk = 5.0;
    if tnx.is_some_and(|y| y > 4.5) {
        risk += 2.0;
    }
    if oil.is_some_and(|o| o > 90.0) {
        risk += 1.0;
    }
    f64::min(risk, 10.0)
}

pub fn build(store: &DataStore, ai: Option<&MapAnalysis>, now: DateTime<Utc>) -> MapDashboard {
    let macro_values = MacroValues {
        oil: store.price("OIL"),
        dxy: store.price("DXY"),
        gold: store.price("GOLD"),
        sp500: store.price("SP500"),
        tasi: store.price("TASI"),
        treasury_10y: store.price("TNX"),
    };

    let tasi_mood = ai
        .and_then(|a| a.tasi_mood.clone())
        .unwrap_or_else(|| "Neutral".to_string());

    MapDashboard {
        header: Header::new(DashboardId::Map, now),
        scoring: MapScoring {
            stance_strength: mood_score(&tasi_mood),
            volatility_risk: volatility_risk(macro_values.treasury_10y, macro_values.oil),
            confidence: 0.85,
        },
        macro_values,
        tasi_mood,
        drivers: ai.map(|a| a.drivers.clone()).unwrap_or_default(),
        tasi_forecast: ai.and_then(|a| a.tasi_forecast.clone()),
        ai_analysis: ai
            .and_then(|a| a.analysis.clone())
            .unwrap_or_else(|| "Analysis temporarily unavailable".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatility_risk() {
        assert_eq!(volatility_risk(None, None), 5.0);
        assert_eq!(volatility_risk(Some(4.6), Some(95.0)), 8.0);
        assert_eq!(volatility_risk(Some(4.5), Some(90.0)), 5.0);
    }

    #[test]
    fn test_mood_drives_stance_strength() {
        let mut store = DataStore::new();
        store.prices.insert("OIL".into(), 92.5);
        store.prices.insert("TNX".into(), 4.1);

        let ai = MapAnalysis {
            tasi_mood: Some("Positive".into()),
            drivers: vec!["Oil".into(), "Rates".into()],
            ..Default::default()
        };
        let doc = build(&store, Some(&ai), Utc::now());
        assert_eq!(doc.scoring.stance_strength, 8.0);
        assert_eq!(doc.scoring.volatility_risk, 6.0);
        assert_eq!(doc.drivers.len(), 2);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["macro"]["oil"], 92.5);
        assert_eq!(json["macro"]["treasury_10y"], 4.1);
        assert!(json["macro"]["gold"].is_null());
    }

    #[test]
    fn test_defaults_without_ai() {
        let doc = build(&DataStore::new(), None, Utc::now());
        assert_eq!(doc.tasi_mood, "Neutral");
        assert_eq!(doc.scoring.stance_strength, 5.0);
        assert_eq!(doc.scoring.confidence, 0.85);
        assert!(doc.drivers.is_empty());
    }
}
