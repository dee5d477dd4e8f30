use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{round1, DashboardId, Header};
use crate::analysis::signals::{composite_risk, composite_score, determine_signal, RiskAssessment, RiskLevel, Signal, StressMetric};
use crate::core::store::DataStore;
use crate::llm::analysis::ShieldAnalysis;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: String,
    pub signal: Signal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldScoring {
    pub risk_level: i64,
    pub fragility: f64,
    pub volatility_pressure: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldDashboard {
    #[serde(flatten)]
    pub header: Header,
    pub scoring: ShieldScoring,
    pub risk_assessment: RiskAssessment,
    pub metrics: Vec<Metric>,
    pub ai_analysis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_concern: Option<String>,
}

fn stress_readings(store: &DataStore) -> Vec<(StressMetric, f64)> {
    [
        (StressMetric::BidToCover, store.bid_to_cover()),
        (StressMetric::UsdJpy, store.price("JPY")),
        (StressMetric::UsdCnh, store.price("CNH")),
        (StressMetric::TenYearYield, store.price("TNX")),
        (StressMetric::Move, store.price("MOVE")),
        (StressMetric::Vix, store.price("VIX")),
    ]
    .into_iter()
    .filter_map(|(metric, value)| value.map(|v| (metric, v)))
    .collect()
}

pub fn build(store: &DataStore, ai: Option<&ShieldAnalysis>, now: DateTime<Utc>) -> ShieldDashboard {
    let metrics: Vec<Metric> = stress_readings(store)
        .into_iter()
        .map(|(metric, value)| Metric {
            name: metric.label().to_string(),
            value: metric.format(value),
            signal: determine_signal(metric, value),
        })
        .collect();

    let signals: Vec<Signal> = metrics.iter().map(|m| m.signal).collect();
    let mut risk = composite_risk(&signals);

    if let Some(level) = ai.and_then(|a| a.risk_level.as_deref()) {
        let level = level.trim().to_uppercase();
        if !level.is_empty() {
            risk.color = match level.as_str() {
                "CRITICAL" => RiskLevel::Critical.color().to_string(),
                "ELEVATED" => RiskLevel::Elevated.color().to_string(),
                "LOW" => RiskLevel::Low.color().to_string(),
                _ => risk.color,
            };
            risk.level = level;
        }
    }

    let fragility = store
        .bid_to_cover()
        .map_or(5.0, |btc| (btc / 3.0 * 10.0).min(10.0));
    let volatility_pressure = store
        .price("MOVE")
        .map_or(5.0, |mv| (mv / 150.0 * 10.0).min(10.0));

    ShieldDashboard {
        header: Header::new(DashboardId::Shield, now),
        scoring: ShieldScoring {
            risk_level: composite_score(&signals).trunc() as i64,
            fragility: round1(fragility),
            volatility_pressure: round1(volatility_pressure),
        },
        risk_assessment: risk,
        metrics,
        ai_analysis: ai
            .and_then(|a| a.analysis.clone())
            .unwrap_or_else(|| "AI analysis unavailable".to_string()),
        top_concern: ai.and_then(|a| a.top_concern.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuctionResult;

    fn stressed_store() -> DataStore {
        let mut store = DataStore::new();
        store.prices.insert("JPY".into(), 156.0);
        store.prices.insert("VIX".into(), 14.0);
        store.prices.insert("MOVE".into(), 180.0);
        store.treasury = Some(AuctionResult {
            security_term: "10-Year".into(),
            security_type: "Note".into(),
            auction_date: Some("2025-01-08".into()),
            bid_to_cover_ratio: Some(2.1),
            high_yield: None,
            offering_amount: None,
        });
        store
    }

    #[test]
    fn test_metrics_and_composite() {
        let doc = build(&stressed_store(), None, Utc::now());

        // bid-to-cover HIGH 75, JPY CRITICAL 100, MOVE CRITICAL 100, VIX NORMAL 0
        assert_eq!(doc.metrics.len(), 4);
        assert_eq!(doc.metrics[0].value, "2.10x");
        assert_eq!(doc.risk_assessment.score, 68.8);
        assert_eq!(doc.risk_assessment.level, "CRITICAL");
        // 68.75 truncates, it is not rounded
        assert_eq!(doc.scoring.risk_level, 68);
        assert_eq!(doc.scoring.fragility, 7.0);
        assert_eq!(doc.scoring.volatility_pressure, 10.0);
        assert_eq!(doc.ai_analysis, "AI analysis unavailable");
    }

    #[test]
    fn test_ai_overrides_level() {
        let ai = ShieldAnalysis {
            analysis: Some("Funding stress is building.".into()),
            risk_level: Some("elevated".into()),
            top_concern: Some("Yen carry unwind".into()),
        };
        let doc = build(&stressed_store(), Some(&ai), Utc::now());
        assert_eq!(doc.risk_assessment.level, "ELEVATED");
        assert_eq!(doc.risk_assessment.color, "#ffc107");
        assert_eq!(doc.top_concern.as_deref(), Some("Yen carry unwind"));
    }

    #[test]
    fn test_empty_store_defaults() {
        let doc = build(&DataStore::new(), None, Utc::now());
        assert!(doc.metrics.is_empty());
        assert_eq!(doc.risk_assessment.level, "LOW");
        assert_eq!(doc.scoring.fragility, 5.0);
        assert_eq!(doc.scoring.volatility_pressure, 5.0);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["dashboard"], "the-shield");
        assert!(json.get("top_concern").is_none());
    }
}
