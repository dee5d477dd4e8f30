use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{DashboardId, Header};
use crate::core::store::DataStore;
use crate::llm::analysis::{Breakthrough, FrontierAnalysis};
use crate::models::ResearchDomain;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierScoring {
    pub breakthrough_score: f64,
    pub trajectory: f64,
    pub future_pull: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierDashboard {
    #[serde(flatten)]
    pub header: Header,
    pub scoring: FrontierScoring,
    pub domains: BTreeMap<String, ResearchDomain>,
    pub breakthroughs: Vec<Breakthrough>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<String>,
    pub ai_analysis: String,
}

fn breakthrough_score(count: usize) -> f64 {
    if count == 0 {
        5.0
    } else {
        f64::min(10.0, 2.0 * count as f64)
    }
}

pub fn build(store: &DataStore, ai: Option<&FrontierAnalysis>, now: DateTime<Utc>) -> FrontierDashboard {
    let breakthroughs = ai.map(|a| a.breakthroughs.clone()).unwrap_or_default();

    FrontierDashboard {
        header: Header::new(DashboardId::Frontier, now),
        scoring: FrontierScoring {
            breakthrough_score: breakthrough_score(breakthroughs.len()),
            trajectory: 8.5,
            future_pull: 7.0,
        },
        domains: store.arxiv.clone(),
        breakthroughs,
        velocity: ai.and_then(|a| a.velocity.clone()),
        ai_analysis: ai
            .and_then(|a| a.analysis.clone())
            .unwrap_or_else(|| "AI analysis unavailable".to_string()),
    }
}
