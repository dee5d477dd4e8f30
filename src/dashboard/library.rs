use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DashboardId, Header};
use crate::llm::analysis::{KnowledgeSummary, LibraryAnalysis};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryScoring {
    pub progress_rate: f64,
    pub uncertainty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDashboard {
    #[serde(flatten)]
    pub header: Header,
    pub scoring: LibraryScoring,
    pub summaries: Vec<KnowledgeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_velocity: Option<String>,
    pub ai_analysis: String,
}

pub fn build(ai: Option<&LibraryAnalysis>, now: DateTime<Utc>) -> LibraryDashboard {
    LibraryDashboard {
        header: Header::new(DashboardId::Library, now),
        scoring: LibraryScoring {
            progress_rate: 65.0,
            uncertainty: 0.2,
        },
        summaries: ai.map(|a| a.summaries.clone()).unwrap_or_default(),
        knowledge_velocity: ai.and_then(|a| a.knowledge_velocity.clone()),
        ai_analysis: ai
            .and_then(|a| a.analysis.clone())
            .unwrap_or_else(|| "Analysis temporarily unavailable".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summaries_from_ai() {
        let ai = LibraryAnalysis {
            analysis: Some("Compute keeps compounding.".into()),
            summaries: vec![KnowledgeSummary {
                title: "Error-corrected qubits".into(),
                eli5: "Qubits that fix their own mistakes".into(),
                long_term: "Useful quantum machines".into(),
            }],
            knowledge_velocity: None,
        };
        let doc = build(Some(&ai), Utc::now());
        assert_eq!(doc.summaries.len(), 1);
        assert_eq!(doc.ai_analysis, "Compute keeps compounding.");
        assert_eq!(doc.scoring.progress_rate, 65.0);
    }
}
