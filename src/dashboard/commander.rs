use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use super::{pointer_str, read_latest, DashboardId, Header};

pub const INTERNAL_SUMMARY: &str = "Risk shows the environment, crypto shows sentiment, macro shows the wind, \
breakthroughs show the future, strategy shows the stance, and knowledge shows the long-term signal: \
combine all six to guide the user clearly through today.";

#[derive(Debug, Clone, Default)]
pub struct SavedDashboards {
    pub shield: Option<Value>,
    pub coin: Option<Value>,
    pub strategy: Option<Value>,
}

impl SavedDashboards {
    pub async fn load(data_dir: &Path) -> Self {
        SavedDashboards {
            shield: read_latest(data_dir, DashboardId::Shield).await,
            coin: read_latest(data_dir, DashboardId::Coin).await,
            strategy: read_latest(data_dir, DashboardId::Strategy).await,
        }
    }

    fn risk(&self) -> String {
        pointer_str(self.shield.as_ref(), "/risk_assessment/level").unwrap_or_else(|| "UNKNOWN".into())
    }

    fn crypto(&self) -> String {
        pointer_str(self.coin.as_ref(), "/momentum").unwrap_or_else(|| "Neutral".into())
    }

    fn stance(&self) -> String {
        pointer_str(self.strategy.as_ref(), "/stance").unwrap_or_else(|| "Neutral".into())
    }
}

/// Data-only brief used when no AI synthesis is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MorningBrief {
    pub weather_of_the_day: String,
    pub top_signal: String,
    pub why_it_matters: String,
    pub cross_dashboard_convergence: String,
    pub action_stance: String,
    pub optional_deep_insight: String,
    pub clarity_level: String,
    pub summary_sentence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommanderDashboard {
    #[serde(flatten)]
    pub header: Header,
    pub timestamp: String,
    pub morning_brief: Value,
    pub internal_summary_sentence: String,
    pub apps_status: BTreeMap<String, String>,
}

pub fn weather(risk: &str, crypto: &str) -> &'static str {
    let risk = risk.to_uppercase();
    if risk == "CRITICAL" {
        "Stormy ⛈️"
    } else if risk == "LOW" && crypto.eq_ignore_ascii_case("bullish") {
        "Sunny ☀️"
    } else if risk == "ELEVATED" {
        "Foggy 🌫️"
    } else {
        "Cloudy ☁️"
    }
}

pub fn fallback_brief(saved: &SavedDashboards) -> MorningBrief {
    let (risk, crypto, stance) = (saved.risk(), saved.crypto(), saved.stance());

    MorningBrief {
        weather_of_the_day: weather(&risk, &crypto).to_string(),
        top_signal: format!("Risk Level: {}", risk),
        why_it_matters: "AI analysis is currently unavailable, but core market data has been updated. \
Check individual dashboards for specific metrics."
            .to_string(),
        cross_dashboard_convergence: format!(
            "Risk is {}, Crypto is {}, and Strategy suggests {}.",
            risk, crypto, stance
        ),
        action_stance: stance,
        optional_deep_insight: "System is operating in data-only mode. All feeds are active.".to_string(),
        clarity_level: "Medium".to_string(),
        summary_sentence: "Data feeds active. AI synthesis pending next scheduled run.".to_string(),
    }
}

pub fn build(saved: &SavedDashboards, ai_brief: Option<&Value>, now: DateTime<Utc>) -> CommanderDashboard {
    let morning_brief = match ai_brief {
        Some(brief) => brief.clone(),
        None => {
            tracing::info!("  No AI brief, using data-only fallback");
            serde_json::to_value(fallback_brief(saved)).unwrap_or(Value::Null)
        }
    };

    let apps_status = DashboardId::BUILD_ORDER
        .iter()
        .filter(|id| **id != DashboardId::Commander)
        .map(|id| (id.slug().to_string(), "active".to_string()))
        .collect();

    CommanderDashboard {
        header: Header::new(DashboardId::Commander, now),
        timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        morning_brief,
        internal_summary_sentence: INTERNAL_SUMMARY.to_string(),
        apps_status,
    }
}
