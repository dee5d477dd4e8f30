use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A wrongly typed field falls back to its default instead of failing the section.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Scalars are kept as text; arrays, objects and null are dropped.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldAnalysis {
    #[serde(deserialize_with = "lenient_text")]
    pub analysis: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub risk_level: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub top_concern: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinAnalysis {
    #[serde(deserialize_with = "lenient_text")]
    pub analysis: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub momentum: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub key_level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapAnalysis {
    #[serde(deserialize_with = "lenient_text")]
    pub analysis: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub tasi_mood: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub drivers: Vec<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub tasi_forecast: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Breakthrough {
    #[serde(deserialize_with = "lenient")]
    pub title: String,
    #[serde(deserialize_with = "lenient")]
    pub why_it_matters: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontierAnalysis {
    #[serde(deserialize_with = "lenient_text")]
    pub analysis: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub breakthroughs: Vec<Breakthrough>,
    #[serde(deserialize_with = "lenient_text")]
    pub velocity: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyAnalysis {
    #[serde(deserialize_with = "lenient_text")]
    pub analysis: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub stance: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub mindset: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub conviction: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KnowledgeSummary {
    #[serde(deserialize_with = "lenient")]
    pub title: String,
    #[serde(deserialize_with = "lenient")]
    pub eli5: String,
    #[serde(deserialize_with = "lenient")]
    pub long_term: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryAnalysis {
    #[serde(deserialize_with = "lenient_text")]
    pub analysis: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub summaries: Vec<KnowledgeSummary>,
    #[serde(deserialize_with = "lenient_text")]
    pub knowledge_velocity: Option<String>,
}

/// Per-dashboard sections of the unified response. A section that is
/// missing or malformed is `None`; the others still apply.
#[derive(Debug, Clone, Default)]
pub struct UnifiedAnalysis {
    pub model: Option<String>,
    pub shield: Option<ShieldAnalysis>,
    pub coin: Option<CoinAnalysis>,
    pub map: Option<MapAnalysis>,
    pub frontier: Option<FrontierAnalysis>,
    pub strategy: Option<StrategyAnalysis>,
    pub library: Option<LibraryAnalysis>,
    /// Passed through verbatim as the commander's morning brief
    pub commander: Option<Value>,
}

fn section<T: DeserializeOwned>(root: &Value, key: &str) -> Option<T> {
    let value = root.get(key)?;
    if !value.is_object() {
        tracing::warn!("  AI section '{}' is not an object, ignoring", key);
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!("  AI section '{}' malformed: {}", key, e);
            None
        }
    }
}

impl UnifiedAnalysis {
    pub fn from_value(model: Option<String>, root: &Value) -> Self {
        UnifiedAnalysis {
            model,
            shield: section(root, "the_shield"),
            coin: section(root, "the_coin"),
            map: section(root, "the_map"),
            frontier: section(root, "the_frontier"),
            strategy: section(root, "the_strategy"),
            library: section(root, "the_library"),
            commander: root.get("the_commander").filter(|v| v.is_object()).cloned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shield.is_none()
            && self.coin.is_none()
            && self.map.is_none()
            && self.frontier.is_none()
            && self.strategy.is_none()
            && self.library.is_none()
            && self.commander.is_none()
    }
}
