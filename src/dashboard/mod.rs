//! The seven dashboard documents and their on-disk layout.
//!
//! Each dashboard lives in `<data_dir>/<slug>/latest.json`. Strategy and
//! Commander are built last and read the documents saved before them.

pub mod shield;
pub mod coin;
pub mod map;
pub mod frontier;
pub mod library;
pub mod strategy;
pub mod commander;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::store::DataStore;
use crate::llm::analysis::UnifiedAnalysis;

pub const LAST_UPDATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";
pub const SHIELD_HISTORY_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DashboardId {
    Shield,
    Coin,
    Map,
    Frontier,
    Library,
    Strategy,
    Commander,
}

impl DashboardId {
    /// Strategy and Commander depend on what is saved before them.
    pub const BUILD_ORDER: [DashboardId; 7] = [
        DashboardId::Shield,
        DashboardId::Coin,
        DashboardId::Map,
        DashboardId::Frontier,
        DashboardId::Library,
        DashboardId::Strategy,
        DashboardId::Commander,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            DashboardId::Shield => "the-shield",
            DashboardId::Coin => "the-coin",
            DashboardId::Map => "the-map",
            DashboardId::Frontier => "the-frontier",
            DashboardId::Library => "the-library",
            DashboardId::Strategy => "the-strategy",
            DashboardId::Commander => "the-commander",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DashboardId::Shield => "The Shield",
            DashboardId::Coin => "The Coin",
            DashboardId::Map => "The Map",
            DashboardId::Frontier => "The Frontier",
            DashboardId::Library => "The Library",
            DashboardId::Strategy => "The Strategy",
            DashboardId::Commander => "The Commander",
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            DashboardId::Shield => "Risk Environment",
            DashboardId::Coin => "Crypto Intent",
            DashboardId::Map => "Macro",
            DashboardId::Frontier => "AI & Breakthroughs",
            DashboardId::Library => "Free Knowledge",
            DashboardId::Strategy => "Market Stance",
            DashboardId::Commander => "Master Orchestrator",
        }
    }

    pub fn mission(&self) -> &'static str {
        match self {
            DashboardId::Shield => "Detect global risk pressure, cross-asset stress, volatility clusters, and fragility vectors.",
            DashboardId::Coin => "Track BTC → Alts rotation, detect fakeouts, measure liquidity migration, and infer sentiment momentum.",
            DashboardId::Map => "Extract hawkish/dovish tone, forward pressure, rate path, and macro wind direction.",
            DashboardId::Frontier => "Monitor breakthroughs in AI, robotics, compute, quantum, and science acceleration.",
            DashboardId::Library => "Compute the daily human advancement rate, track breakthroughs, and signal long-term trajectory.",
            DashboardId::Strategy => "Read the market context, interpret cross-domain vectors, and determine today's stance.",
            DashboardId::Commander => "Combine all dashboards using waterfall loading logic to produce the final unified assessment.",
        }
    }

    pub fn data_sources(&self) -> &'static [&'static str] {
        match self {
            DashboardId::Shield => &["global_risk", "volatility_matrix", "liquidity_fragility"],
            DashboardId::Coin => &["orderflow", "dominance_tracker", "liquidity_shift"],
            DashboardId::Map => &["fed_speech_parser", "inflation_nowcast", "curve_shift"],
            DashboardId::Frontier => &["ai_rnd", "quantum", "robotics"],
            DashboardId::Library => &["ai_rnd_tracker", "quantum_papers", "lab_output_rate"],
            DashboardId::Strategy => &["stance_engine", "momentum_blend"],
            DashboardId::Commander => &[],
        }
    }
}

impl fmt::Display for DashboardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for DashboardId {
    type Err = anyhow::Error;

    /// Accepts `shield`, `the-shield` or `the_shield`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        let short = normalized.strip_prefix("the-").unwrap_or(&normalized);
        match short {
            "shield" => Ok(DashboardId::Shield),
            "coin" => Ok(DashboardId::Coin),
            "map" => Ok(DashboardId::Map),
            "frontier" => Ok(DashboardId::Frontier),
            "library" => Ok(DashboardId::Library),
            "strategy" => Ok(DashboardId::Strategy),
            "commander" => Ok(DashboardId::Commander),
            _ => Err(anyhow!("Unknown dashboard '{}'", s)),
        }
    }
}

/// Identity block shared by every dashboard document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub dashboard: String,
    pub name: String,
    pub role: String,
    pub mission: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_sources: Vec<String>,
    pub last_update: String,
}

impl Header {
    pub fn new(id: DashboardId, now: DateTime<Utc>) -> Self {
        Header {
            dashboard: id.slug().to_string(),
            name: id.name().to_string(),
            role: id.role().to_string(),
            mission: id.mission().to_string(),
            data_sources: id.data_sources().iter().map(|s| s.to_string()).collect(),
            last_update: now.format(LAST_UPDATE_FORMAT).to_string(),
        }
    }
}

/// Inputs available to every builder during one run.
pub struct BuildContext<'a> {
    pub data_dir: &'a Path,
    pub store: &'a DataStore,
    pub ai: &'a UnifiedAnalysis,
    pub now: DateTime<Utc>,
}

/// Build one dashboard document.
pub async fn build(id: DashboardId, ctx: &BuildContext<'_>) -> Result<Value> {
    let doc = match id {
        DashboardId::Shield => serde_json::to_value(shield::build(ctx.store, ctx.ai.shield.as_ref(), ctx.now))?,
        DashboardId::Coin => serde_json::to_value(coin::build(ctx.store, ctx.ai.coin.as_ref(), ctx.now))?,
        DashboardId::Map => serde_json::to_value(map::build(ctx.store, ctx.ai.map.as_ref(), ctx.now))?,
        DashboardId::Frontier => serde_json::to_value(frontier::build(ctx.store, ctx.ai.frontier.as_ref(), ctx.now))?,
        DashboardId::Library => serde_json::to_value(library::build(ctx.ai.library.as_ref(), ctx.now))?,
        DashboardId::Strategy => {
            let saved = strategy::SavedInputs::load(ctx.data_dir).await;
            serde_json::to_value(strategy::build(&saved, ctx.ai.strategy.as_ref(), ctx.now))?
        }
        DashboardId::Commander => {
            let saved = commander::SavedDashboards::load(ctx.data_dir).await;
            serde_json::to_value(commander::build(&saved, ctx.ai.commander.as_ref(), ctx.now))?
        }
    };
    Ok(doc)
}

pub fn dashboard_dir(data_dir: &Path, id: DashboardId) -> PathBuf {
    data_dir.join(id.slug())
}

/// Write `latest.json`; The Shield also appends to its rolling history.
pub async fn save(data_dir: &Path, id: DashboardId, doc: &Value) -> Result<PathBuf> {
    let dir = dashboard_dir(data_dir, id);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join("latest.json");
    tokio::fs::write(&path, serde_json::to_string_pretty(doc)?)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if id == DashboardId::Shield {
        append_history(&dir, doc).await?;
    }

    tracing::info!("  Saved {}", path.display());
    Ok(path)
}

async fn append_history(dir: &Path, doc: &Value) -> Result<()> {
    let path = dir.join("history.json");

    let mut history: Vec<Value> = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("  Discarding unreadable {}: {}", path.display(), e);
            Vec::new()
        }),
        Err(_) => Vec::new(),
    };

    history.push(doc.clone());
    if history.len() > SHIELD_HISTORY_LEN {
        history.drain(..history.len() - SHIELD_HISTORY_LEN);
    }

    tokio::fs::write(&path, serde_json::to_string_pretty(&history)?)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Previously saved document, if any. Unreadable files count as missing.
pub async fn read_latest(data_dir: &Path, id: DashboardId) -> Option<Value> {
    let path = dashboard_dir(data_dir, id).join("latest.json");
    let raw = tokio::fs::read_to_string(&path).await.ok()?;
    match serde_json::from_str(&raw) {
        Ok(doc) => Some(doc),
        Err(e) => {
            tracing::warn!("  Ignoring corrupt {}: {}", path.display(), e);
            None
        }
    }
}

/// String field at a JSON pointer, e.g. `/risk_assessment/level`.
pub(crate) fn pointer_str(doc: Option<&Value>, pointer: &str) -> Option<String> {
    doc?.pointer(pointer)?.as_str().map(str::to_string)
}

/// Round to one decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("alpha-loop-dash-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_parse_dashboard_ids() {
        assert_eq!("shield".parse::<DashboardId>().unwrap(), DashboardId::Shield);
        assert_eq!("the-coin".parse::<DashboardId>().unwrap(), DashboardId::Coin);
        assert_eq!("THE_COMMANDER".parse::<DashboardId>().unwrap(), DashboardId::Commander);
        assert!("radar".parse::<DashboardId>().is_err());
    }

    #[test]
    fn test_header_format() {
        let now = DateTime::parse_from_rfc3339("2025-03-04T05:06:07Z").unwrap().with_timezone(&Utc);
        let header = Header::new(DashboardId::Map, now);
        assert_eq!(header.last_update, "2025-03-04 05:06:07 UTC");
        assert_eq!(header.dashboard, "the-map");
        assert_eq!(header.data_sources.len(), 3);

        let json = serde_json::to_value(Header::new(DashboardId::Commander, now)).unwrap();
        assert!(json.get("data_sources").is_none());
    }

    #[tokio::test]
    async fn test_shield_history_keeps_last_30() {
        let dir = temp_dir("history");
        for i in 0..35 {
            save(&dir, DashboardId::Shield, &json!({"run": i})).await.unwrap();
        }
        let raw = std::fs::read_to_string(dir.join("the-shield/history.json")).unwrap();
        let history: Vec<Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(history.len(), SHIELD_HISTORY_LEN);
        assert_eq!(history[0]["run"], 5);
        assert_eq!(history[29]["run"], 34);

        let latest = read_latest(&dir, DashboardId::Shield).await.unwrap();
        assert_eq!(latest["run"], 34);
        assert!(!dir.join("the-coin").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_read_latest_missing_or_corrupt() {
        let dir = temp_dir("corrupt");
        assert!(read_latest(&dir, DashboardId::Coin).await.is_none());

        std::fs::create_dir_all(dir.join("the-coin")).unwrap();
        std::fs::write(dir.join("the-coin/latest.json"), "{ not json").unwrap();
        assert!(read_latest(&dir, DashboardId::Coin).await.is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
