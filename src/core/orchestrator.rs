use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::Path;

use crate::config::Config;
use crate::core::rate_limiter::RateLimiter;
use crate::core::store::DataStore;
use crate::dashboard::{self, BuildContext, DashboardId};
use crate::db;
use crate::fetcher::alternative::AlternativeFetcher;
use crate::fetcher::arxiv::ArxivFetcher;
use crate::fetcher::news::NewsFetcher;
use crate::fetcher::treasury::TreasuryFetcher;
use crate::fetcher::yahoo::YahooFetcher;
use crate::llm::analysis::UnifiedAnalysis;
use crate::llm::{prompt, AiClient, ANALYST_SYSTEM_PROMPT};
use crate::registry::{Registry, INDICATOR_COINS};

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub dashboards: Vec<String>,
    pub ai_model: Option<String>,
    /// Dashboards that could not be built or saved
    pub failures: Vec<String>,
    pub fetch_failures: Vec<String>,
}

/// Fetch everything once, make one AI call, then build the selected dashboards.
pub async fn run_unified(config: &Config, target: Option<DashboardId>) -> Result<RunSummary> {
    tracing::info!("🚀 Daily Alpha Loop: unified run ({})", target.map_or("all dashboards".to_string(), |t| t.to_string()));

    let pool = match db::init(&config.data_dir).await {
        Ok(pool) => Some(pool),
        Err(e) => {
            tracing::warn!("Cache unavailable, fetching without it: {:#}", e);
            None
        }
    };

    let store = fetch_all(config, pool.as_ref()).await;

    let client = match AiClient::from_config(config, pool.clone()) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!("AI unavailable: {}", e);
            None
        }
    };
    let analysis = analyze(client.as_ref(), &store).await;

    let targets: Vec<DashboardId> = match target {
        Some(id) => vec![id],
        None => DashboardId::BUILD_ORDER.to_vec(),
    };

    let mut summary = build_dashboards(&config.data_dir, &store, &analysis, &targets, Utc::now()).await;
    summary.fetch_failures = store.failures.clone();

    tracing::info!(
        "✅ Run complete: {} dashboards written, {} failed, {} fetch failures",
        summary.dashboards.len(),
        summary.failures.len(),
        summary.fetch_failures.len()
    );
    Ok(summary)
}

/// Fetch phases in a fixed order with a pause between each.
pub async fn fetch_all(config: &Config, pool: Option<&SqlitePool>) -> DataStore {
    let mut store = DataStore::new();

    tracing::info!("📊 Phase 1: market prices");
    let yahoo = match pool {
        Some(p) => YahooFetcher::with_cache(p.clone()),
        None => YahooFetcher::new(),
    };
    if let Some(prices) = store.absorb("market", yahoo.fetch_prices(&Registry::symbols(), config.max_parallel_fetches).await) {
        store.prices = prices;
    }
    RateLimiter::phase_pause(config.phase_pause).await;

    tracing::info!("📈 Phase 2: crypto indicators");
    for coin in INDICATOR_COINS {
        if let Some(ind) = store.absorb(coin, yahoo.fetch_with_indicators(coin).await) {
            store.crypto.insert(coin.to_string(), ind);
        }
    }
    RateLimiter::phase_pause(config.phase_pause).await;

    tracing::info!("🏛️ Phase 3: treasury auction");
    let treasury = TreasuryFetcher::new(pool.cloned());
    store.treasury = store.absorb("treasury", treasury.fetch_latest_auction("10-Year", "Note").await);
    RateLimiter::phase_pause(config.phase_pause).await;

    tracing::info!("😱 Phase 4: fear & greed");
    let alternative = AlternativeFetcher::new(pool.cloned());
    store.fear_greed = store.absorb("fear_greed", alternative.fetch_latest().await);
    RateLimiter::phase_pause(config.phase_pause).await;

    tracing::info!("📰 Phase 5: news");
    let news = NewsFetcher::new(pool.cloned());
    store.news = store.absorb("news", news.fetch_all().await).unwrap_or_default();
    RateLimiter::phase_pause(config.phase_pause).await;

    tracing::info!("🔬 Phase 6: arXiv");
    let arxiv = ArxivFetcher::new(pool.cloned());
    store.arxiv = store.absorb("arxiv", arxiv.fetch_all().await).unwrap_or_default();

    store
}

/// The single unified AI call. Any failure yields an empty analysis.
pub async fn analyze(client: Option<&AiClient>, store: &DataStore) -> UnifiedAnalysis {
    let Some(client) = client else {
        return UnifiedAnalysis::default();
    };

    tracing::info!("🤖 Generating unified AI analysis...");
    let prompt = prompt::unified_prompt(&store.prompt_inputs());
    match client.generate_json(ANALYST_SYSTEM_PROMPT, &prompt).await {
        Ok(response) => UnifiedAnalysis::from_value(Some(response.model), &response.content),
        Err(e) => {
            tracing::warn!("  Unified AI analysis failed: {}", e);
            UnifiedAnalysis::default()
        }
    }
}

/// Build and save each target in order. A failing dashboard does not stop the rest.
pub async fn build_dashboards(
    data_dir: &Path,
    store: &DataStore,
    analysis: &UnifiedAnalysis,
    targets: &[DashboardId],
    now: DateTime<Utc>,
) -> RunSummary {
    let ctx = BuildContext { data_dir, store, ai: analysis, now };
    let mut summary = RunSummary {
        ai_model: analysis.model.clone(),
        ..Default::default()
    };

    for id in DashboardId::BUILD_ORDER.iter().filter(|id| targets.contains(id)) {
        tracing::info!("🧩 Building {}...", id.name());
        let result = match dashboard::build(*id, &ctx).await {
            Ok(doc) => dashboard::save(data_dir, *id, &doc).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => summary.dashboards.push(id.slug().to_string()),
            Err(e) => {
                tracing::error!("  {} failed: {:#}", id.name(), e);
                summary.failures.push(format!("{}: {:#}", id.slug(), e));
            }
        }
    }

    summary
}
