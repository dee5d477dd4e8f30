//! Hyper-analytical crypto risk report: BMSB, log-regression risk,
//! macro backdrop and a written commentary.

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analysis::risk_metric::{self, zone, RiskMetric};
use crate::analysis::technicals::{bmsb_status, calculate_ema, calculate_sma, heikin_ashi_trend, BandStatus, Trend};
use crate::config::Config;
use crate::core::alerts::TelegramNotifier;
use crate::fetcher::fred::{FredFetcher, MacroSnapshot};
use crate::fetcher::yahoo::{Interval, YahooFetcher};
use crate::llm::openrouter::OpenRouterBackend;
use crate::llm::prompt::{commentary_prompt, CommentaryInputs};
use crate::llm::{AiClient, GenerationOptions};
use crate::models::Candle;
use crate::registry::format_thousands;

pub const COMMENTARY_MODEL: &str = "openai/gpt-oss-20b:free";
pub const SITE_URL: &str = "https://kaledh4.github.io/hyper-analytical/";
const SITE_TITLE: &str = "Hyper Analytical";

pub const FALLBACK_YIELD_CURVE: f64 = -0.35;
pub const FALLBACK_FED_RATE: f64 = 5.25;

/// Weeks before the 20-week SMA is defined.
const SMA_WINDOW: usize = 20;

const OUTPUT_DIR: &str = "hyper-analytical";
const OUTPUT_FILE: &str = "dashboard_data.json";

#[derive(Debug, Clone, Serialize)]
pub struct Bmsb {
    pub sma_20: Option<f64>,
    pub ema_21: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskSection {
    pub current: Option<f64>,
    pub previous: Option<f64>,
    pub history: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MacroSection {
    pub dxy: Option<f64>,
    pub yield_inversion: Option<f64>,
    pub fed_rate: Option<f64>,
}

/// Written to `dashboard_data.json`. Non-finite numbers become `null`.
#[derive(Debug, Clone, Serialize)]
pub struct HyperReport {
    pub date: String,
    pub btc_price: Option<f64>,
    pub eth_btc: Option<f64>,
    pub bmsb: Bmsb,
    pub trend: Option<Trend>,
    pub risk_metric: RiskSection,
    #[serde(rename = "macro")]
    pub macro_section: MacroSection,
    pub commentary: String,
    pub generated_at: String,
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Drop the still-forming current week.
pub fn completed_weeks(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.pop();
    candles
}

fn last_close(candles: &[Candle]) -> Option<f64> {
    candles.last().map(|c| c.close)
}

/// Weekly market inputs for the report.
#[derive(Debug, Clone)]
pub struct Market {
    pub btc: Vec<Candle>,
    pub eth: Vec<Candle>,
    pub dxy: Vec<Candle>,
}

impl Market {
    pub async fn fetch(yahoo: &YahooFetcher) -> Result<Self> {
        let mut weekly = Vec::with_capacity(3);
        for symbol in ["BTC-USD", "ETH-USD", "DX-Y.NYB"] {
            tracing::info!("📈 Fetching {} data...", symbol);
            let candles = match yahoo.fetch_history(symbol, Interval::Weekly, 365 * 5).await {
                Ok(c) => completed_weeks(c),
                Err(e) => {
                    tracing::warn!("⚠️ {} history failed: {}", symbol, e);
                    Vec::new()
                }
            };
            weekly.push(candles);
        }
        let dxy = weekly.pop().unwrap_or_default();
        let eth = weekly.pop().unwrap_or_default();
        let btc = weekly.pop().unwrap_or_default();

        if btc.is_empty() {
            bail!("No BTC weekly history available");
        }
        Ok(Market { btc, eth, dxy })
    }
}

/// Everything derived from the market and macro inputs, before commentary.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub btc_price: f64,
    pub eth_btc: f64,
    pub sma_20: f64,
    pub ema_21: f64,
    pub trend: Option<Trend>,
    pub risk: RiskMetric,
    pub dxy: f64,
    pub yield_curve: f64,
    pub fed_rate: f64,
}

/// Closes from the first week with a defined 20-week SMA onward; the regression
/// time index restarts at that week.
pub fn risk_window(closes: &[f64]) -> &[f64] {
    closes.get(SMA_WINDOW - 1..).unwrap_or(&[])
}

impl Analysis {
    pub fn compute(market: &Market, macro_data: &MacroSnapshot) -> Self {
        let closes: Vec<f64> = market.btc.iter().map(|c| c.close).collect();
        let btc_price = last_close(&market.btc).unwrap_or(f64::NAN);
        let eth_btc = last_close(&market.eth).map_or(f64::NAN, |eth| eth / btc_price);

        Analysis {
            btc_price,
            eth_btc,
            sma_20: calculate_sma(&closes, 20).unwrap_or(f64::NAN),
            ema_21: calculate_ema(&closes, 21).unwrap_or(f64::NAN),
            trend: heikin_ashi_trend(&market.btc),
            risk: risk_metric::calculate(risk_window(&closes)),
            dxy: last_close(&market.dxy).unwrap_or(f64::NAN),
            yield_curve: macro_data.yield_curve().unwrap_or(FALLBACK_YIELD_CURVE),
            fed_rate: macro_data.fed_funds.unwrap_or(FALLBACK_FED_RATE),
        }
    }

    fn commentary_inputs(&self) -> CommentaryInputs {
        CommentaryInputs {
            btc_price: self.btc_price,
            sma_20: self.sma_20,
            ema_21: self.ema_21,
            risk_current: self.risk.current,
            risk_previous: self.risk.previous,
            eth_btc: self.eth_btc,
            dxy: self.dxy,
            fed_rate: self.fed_rate,
            yield_curve: self.yield_curve,
        }
    }

    pub fn report(&self, commentary: String) -> HyperReport {
        HyperReport {
            date: Local::now().format("%B %d, %Y").to_string(),
            btc_price: finite(self.btc_price),
            eth_btc: finite(self.eth_btc),
            bmsb: Bmsb {
                sma_20: finite(self.sma_20),
                ema_21: finite(self.ema_21),
            },
            trend: self.trend,
            risk_metric: RiskSection {
                current: finite(self.risk.current),
                previous: finite(self.risk.previous),
                history: self.risk.history.iter().map(|v| finite(*v)).collect(),
            },
            macro_section: MacroSection {
                dxy: finite(self.dxy),
                yield_inversion: finite(self.yield_curve),
                fed_rate: finite(self.fed_rate),
            },
            commentary,
            generated_at: Local::now().to_rfc3339(),
        }
    }
}

/// Templated commentary used whenever the model is unavailable.
pub fn fallback_commentary(price: f64, sma: f64, ema: f64, risk: f64) -> String {
    let band = match bmsb_status(price, sma, ema) {
        BandStatus::Above => "above",
        BandStatus::Below => "below",
        BandStatus::Inside => "within",
    };
    let (outlook, verdict) = if risk < 0.5 {
        (
            "This suggests cautious accumulation may be favorable.",
            "Gradual accumulation with tight risk management",
        )
    } else {
        (
            "Higher risk levels warrant defensive positioning.",
            "Cash is a position - patience is key",
        )
    };

    format!(
        "**Market Update**\n\n\
Bitcoin is currently trading {band} the Bull Market Support Band (20W SMA: ${sma}, 21W EMA: ${ema}). \n\n\
The Risk Metric sits at {risk:.2}, indicating a {zone} zone. {outlook}\n\n\
Macro headwinds from the Federal Reserve's higher-for-longer policy continue to pressure risk assets. \
The DXY remains elevated, creating headwinds for crypto.\n\n\
**Verdict**: {verdict}.\n\n\
Analysis by Hyper Analytical.",
        band = band,
        sma = format_thousands(sma, 0),
        ema = format_thousands(ema, 0),
        risk = risk,
        zone = zone(risk).as_str(),
        outlook = outlook,
        verdict = verdict,
    )
}

pub async fn generate_commentary(client: Option<&AiClient>, analysis: &Analysis) -> String {
    let fallback = || fallback_commentary(analysis.btc_price, analysis.sma_20, analysis.ema_21, analysis.risk.current);

    let Some(client) = client else {
        tracing::warn!("⚠️ No OpenRouter key, using fallback commentary");
        return fallback();
    };

    tracing::info!("🤖 Generating AI analysis...");
    let options = GenerationOptions { temperature: 0.4, max_tokens: 2000, json_mode: false };
    match client
        .generate_text(COMMENTARY_MODEL, "", &commentary_prompt(&analysis.commentary_inputs()), &options)
        .await
    {
        Ok(text) => {
            tracing::info!("✅ AI analysis generated");
            text
        }
        Err(e) => {
            tracing::warn!("⚠️ AI generation failed: {}", e);
            fallback()
        }
    }
}

pub fn telegram_message(report: &HyperReport) -> String {
    let usd = |v: Option<f64>| v.map_or_else(|| "N/A".to_string(), |x| format_thousands(x, 0));
    let num = |v: Option<f64>| v.map_or_else(|| "N/A".to_string(), |x| format!("{:.2}", x));

    format!(
        "**📊 Hyper Analytical Daily Update**\n\n\
**Bitcoin**: ${btc}\n\
**Risk**: {risk}/1.0\n\
**BMSB**: ${sma} - ${ema}\n\n\
**Macro**:\n\
• DXY: {dxy}\n\
• Fed Rate: {fed}%\n\
• Yield Curve: {curve}%\n\n\
🔗 Full Analysis: {url}\n\n\
_Powered by Hyper Analytical_",
        btc = usd(report.btc_price),
        risk = num(report.risk_metric.current),
        sma = usd(report.bmsb.sma_20),
        ema = usd(report.bmsb.ema_21),
        dxy = num(report.macro_section.dxy),
        fed = num(report.macro_section.fed_rate),
        curve = num(report.macro_section.yield_inversion),
        url = SITE_URL,
    )
}

pub async fn write_report(data_dir: &Path, report: &HyperReport) -> Result<PathBuf> {
    let dir = data_dir.join(OUTPUT_DIR);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(OUTPUT_FILE);
    tokio::fs::write(&path, serde_json::to_string_pretty(report)?)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

async fn fetch_macro(config: &Config, pool: Option<SqlitePool>) -> MacroSnapshot {
    let Some(key) = &config.fred_key else {
        tracing::warn!("⚠️ FRED_API_KEY not set, using fallback macro data");
        return MacroSnapshot::default();
    };
    let result = FredFetcher::new(key.clone(), pool).fetch_macro_snapshot().await;
    if let Some(err) = &result.error {
        tracing::warn!("⚠️ FRED Data Error (Using fallbacks): {}", err);
    }
    result.into_data().unwrap_or_default()
}

/// Full pipeline: fetch, analyse, comment, write, notify.
pub async fn run(config: &Config) -> Result<PathBuf> {
    tracing::info!("🚀 HYPER ANALYTICAL - Market Intelligence Engine");
    tracing::info!("Timestamp: {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));

    let pool = crate::db::init(&config.data_dir).await.ok();

    let macro_data = fetch_macro(config, pool.clone()).await;
    let yahoo = match &pool {
        Some(p) => YahooFetcher::with_cache(p.clone()),
        None => YahooFetcher::new(),
    };
    let market = Market::fetch(&yahoo).await?;

    let analysis = Analysis::compute(&market, &macro_data);
    tracing::info!(
        "📊 Risk metric: {:.3} (previous {:.3}, {})",
        analysis.risk.current,
        analysis.risk.previous,
        if analysis.risk.is_rising() { "rising" } else { "falling" }
    );

    let client = match (&config.openrouter_key, config.ai_disabled) {
        (Some(key), false) => {
            let backend = OpenRouterBackend::new(key.clone()).with_attribution(SITE_URL, SITE_TITLE);
            Some(AiClient::new(Arc::new(backend), vec![COMMENTARY_MODEL.to_string()]))
        }
        _ => None,
    };
    let commentary = generate_commentary(client.as_ref(), &analysis).await;

    let report = analysis.report(commentary);
    let path = write_report(&config.data_dir, &report).await?;
    tracing::info!("✅ Data saved to {}", path.display());

    TelegramNotifier::from_config(config).send(&telegram_message(&report)).await;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                timestamp: Utc.timestamp_opt(1_600_000_000 + i as i64 * 604_800, 0).unwrap(),
                open: c * 0.98,
                high: c * 1.02,
                low: c * 0.97,
                close: c,
            })
            .collect()
    }

    #[test]
    fn test_completed_weeks_drops_last() {
        let weeks = completed_weeks(candles(&[1.0, 2.0, 3.0]));
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[1].close, 2.0);
        assert!(completed_weeks(Vec::new()).is_empty());
    }

    #[test]
    fn test_fallback_commentary_branches() {
        let calm = fallback_commentary(60000.0, 50000.0, 52000.0, 0.3);
        assert!(calm.contains("trading above the Bull Market Support Band (20W SMA: $50,000, 21W EMA: $52,000)"));
        assert!(calm.contains("accumulation zone"));
        assert!(calm.contains("Gradual accumulation with tight risk management"));

        let hot = fallback_commentary(51000.0, 50000.0, 52000.0, 0.8);
        assert!(hot.contains("trading within"));
        assert!(hot.contains("distribution zone"));
        assert!(hot.contains("Cash is a position - patience is key"));
    }

    #[test]
    fn test_analysis_uses_macro_fallbacks() {
        let closes: Vec<f64> = (1..=120).map(|i| 1000.0 * (i as f64).powf(1.5)).collect();
        let market = Market {
            btc: candles(&closes),
            eth: candles(&[2000.0]),
            dxy: Vec::new(),
        };
        let analysis = Analysis::compute(&market, &MacroSnapshot::default());

        assert_eq!(analysis.yield_curve, FALLBACK_YIELD_CURVE);
        assert_eq!(analysis.fed_rate, FALLBACK_FED_RATE);
        assert!(analysis.dxy.is_nan());
        assert!((0.0..=1.0).contains(&analysis.risk.current));

        let report = analysis.report("text".into());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["macro"]["dxy"].is_null());
        assert_eq!(json["macro"]["yield_inversion"], -0.35);
        assert_eq!(json["risk_metric"]["history"].as_array().unwrap().len(), 52);
        assert!(json["bmsb"]["sma_20"].is_number());
    }

    #[test]
    fn test_risk_fit_starts_at_first_defined_sma() {
        let closes: Vec<f64> = (1..=150)
            .map(|i| 1000.0 * (i as f64).powf(1.8) * (1.0 + 0.2 * (i as f64 / 7.0).sin()))
            .collect();
        assert_eq!(risk_window(&closes).len(), 131);
        assert_eq!(risk_window(&closes)[0], closes[19]);
        assert!(risk_window(&closes[..19]).is_empty());

        let market = Market { btc: candles(&closes), eth: Vec::new(), dxy: Vec::new() };
        let analysis = Analysis::compute(&market, &MacroSnapshot::default());
        assert_eq!(analysis.risk, risk_metric::calculate(&closes[19..]));
        assert_ne!(analysis.risk.fair_value, risk_metric::calculate(&closes).fair_value);
    }

    #[tokio::test]
    async fn test_commentary_falls_back_without_client() {
        let closes: Vec<f64> = (1..=30).map(|i| i as f64 * 100.0).collect();
        let market = Market { btc: candles(&closes), eth: Vec::new(), dxy: Vec::new() };
        let analysis = Analysis::compute(&market, &MacroSnapshot::default());
        let text = generate_commentary(None, &analysis).await;
        assert!(text.starts_with("**Market Update**"));
    }

    #[test]
    fn test_telegram_message() {
        let report = HyperReport {
            date: "January 01, 2025".into(),
            btc_price: Some(97500.0),
            eth_btc: None,
            bmsb: Bmsb { sma_20: Some(90000.4), ema_21: None },
            trend: Some(Trend::Bullish),
            risk_metric: RiskSection { current: Some(0.456), previous: Some(0.4), history: vec![] },
            macro_section: MacroSection { dxy: Some(104.1), yield_inversion: Some(-0.35), fed_rate: Some(5.25) },
            commentary: String::new(),
            generated_at: String::new(),
        };
        let msg = telegram_message(&report);
        assert!(msg.contains("**Bitcoin**: $97,500"));
        assert!(msg.contains("**Risk**: 0.46/1.0"));
        assert!(msg.contains("**BMSB**: $90,000 - $N/A"));
        assert!(msg.contains("• Yield Curve: -0.35%"));
    }
}
