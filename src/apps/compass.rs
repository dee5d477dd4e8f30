//! Economic compass: one static page with an AI-written daily insight.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analysis::technicals::{change_pct, CryptoIndicators, Trend};
use crate::config::Config;
use crate::fetcher::alternative::AlternativeFetcher;
use crate::fetcher::news::{NewsFetcher, CRYPTO_FEED};
use crate::fetcher::yahoo::{Interval, YahooFetcher};
use crate::fetcher::DataSource;
use crate::llm::openrouter::OpenRouterBackend;
use crate::llm::prompt::{compass_prompt, COMPASS_SYSTEM_PROMPT};
use crate::llm::{AiClient, GenerationOptions};
use crate::models::FearGreed;
use crate::registry::Registry;

/// Output name -> registry key.
const MACRO_TICKERS: [(&str, &str); 6] = [
    ("treasury_10y", "TNX"),
    ("dxy", "DXY"),
    ("gold", "GOLD"),
    ("oil", "OIL"),
    ("sp500", "SP500"),
    ("tasi", "TASI"),
];

const HEADLINE_COUNT: usize = 5;
/// About one trading week back
const CHANGE_LOOKBACK: usize = 6;

#[derive(Debug, Clone, Serialize)]
pub struct CoinSnapshot {
    pub price: f64,
    pub rsi: f64,
    pub ma50: f64,
    pub ma200: f64,
    pub bull_band_sma20: f64,
    pub bull_band_ema21: f64,
    pub trend_weekly: Trend,
}

impl From<&CryptoIndicators> for CoinSnapshot {
    /// Undefined indicators are reported as 0.
    fn from(ind: &CryptoIndicators) -> Self {
        let or_zero = |v: Option<f64>| v.filter(|x| x.is_finite()).unwrap_or(0.0);
        CoinSnapshot {
            price: ind.price,
            rsi: or_zero(ind.rsi),
            ma50: or_zero(ind.ma50),
            ma200: or_zero(ind.ma200),
            bull_band_sma20: or_zero(ind.sma_20),
            bull_band_ema21: or_zero(ind.ema_21),
            trend_weekly: ind.weekly_trend(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct MacroQuote {
    pub price: f64,
    pub change_7d: f64,
}

impl MacroQuote {
    pub fn zero() -> Self {
        MacroQuote { price: 0.0, change_7d: 0.0 }
    }

    pub fn from_closes(closes: &[f64]) -> Self {
        match (closes.last(), change_pct(closes, CHANGE_LOOKBACK)) {
            (Some(&price), Some(change)) => MacroQuote { price, change_7d: change },
            _ => Self::zero(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompassData {
    pub btc: Option<CoinSnapshot>,
    pub eth: Option<CoinSnapshot>,
    #[serde(rename = "macro")]
    pub macro_quotes: BTreeMap<String, MacroQuote>,
    pub fng: FearGreed,
    pub news: Vec<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub html: String,
    pub raw_data: CompassData,
    pub date: String,
    pub timestamp: String,
}

pub async fn fetch_data(yahoo: &YahooFetcher) -> CompassData {
    let mut coins = Vec::with_capacity(2);
    for symbol in ["BTC-USD", "ETH-USD"] {
        let snapshot = match yahoo.fetch_history(symbol, Interval::Weekly, 365 * 5).await {
            Ok(candles) => {
                let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
                CryptoIndicators::from_closes(&closes).map(|ind| CoinSnapshot::from(&ind))
            }
            Err(e) => {
                tracing::warn!("  {} weekly history failed: {}", symbol, e);
                None
            }
        };
        coins.push(snapshot);
    }
    let eth = coins.pop().flatten();
    let btc = coins.pop().flatten();

    let mut macro_quotes = BTreeMap::new();
    for (name, key) in MACRO_TICKERS {
        let quote = match Registry::get(key) {
            Some(meta) => match yahoo.fetch_data(meta.symbol).await {
                Ok(points) => {
                    let closes: Vec<f64> = points.iter().map(|p| p.value).collect();
                    MacroQuote::from_closes(&closes)
                }
                Err(e) => {
                    tracing::warn!("  Error processing {}: {}", name, e);
                    MacroQuote::zero()
                }
            },
            None => MacroQuote::zero(),
        };
        macro_quotes.insert(name.to_string(), quote);
    }

    let fng = AlternativeFetcher::new(None)
        .fetch_latest()
        .await
        .into_data()
        .unwrap_or_else(FearGreed::neutral);

    let news = NewsFetcher::new(None).fetch_headlines(CRYPTO_FEED, HEADLINE_COUNT).await;

    CompassData {
        btc,
        eth,
        macro_quotes,
        fng,
        news,
        timestamp: Local::now().to_rfc3339(),
    }
}

/// HTML insight from the model, or an inline error paragraph.
pub async fn generate_insight(client: Option<&AiClient>, model: &str, data: &CompassData) -> String {
    let Some(client) = client else {
        return "<p>Error generating insight: no OpenRouter key configured.</p>".to_string();
    };

    let data_json = match serde_json::to_string_pretty(data) {
        Ok(json) => json,
        Err(e) => return format!("<p>Error generating insight: {}</p>", escape_html(&e.to_string())),
    };

    let options = GenerationOptions { json_mode: false, ..GenerationOptions::default() };
    match client.generate_text(model, COMPASS_SYSTEM_PROMPT, &compass_prompt(&data_json), &options).await {
        Ok(text) => strip_code_fence(&text).to_string(),
        Err(e) => {
            tracing::error!("❌ Error generating insight: {}", e);
            format!("<p>Error generating insight: {}</p>", escape_html(&e.to_string()))
        }
    }
}

/// Fetch, ask for the insight, then rebuild the public directory.
pub async fn build_site(config: &Config) -> Result<PathBuf> {
    tracing::info!("🚀 Starting Daily Build...");

    tracing::info!("📊 Fetching Market Data...");
    let yahoo = YahooFetcher::new();
    let data = fetch_data(&yahoo).await;

    tracing::info!("🧠 Generating AI Insight...");
    let client = match (&config.openrouter_key, config.ai_disabled) {
        (Some(key), false) => Some(AiClient::new(
            Arc::new(OpenRouterBackend::new(key.clone())),
            vec![config.compass_model.clone()],
        )),
        _ => None,
    };
    let html = generate_insight(client.as_ref(), &config.compass_model, &data).await;

    let now = Local::now();
    let insight = Insight {
        html,
        raw_data: data,
        date: now.format("%Y-%m-%d").to_string(),
        timestamp: now.to_rfc3339(),
    };

    tracing::info!("📝 Rendering HTML...");
    let index = write_site(&config.public_dir, &insight, now).await?;
    tracing::info!("✅ Build Complete! Output in {}", config.public_dir.display());
    Ok(index)
}

/// Recreate `public_dir` with `static/`, `index.html` and `data.json`.
pub async fn write_site(public_dir: &Path, insight: &Insight, now: DateTime<Local>) -> Result<PathBuf> {
    if tokio::fs::try_exists(public_dir).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(public_dir)
            .await
            .with_context(|| format!("Failed to clear {}", public_dir.display()))?;
    }
    tokio::fs::create_dir_all(public_dir.join("static"))
        .await
        .with_context(|| format!("Failed to create {}", public_dir.display()))?;

    let index = public_dir.join("index.html");
    tokio::fs::write(&index, render_page(insight, now)).await?;
    tokio::fs::write(public_dir.join("data.json"), serde_json::to_string_pretty(insight)?).await?;
    Ok(index)
}

fn render_page(insight: &Insight, now: DateTime<Local>) -> String {
    let generated_at = now.format("%A, %B %d, %Y at %I:%M %p");
    let data = &insight.raw_data;

    let coin_row = |label: &str, coin: &Option<CoinSnapshot>| match coin {
        Some(c) => format!(
            "<tr><td>{}</td><td>${:.0}</td><td>{:.1}</td><td>{}</td><td>${:.0} / ${:.0}</td></tr>",
            label, c.price, c.rsi, c.trend_weekly, c.bull_band_sma20, c.bull_band_ema21
        ),
        None => format!("<tr><td>{}</td><td colspan=\"4\">Data unavailable</td></tr>", label),
    };

    let macro_rows: String = data
        .macro_quotes
        .iter()
        .map(|(name, q)| format!("<tr><td>{}</td><td>{:.2}</td><td>{:+.2}%</td></tr>", name, q.price, q.change_7d))
        .collect();

    let news_items: String = data
        .news
        .iter()
        .map(|h| format!("<li>{}</li>", escape_html(h)))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Economic Compass | {date}</title>
</head>
<body>
<header>
<h1>Economic Compass</h1>
<p class="generated">Generated {generated_at}</p>
</header>
<main>
<section class="insight">
{html}
</section>
<section class="crypto">
<h2>Crypto Structure</h2>
<table>
<tr><th>Asset</th><th>Price</th><th>RSI (14W)</th><th>Weekly Trend</th><th>BMSB (SMA20 / EMA21)</th></tr>
{btc}
{eth}
</table>
</section>
<section class="macro">
<h2>Macro</h2>
<table>
<tr><th>Market</th><th>Price</th><th>7D</th></tr>
{macro_rows}
</table>
<p>Fear &amp; Greed: {fng_value} ({fng_class})</p>
</section>
<section class="news">
<h2>Headlines</h2>
<ul>
{news_items}
</ul>
</section>
</main>
</body>
</html>
"#,
        date = insight.date,
        generated_at = generated_at,
        html = insight.html,
        btc = coin_row("BTC", &data.btc),
        eth = coin_row("ETH", &data.eth),
        macro_rows = macro_rows,
        fng_value = data.fng.value,
        fng_class = escape_html(&data.fng.classification),
        news_items = news_items,
    )
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, b)| b);
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> CompassData {
        let closes: Vec<f64> = (1..=60).map(|v| 30000.0 + v as f64 * 100.0).collect();
        let ind = CryptoIndicators::from_closes(&closes).unwrap();
        let mut macro_quotes = BTreeMap::new();
        macro_quotes.insert("dxy".to_string(), MacroQuote { price: 104.25, change_7d: -0.4 });
        CompassData {
            btc: Some(CoinSnapshot::from(&ind)),
            eth: None,
            macro_quotes,
            fng: FearGreed::neutral(),
            news: vec!["ETF <flows> & more".into()],
            timestamp: "2025-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn test_macro_quote_uses_sixth_from_last() {
        let closes = [100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 110.0];
        let quote = MacroQuote::from_closes(&closes);
        assert_eq!(quote.price, 110.0);
        // base is 101.0
        assert!((quote.change_7d - 8.9108910891).abs() < 1e-6);

        assert_eq!(MacroQuote::from_closes(&[]), MacroQuote::zero());
    }

    #[test]
    fn test_snapshot_zeroes_missing_indicators() {
        let ind = CryptoIndicators::from_closes(&[100.0, 110.0]).unwrap();
        let snap = CoinSnapshot::from(&ind);
        assert_eq!(snap.ma200, 0.0);
        assert_eq!(snap.rsi, 0.0);
        assert_eq!(snap.trend_weekly, Trend::Bearish);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```html\n<h2>Hi</h2>\n```"), "<h2>Hi</h2>");
        assert_eq!(strip_code_fence("  <p>plain</p> "), "<p>plain</p>");
    }

    #[tokio::test]
    async fn test_missing_client_yields_error_paragraph() {
        let html = generate_insight(None, "m", &sample_data()).await;
        assert!(html.starts_with("<p>Error generating insight"));
    }

    #[tokio::test]
    async fn test_write_site_recreates_directory() {
        let dir = std::env::temp_dir().join(format!("alpha-loop-compass-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("stale.txt"), "old").unwrap();

        let insight = Insight {
            html: "<h2>Macro View</h2>".into(),
            raw_data: sample_data(),
            date: "2025-01-01".into(),
            timestamp: "2025-01-01T08:00:00+03:00".into(),
        };
        let index = write_site(&dir, &insight, Local::now()).await.unwrap();

        assert!(!dir.join("stale.txt").exists());
        assert!(dir.join("static").is_dir());
        let page = std::fs::read_to_string(index).unwrap();
        assert!(page.contains("<h2>Macro View</h2>"));
        assert!(page.contains("ETF &lt;flows&gt; &amp; more"));
        assert!(page.contains("<td>dxy</td><td>104.25</td><td>-0.40%</td>"));

        let data: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(dir.join("data.json")).unwrap()).unwrap();
        assert_eq!(data["raw_data"]["macro"]["dxy"]["price"], 104.25);
        assert!(data["raw_data"]["eth"].is_null());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
