use serde::Serialize;

use crate::analysis::technicals::bmsb_status;
use crate::registry::format_thousands;

pub const COMPASS_SYSTEM_PROMPT: &str =
    "You are a helpful and insightful crypto market analyst. Always respond in English, regardless of any language preferences.";

/// Everything the unified prompt reports on. Missing values render as `N/A`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptInputs {
    pub jpy: Option<f64>,
    pub cnh: Option<f64>,
    pub tnx: Option<f64>,
    pub move_index: Option<f64>,
    pub vix: Option<f64>,
    pub bid_to_cover: Option<f64>,
    pub btc_price: Option<f64>,
    pub eth_price: Option<f64>,
    pub btc_rsi: Option<f64>,
    pub btc_trend: Option<String>,
    pub fng_value: Option<i64>,
    pub fng_class: Option<String>,
    pub oil: Option<f64>,
    pub dxy: Option<f64>,
    pub gold: Option<f64>,
    pub sp500: Option<f64>,
    pub tasi: Option<f64>,
    pub headlines: Vec<String>,
    pub paper_titles: Vec<String>,
}

fn num(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.*}", decimals, v))
}

/// Unit suffix only when the value is present.
fn pct(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.*}%", decimals, v))
}

fn dollars(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("${:.*}", decimals, v))
}

fn usd(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("${}", format_thousands(v, 0)))
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("N/A")
}

fn bullet_list(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    items.iter().map(|i| format!("- {}", i)).collect::<Vec<_>>().join("\n")
}

/// One prompt covering all seven dashboards.
pub fn unified_prompt(d: &PromptInputs) -> String {
    let fng = match (d.fng_value, &d.fng_class) {
        (Some(v), class) => format!("{} ({})", v, text(class)),
        (None, _) => "N/A".to_string(),
    };

    format!(r#"You are the Master AI Analyst for the Daily Alpha Loop system.
Analyze the following market data and generate comprehensive 4-minute briefings for ALL 7 dashboards.

CURRENT MARKET DATA:
====================

RISK DATA (The Shield):
- JPY: {jpy}
- CNH: {cnh}
- 10Y Treasury Yield: {tnx}
- MOVE Index: {move_index}
- VIX: {vix}
- 10Y Bid-to-Cover: {btc10y}

CRYPTO DATA (The Coin):
- BTC Price: {btc_price}
- ETH Price: {eth_price}
- BTC RSI: {btc_rsi}
- BTC Trend: {btc_trend}
- Fear & Greed: {fng}

MACRO DATA (The Map):
- Oil: {oil}
- DXY: {dxy}
- Gold: {gold}
- SP500: {sp500}
- TASI (Saudi): {tasi}

AI/TECH RESEARCH (The Frontier):
{papers}

NEWS HEADLINES (Last 10):
{news}

TASK:
Generate a comprehensive JSON response with deep analysis for ALL 7 dashboards.
Each analysis should be suitable for a 4-minute read - go beyond surface level.
Be specific, insightful, and actionable.

Return ONLY valid JSON in this exact structure:
{{
  "the_shield": {{
    "analysis": "3-4 sentence deep analysis of systemic market fragility, stress points, and what professional traders should watch. Be specific about which metrics signal danger.",
    "risk_level": "CRITICAL/ELEVATED/LOW",
    "top_concern": "The single biggest risk factor right now"
  }},
  "the_coin": {{
    "analysis": "3-4 sentence analysis of crypto momentum, rotation dynamics, and institutional flow. Address both BTC and ETH specifically.",
    "momentum": "Bullish/Bearish/Neutral",
    "key_level": "The most important price level to watch"
  }},
  "the_map": {{
    "analysis": "4-5 sentence macro analysis focusing on how oil prices, dollar strength, and global rates impact TASI and Saudi markets. Connect the dots between global macro and regional impact.",
    "tasi_mood": "Positive/Neutral/Negative",
    "drivers": ["Driver 1", "Driver 2", "Driver 3"],
    "tasi_forecast": "What's the likely directional bias for TASI this week?"
  }},
  "the_frontier": {{
    "analysis": "3-4 sentence analysis of AI and tech breakthrough velocity. What's accelerating? What's real vs hype?",
    "breakthroughs": [
      {{"title": "Breakthrough 1", "why_it_matters": "Impact explanation"}},
      {{"title": "Breakthrough 2", "why_it_matters": "Impact explanation"}}
    ],
    "velocity": "Slow/Moderate/Fast/Exponential"
  }},
  "the_strategy": {{
    "analysis": "4-5 sentence synthesis of all signals above. How do risk, crypto, macro, and tech align or conflict? What's the unified market narrative today?",
    "stance": "Defensive/Neutral/Accumulative/Opportunistic/Aggressive",
    "mindset": "One powerful sentence capturing the strategic approach for today",
    "conviction": "High/Medium/Low"
  }},
  "the_library": {{
    "analysis": "2-3 sentence overview of today's knowledge landscape and key learning themes from news and research",
    "summaries": [
      {{"title": "Complex Topic 1", "eli5": "Simple explanation", "long_term": "Why it matters"}},
      {{"title": "Complex Topic 2", "eli5": "Simple explanation", "long_term": "Why it matters"}}
    ],
    "knowledge_velocity": "How fast is breakthrough knowledge accumulating?"
  }},
  "the_commander": {{
    "weather_of_the_day": "Stormy/Cloudy/Sunny/Volatile/Foggy",
    "top_signal": "The single most important data point across all dashboards today",
    "why_it_matters": "4-5 sentence deep explanation of why this signal is critical right now. What are the second and third order effects?",
    "cross_dashboard_convergence": "5-6 sentence paragraph connecting Risk, Crypto, Macro, and Tech. How do these forces interact today? Where is the friction? Where is alignment? What does this mean for positioning?",
    "action_stance": "Specific actionable guidance",
    "optional_deep_insight": "Two paragraphs of advanced market theory applied to today's data. Connect uncommon dots for professional traders. Go deep.",
    "clarity_level": "High/Medium/Low",
    "summary_sentence": "One powerful closing thought that synthesizes everything"
  }}
}}

CRITICAL: Return ONLY the JSON object, no markdown, no explanation, no code blocks."#,
        jpy = num(d.jpy, 2),
        cnh = num(d.cnh, 4),
        tnx = pct(d.tnx, 2),
        move_index = num(d.move_index, 2),
        vix = num(d.vix, 2),
        btc10y = num(d.bid_to_cover, 2),
        btc_price = usd(d.btc_price),
        eth_price = usd(d.eth_price),
        btc_rsi = num(d.btc_rsi, 1),
        btc_trend = text(&d.btc_trend),
        fng = fng,
        oil = dollars(d.oil, 2),
        dxy = num(d.dxy, 2),
        gold = dollars(d.gold, 2),
        sp500 = num(d.sp500, 2),
        tasi = num(d.tasi, 2),
        papers = bullet_list(&d.paper_titles, "Recent papers in AI, Quantum, Robotics, Biotech domains"),
        news = bullet_list(&d.headlines, "Market news unavailable"),
    )
}

/// Daily HTML insight for the compass page. `data_json` is the pretty-printed snapshot.
pub fn compass_prompt(data_json: &str) -> String {
    format!(r#"You are a professional Crypto Market Strategist and Macro Analyst.
Analyze the following market data and provide a daily insight report.

DATA:
{data_json}

INSTRUCTIONS:
1. **Macro Context**: Analyze Treasury Yields, DXY, Gold, Oil, and S&P 500. Are we Risk-On or Risk-Off?
2. **Crypto Structure (Meso)**: Look at BTC's relation to its 50W and 200W Moving Averages and the Bull Market Support Band (SMA20/EMA21). Is the trend bullish or bearish?
3. **Micro Pulse**: Look at RSI and Fear & Greed. Is the market overextended?
4. **TASI Insight**: Briefly mention the Saudi TASI market direction based on the data.
5. **Actionable Advice**: Give a clear recommendation: Accumulate, Hold, or De-risk/Step Back.
6. **Weekly Watchlist**: Provide 3-5 important things to follow this week including:
   - Key economic events and data releases
   - Central bank meetings or announcements
   - Hashtags for social sentiment tracking (format as #hashtag)
   - Microeconomic factors affecting specific sectors
   - Calendar events that could impact markets
   - Format each item on a separate line with clear numbering (1., 2., 3., etc.)
   - Make each item copyable as a single line

FORMAT:
Return the response in HTML format (just the body content, no <html> tags) with nice formatting (<h2>, <ul>, <p>, <strong>).
Use a "Premium" tone: calm, objective, professional.

Structure:
<h2>Macro View</h2>
<p>...</p>

<h2>BTC Market Structure</h2>
<p>...</p>

<h2>TASI &amp; Global Markets</h2>
<p>...</p>

<h2>Actionable Verdict</h2>
<p><strong>[ACCUMULATE / HOLD / DE-RISK]</strong></p>
<p>...</p>

<h2>Weekly Watchlist</h2>
<ul>
  <li>1. ...</li>
  <li>2. ...</li>
  <li>3. ...</li>
</ul>"#)
}

#[derive(Debug, Clone, Copy)]
pub struct CommentaryInputs {
    pub btc_price: f64,
    pub sma_20: f64,
    pub ema_21: f64,
    pub risk_current: f64,
    pub risk_previous: f64,
    pub eth_btc: f64,
    pub dxy: f64,
    pub fed_rate: f64,
    pub yield_curve: f64,
}

/// Long-form crypto commentary for the hyper-analytical report.
pub fn commentary_prompt(d: &CommentaryInputs) -> String {
    let band = bmsb_status(d.btc_price, d.sma_20, d.ema_21);
    let risk_trend = if d.risk_current > d.risk_previous {
        "Rising (increasing risk)"
    } else {
        "Falling (decreasing risk)"
    };
    let eth_context = if d.eth_btc < 0.05 {
        "ETH losing ground to BTC"
    } else {
        "ETH showing relative strength"
    };
    let curve_flag = if d.yield_curve < 0.0 {
        "INVERTED (recession warning)"
    } else {
        "Normal"
    };

    format!(r#"You are a professional crypto market analyst at Hyper Analytical. Provide a comprehensive, data-driven daily market update.

CORE PRINCIPLES:
1. **Data-First**: Base all analysis on actual numbers and technical indicators
2. **Clarity**: Explain complex concepts in accessible language
3. **Macro-Aware**: Always connect crypto markets to broader economic trends
4. **Actionable**: Provide clear guidance for risk management and positioning
5. **Balanced**: Present both bullish and bearish scenarios objectively

TODAY'S DATA:
**Bitcoin Price**: ${price}
**Bull Market Support Band**:
  - 20W SMA: ${sma}
  - 21W EMA: ${ema}
  - Status: {band}

**Risk Metric (0.0-1.0)**: {risk:.2} (Previous: {prev:.2})
  - 0.0-0.4 = Depression/Accumulation Zone
  - 0.4-0.7 = Neutral
  - 0.7-1.0 = Euphoria/Distribution Zone
  - Trend: {risk_trend}

**ETH/BTC Ratio**: {eth_btc:.5}
  - Context: {eth_context}

**Macro Environment**:
  - DXY (Dollar): {dxy:.2}
  - Fed Funds Rate: {fed:.2}%
  - Yield Curve (10Y-2Y): {curve:.2}% {curve_flag}

STRUCTURE YOUR UPDATE:
1. **The Valuation** (2-3 sentences): Discuss Bitcoin's position relative to BMSB.
2. **The Risk Analysis** (2-3 sentences): Explain the Risk Metric reading and what it means for positioning.
3. **The Macro Picture** (2-3 sentences): Analyze DXY strength and Fed policy impact on risk assets.
4. **Altcoin Dynamics** (1-2 sentences): Assess ETH/BTC.
5. **What to Expect Next** (2-3 sentences): Most likely scenarios for the coming weeks.
6. **Actionable Verdict** (1-2 sentences): Accumulate, hold, reduce exposure, or stay cash.

**CRITICAL**: Be specific with numbers. Reference the actual data points. Avoid generic statements."#,
        price = format_thousands(d.btc_price, 0),
        sma = format_thousands(d.sma_20, 0),
        ema = format_thousands(d.ema_21, 0),
        band = band.describe(),
        risk = d.risk_current,
        prev = d.risk_previous,
        risk_trend = risk_trend,
        eth_btc = d.eth_btc,
        eth_context = eth_context,
        dxy = d.dxy,
        fed = d.fed_rate,
        curve = d.yield_curve,
        curve_flag = curve_flag,
    )
}
