use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::llm::LlmProvider;

pub const DEFAULT_COMPASS_MODEL: &str = "alibaba/tongyi-deepresearch-30b-a3b:free";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub public_dir: PathBuf,
    pub openrouter_key: Option<String>,
    pub gemini_key: Option<String>,
    pub fred_key: Option<String>,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub ai_provider: LlmProvider,
    pub ai_disabled: bool,
    pub compass_model: String,
    pub max_parallel_fetches: usize,
    pub phase_pause: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("./data"),
            public_dir: PathBuf::from("./public"),
            openrouter_key: None,
            gemini_key: None,
            fred_key: None,
            telegram_token: None,
            telegram_chat_id: None,
            ai_provider: LlmProvider::OpenRouter,
            ai_disabled: false,
            compass_model: DEFAULT_COMPASS_MODEL.to_string(),
            max_parallel_fetches: 10,
            phase_pause: Duration::from_millis(1000),
        }
    }
}

impl Config {
    /// Load from `.env` (if present) and the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let ai_provider = match get("AI_PROVIDER") {
            Some(raw) => raw.parse::<LlmProvider>()?,
            None => defaults.ai_provider,
        };

        let max_parallel_fetches = match get("ALPHA_LOOP_MAX_PARALLEL") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("ALPHA_LOOP_MAX_PARALLEL must be a positive integer, got '{}'", raw))?
                .max(1),
            None => defaults.max_parallel_fetches,
        };

        let phase_pause = match get("ALPHA_LOOP_PHASE_PAUSE_MS") {
            Some(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .with_context(|| format!("ALPHA_LOOP_PHASE_PAUSE_MS must be milliseconds, got '{}'", raw))?,
            ),
            None => defaults.phase_pause,
        };

        Ok(Config {
            data_dir: get("ALPHA_LOOP_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            public_dir: get("ALPHA_LOOP_PUBLIC_DIR").map(PathBuf::from).unwrap_or(defaults.public_dir),
            openrouter_key: get("OPENROUTER_KEY").or_else(|| get("OPENROUTER_API_KEY")),
            gemini_key: get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")),
            fred_key: get("FRED_API_KEY"),
            telegram_token: get("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: get("TELEGRAM_CHAT_ID"),
            ai_provider,
            ai_disabled: get("DISABLE_AI").map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false),
            compass_model: get("OPENROUTER_MODEL").unwrap_or(defaults.compass_model),
            max_parallel_fetches,
            phase_pause,
        })
    }
}
