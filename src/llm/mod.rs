pub mod openrouter;
pub mod gemini;
pub mod prompt;
pub mod analysis;

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::AiError;

/// Free OpenRouter models, tried in order until one answers with usable JSON.
pub const FREE_OPENROUTER_MODELS: [&str; 21] = [
    "meta-llama/llama-3.3-70b-instruct:free",
    "mistralai/mistral-small-3.1-24b-instruct:free",
    "alibaba/tongyi-deepresearch-30b-a3b:free",
    "allenai/olmo-3-32b-think:free",
    "cognitivecomputations/dolphin-mistral-24b-venice-edition:free",
    "openai/gpt-oss-120b:free",
    "openai/gpt-oss-20b:free",
    "tngtech/deepseek-r1t2-chimera:free",
    "tngtech/deepseek-r1t-chimera:free",
    "tngtech/tng-r1t-chimera:free",
    "moonshotai/kimi-k2:free",
    "kwaipilot/kat-coder-pro:free",
    "qwen/qwen3-coder:free",
    "qwen/qwen3-4b:free",
    "z-ai/glm-4.5-air:free",
    "meituan/longcat-flash-chat:free",
    "google/gemma-3n-e4b-it:free",
    "google/gemma-3n-e2b-it:free",
    "google/gemma-3-4b-it:free",
    "arcee-ai/trinity-mini:free",
    "amazon/nova-2-lite-v1:free",
];

pub const GEMINI_MODELS: [&str; 3] = ["gemini-2.5-pro", "gemini-1.5-pro", "gemini-1.5-flash"];

pub const ANALYST_SYSTEM_PROMPT: &str = "You are a master financial analyst. Return ONLY valid JSON, no markdown.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenRouter,
    Gemini,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenRouter => "openrouter",
            LlmProvider::Gemini => "gemini",
        }
    }

    pub fn default_models(&self) -> Vec<String> {
        match self {
            LlmProvider::OpenRouter => FREE_OPENROUTER_MODELS.iter().map(|m| m.to_string()).collect(),
            LlmProvider::Gemini => GEMINI_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openrouter" => Ok(LlmProvider::OpenRouter),
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            other => Err(anyhow::anyhow!("Unknown AI provider '{}' (expected openrouter or gemini)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the backend for a JSON-only response where supported
    pub json_mode: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        GenerationOptions {
            temperature: 0.7,
            max_tokens: 8000,
            json_mode: true,
        }
    }
}

/// One hosted model API.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn provider(&self) -> LlmProvider;

    /// Raw completion text. A 429 must surface as `AiError::RateLimited`.
    async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, AiError>;
}

#[derive(Debug, Clone)]
pub struct AiResponse {
    pub model: String,
    pub content: serde_json::Value,
}

/// Candidate-model fallback chain around a single backend.
pub struct AiClient {
    backend: Arc<dyn LlmBackend>,
    models: Vec<String>,
    disabled: bool,
    quota_exceeded: AtomicBool,
    rate_limit_pause: Duration,
    pool: Option<SqlitePool>,
}

impl AiClient {
    pub fn new(backend: Arc<dyn LlmBackend>, models: Vec<String>) -> Self {
        AiClient {
            backend,
            models,
            disabled: false,
            quota_exceeded: AtomicBool::new(false),
            rate_limit_pause: Duration::from_secs(2),
            pool: None,
        }
    }

    /// Client for the configured provider, or the reason no AI is available.
    pub fn from_config(config: &Config, pool: Option<SqlitePool>) -> Result<Self, AiError> {
        if config.ai_disabled {
            return Err(AiError::Disabled);
        }

        let backend: Arc<dyn LlmBackend> = match config.ai_provider {
            LlmProvider::OpenRouter => {
                let key = config.openrouter_key.clone().ok_or(AiError::MissingKey("OPENROUTER_KEY"))?;
                Arc::new(openrouter::OpenRouterBackend::new(key))
            }
            LlmProvider::Gemini => {
                let key = config.gemini_key.clone().ok_or(AiError::MissingKey("GEMINI_API_KEY"))?;
                Arc::new(gemini::GeminiBackend::new(key))
            }
        };

        let mut client = AiClient::new(backend, config.ai_provider.default_models());
        client.pool = pool;
        Ok(client)
    }

    pub fn with_pool(mut self, pool: SqlitePool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_rate_limit_pause(mut self, pause: Duration) -> Self {
        self.rate_limit_pause = pause;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn quota_exceeded(&self) -> bool {
        self.quota_exceeded.load(Ordering::SeqCst)
    }

    /// Walk the candidate models until one returns parseable JSON.
    pub async fn generate_json(&self, system: &str, prompt: &str) -> Result<AiResponse, AiError> {
        if self.disabled {
            tracing::info!("  AI disabled via flag.");
            return Err(AiError::Disabled);
        }
        if self.quota_exceeded() {
            tracing::warn!("  AI quota previously exceeded. Skipping AI call.");
            return Err(AiError::QuotaExceeded);
        }

        let options = GenerationOptions::default();
        let total = self.models.len();

        for (index, model) in self.models.iter().enumerate() {
            if self.quota_exceeded() {
                break;
            }
            tracing::info!("  Attempting unified AI call with: {} ({}/{})", model, index + 1, total);

            let err = match self.backend.complete(model, system, prompt, &options).await {
                Ok(text) => match parse_json_content(model, &text) {
                    Ok(content) => {
                        tracing::info!("  SUCCESS with {}", model);
                        self.record(model, &content).await;
                        return Ok(AiResponse { model: model.clone(), content });
                    }
                    Err(e) => e,
                },
                Err(e) => e,
            };

            match err {
                AiError::RateLimited { .. } if self.backend.provider() == LlmProvider::Gemini => {
                    tracing::error!("  Gemini quota exceeded (429), stopping AI calls for this run");
                    self.quota_exceeded.store(true, Ordering::SeqCst);
                    return Err(AiError::QuotaExceeded);
                }
                AiError::RateLimited { .. } => {
                    tracing::warn!("  {} rate limited (429), trying next...", model);
                    tokio::time::sleep(self.rate_limit_pause).await;
                }
                e if e.is_retryable() => {
                    tracing::warn!("  {}", e);
                }
                e => return Err(e),
            }
        }

        tracing::error!("  All {} models failed", self.backend.provider().as_str());
        Err(AiError::AllModelsFailed { attempts: total })
    }

    /// Single-model free-text completion.
    pub async fn generate_text(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, AiError> {
        if self.disabled {
            return Err(AiError::Disabled);
        }
        let text = self.backend.complete(model, system, prompt, options).await?;
        if text.trim().is_empty() {
            return Err(AiError::EmptyResponse(model.to_string()));
        }
        Ok(text)
    }

    async fn record(&self, model: &str, content: &serde_json::Value) {
        let Some(pool) = &self.pool else {
            return;
        };
        if let Err(e) = crate::db::save_ai_report(pool, self.backend.provider().as_str(), model, &content.to_string()).await {
            tracing::warn!("Failed to save AI report: {}", e);
        }
    }
}

/// Slice from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_json_content(model: &str, text: &str) -> Result<serde_json::Value, AiError> {
    let raw = extract_json(text).ok_or_else(|| AiError::InvalidJson {
        model: model.to_string(),
        reason: "no JSON object in response".to_string(),
    })?;
    serde_json::from_str(raw).map_err(|e| AiError::InvalidJson {
        model: model.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned outcomes, one per call.
    struct ScriptedBackend {
        provider: LlmProvider,
        script: Mutex<Vec<Result<String, AiError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(provider: LlmProvider, mut script: Vec<Result<String, AiError>>) -> Arc<Self> {
            script.reverse();
            Arc::new(ScriptedBackend { provider, script: Mutex::new(script), calls: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        fn provider(&self) -> LlmProvider {
            self.provider
        }

        async fn complete(&self, model: &str, _: &str, _: &str, _: &GenerationOptions) -> Result<String, AiError> {
            self.calls.lock().unwrap().push(model.to_string());
            self.script.lock().unwrap().pop().unwrap_or(Err(AiError::EmptyResponse(model.to_string())))
        }
    }

    fn models(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("m{}", i)).collect()
    }

    #[test]
    fn test_extract_json() {
        assert_eq!(extract_json("```json\n{\"a\": {\"b\": 1}}\n```"), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("OpenRouter".parse::<LlmProvider>().unwrap(), LlmProvider::OpenRouter);
        assert_eq!("gemini".parse::<LlmProvider>().unwrap(), LlmProvider::Gemini);
        assert!("ollama".parse::<LlmProvider>().is_err());
        assert_eq!(LlmProvider::OpenRouter.default_models().len(), 21);
    }

    #[tokio::test]
    async fn test_falls_through_to_first_valid_json() {
        let backend = ScriptedBackend::new(LlmProvider::OpenRouter, vec![
            Err(AiError::Status { model: "m0".into(), status: 500, body: String::new() }),
            Ok("Sure! Here you go: {not json}".into()),
            Ok("Here:\n{\"the_shield\": {\"risk_level\": \"LOW\"}}".into()),
        ]);
        let client = AiClient::new(backend.clone(), models(5));

        let resp = client.generate_json("sys", "prompt").await.unwrap();
        assert_eq!(resp.model, "m2");
        assert_eq!(resp.content["the_shield"]["risk_level"], "LOW");
        assert_eq!(backend.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_openrouter_429_moves_on() {
        let backend = ScriptedBackend::new(LlmProvider::OpenRouter, vec![
            Err(AiError::RateLimited { model: "m0".into() }),
            Ok("{\"ok\": true}".into()),
        ]);
        let client = AiClient::new(backend, models(3)).with_rate_limit_pause(Duration::ZERO);

        let resp = client.generate_json("sys", "prompt").await.unwrap();
        assert_eq!(resp.model, "m1");
        assert!(!client.quota_exceeded());
    }

    #[tokio::test]
    async fn test_gemini_429_sets_quota_and_stops() {
        let backend = ScriptedBackend::new(LlmProvider::Gemini, vec![
            Err(AiError::RateLimited { model: "m0".into() }),
            Ok("{\"never\": true}".into()),
        ]);
        let client = AiClient::new(backend.clone(), models(3));

        let err = client.generate_json("sys", "prompt").await.unwrap_err();
        assert!(matches!(err, AiError::QuotaExceeded));
        assert!(client.quota_exceeded());

        // later calls in the same run are skipped outright
        let again = client.generate_json("sys", "prompt").await.unwrap_err();
        assert!(matches!(again, AiError::QuotaExceeded));
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_all_models_failed() {
        let backend = ScriptedBackend::new(LlmProvider::OpenRouter, vec![]);
        let client = AiClient::new(backend, models(2));
        let err = client.generate_json("sys", "prompt").await.unwrap_err();
        assert!(matches!(err, AiError::AllModelsFailed { attempts: 2 }));
    }

    #[tokio::test]
    async fn test_disabled_client_makes_no_calls() {
        let backend = ScriptedBackend::new(LlmProvider::OpenRouter, vec![Ok("{}".into())]);
        let client = AiClient::new(backend.clone(), models(1)).disabled(true);
        assert!(matches!(client.generate_json("s", "p").await, Err(AiError::Disabled)));
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_is_recorded() {
        let pool = crate::db::init_memory().await.unwrap();
        let backend = ScriptedBackend::new(LlmProvider::OpenRouter, vec![Ok("{\"x\": 1}".into())]);
        let client = AiClient::new(backend, models(1)).with_pool(pool.clone());

        client.generate_json("s", "p").await.unwrap();
        let reports = crate::db::recent_ai_reports(&pool, 5).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].model, "m0");
        assert_eq!(reports[0].provider, "openrouter");
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = Config::default();
        assert!(matches!(AiClient::from_config(&config, None), Err(AiError::MissingKey(_))));

        let config = Config { ai_disabled: true, ..Config::default() };
        assert!(matches!(AiClient::from_config(&config, None), Err(AiError::Disabled)));
    }
}
