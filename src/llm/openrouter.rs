use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GenerationOptions, LlmBackend, LlmProvider};
use crate::error::AiError;

const API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub const DEFAULT_REFERER: &str = "https://github.com/kaledh4/daily-alpha-loop";
pub const DEFAULT_TITLE: &str = "Daily Alpha Loop";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct OpenRouterBackend {
    client: Client,
    api_key: String,
    referer: String,
    title: String,
}

impl OpenRouterBackend {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        OpenRouterBackend {
            client,
            api_key,
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
        }
    }

    /// App attribution headers shown on the OpenRouter dashboard.
    pub fn with_attribution(mut self, referer: &str, title: &str) -> Self {
        self.referer = referer.to_string();
        self.title = title.to_string();
        self
    }

    fn build_request<'a>(model: &'a str, system: &'a str, prompt: &'a str, options: &GenerationOptions) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(Message { role: "system", content: system });
        }
        messages.push(Message { role: "user", content: prompt });

        ChatRequest {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenRouterBackend {
    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenRouter
    }

    async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, AiError> {
        let request = Self::build_request(model, system, prompt, options);

        let response = self.client
            .post(API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AiError::RateLimited { model: model.to_string() });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status {
                model: model.to_string(),
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let result: ChatResponse = response.json().await?;

        result.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AiError::EmptyResponse(model.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let options = GenerationOptions::default();
        let req = OpenRouterBackend::build_request("m", "sys", "hello", &options);
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["model"], "m");
        assert_eq!(json["max_tokens"], 8000);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hello");
    }

    #[test]
    fn test_request_without_system_message() {
        let req = OpenRouterBackend::build_request("m", "", "hello", &GenerationOptions::default());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_null_content_parses() {
        let resp: ChatResponse = serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(resp.choices[0].message.content.is_none());
    }
}
