use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{GenerationOptions, LlmBackend, LlmProvider};
use crate::error::AiError;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Google Gemini `generateContent` API.
pub struct GeminiBackend {
    client: Client,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        GeminiBackend { client, api_key }
    }

    fn build_request(system: &str, prompt: &str, options: &GenerationOptions) -> GenerateRequest {
        // No separate system role on this endpoint
        let text = if system.is_empty() {
            prompt.to_string()
        } else {
            format!("{}\n\n{}", system, prompt)
        };

        GenerateRequest {
            contents: vec![Content { parts: vec![Part { text }] }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
                response_mime_type: options.json_mode.then_some("application/json"),
            },
        }
    }

    fn first_text(resp: GenerateResponse) -> Option<String> {
        let text: String = resp.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Gemini
    }

    async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, AiError> {
        let url = format!("{}/{}:generateContent", API_BASE, model);
        let request = Self::build_request(system, prompt, options);

        let response = self.client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
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

        let result: GenerateResponse = response.json().await?;
        Self::first_text(result).ok_or_else(|| AiError::EmptyResponse(model.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_camel_case_json_mode() {
        let req = GeminiBackend::build_request("sys", "body", &GenerationOptions::default());
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["text"], "sys\n\nbody");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 8000);
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_text_mode_omits_mime_type() {
        let options = GenerationOptions { json_mode: false, ..GenerationOptions::default() };
        let json = serde_json::to_value(GeminiBackend::build_request("", "body", &options)).unwrap();
        assert!(json["generationConfig"].get("responseMimeType").is_none());
        assert_eq!(json["contents"][0]["parts"][0]["text"], "body");
    }

    #[test]
    fn test_first_text_joins_parts() {
        let resp: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(GeminiBackend::first_text(resp).as_deref(), Some("{\"a\":1}"));

        let blocked: GenerateResponse = serde_json::from_str(r#"{"candidates":[{}]}"#).unwrap();
        assert!(GeminiBackend::first_text(blocked).is_none());
    }
}
