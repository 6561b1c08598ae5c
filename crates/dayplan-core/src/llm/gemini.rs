//! Google Generative Language (`generateContent`) client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{LanguageModel, LlmError, check_status};
use crate::config::LlmConfig;

pub struct GeminiClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    timeout: Duration,
}

impl GeminiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                LlmError::Configuration(format!(
                    "no Gemini API key; set {}",
                    LlmConfig::api_key_env("gemini")
                ))
            })?;

        let timeout = config.timeout();
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Result<String, LlmError> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if !text.is_empty() {
            return Ok(text);
        }
        match self.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => Err(LlmError::InvalidResponse(format!("prompt blocked: {reason}"))),
            None => Err(LlmError::InvalidResponse("response contained no text".to_string())),
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "complete: called");
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.7 },
        });

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, self.timeout))?;
        let response = check_status(response).await?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let text = parsed.into_text()?;
        debug!(response_len = text.len(), "complete: success");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    fn client_for(server: &Server) -> GeminiClient {
        let config = LlmConfig {
            base_url: server.url_str(""),
            api_key: Some("test-key".to_string()),
            ..LlmConfig::default()
        };
        GeminiClient::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn complete_joins_candidate_parts() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/v1beta/models/gemini-1.5-flash:generateContent"),
                request::headers(contains(("x-goog-api-key", "test-key"))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "candidates": [
                    { "content": { "parts": [{ "text": "{\"search\": " }, { "text": "null}" }] } }
                ]
            }))),
        );

        let text = client_for(&server).complete("hi").await.unwrap();
        assert_eq!(text, "{\"search\": null}");
    }

    #[tokio::test]
    async fn blocked_prompt_is_invalid_response() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "POST",
                "/v1beta/models/gemini-1.5-flash:generateContent",
            ))
            .respond_with(json_encoded(serde_json::json!({
                "candidates": [],
                "promptFeedback": { "blockReason": "SAFETY" }
            }))),
        );

        let err = client_for(&server).complete("hi").await.unwrap_err();
        assert!(err.to_string().contains("SAFETY"), "unexpected: {err}");
    }

    #[tokio::test]
    async fn rate_limit_maps_retry_after() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "POST",
                "/v1beta/models/gemini-1.5-flash:generateContent",
            ))
            .respond_with(status_code(429).append_header("Retry-After", "7")),
        );

        let err = client_for(&server).complete("hi").await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn server_error_is_api_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "POST",
                "/v1beta/models/gemini-1.5-flash:generateContent",
            ))
            .respond_with(status_code(500).body("boom")),
        );

        let err = client_for(&server).complete("hi").await.unwrap_err();
        assert!(matches!(err, LlmError::ApiError { status: 500, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn missing_key_is_configuration_error() {
        let config = LlmConfig::default();
        assert!(matches!(
            GeminiClient::from_config(&config),
            Err(LlmError::Configuration(_))
        ));
    }
}
