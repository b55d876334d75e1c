// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenRouter API adapter
//!
//! Serves the OpenAI/Anthropic/Perplexity text models through OpenRouter's
//! OpenAI-compatible chat-completions API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::adapter::{ChatRequest, ProviderAdapter, ProviderReply, TokenUsage};
use crate::provider::turn::{Turn, TurnRole};

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenRouter adapter - many text models via a single API
#[derive(Debug)]
pub struct OpenRouterAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterAdapter {
    /// Create a new OpenRouter adapter
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, OPENROUTER_API_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::with_timeout(api_key, base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create with a custom base URL and request timeout
    pub fn with_timeout(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Convert turns to the OpenAI wire format
    fn convert_turns(&self, turns: &[Turn]) -> Vec<WireMessage> {
        turns
            .iter()
            .map(|t| WireMessage {
                role: match t.role {
                    TurnRole::System => "system",
                    TurnRole::User => "user",
                    TurnRole::Assistant => "assistant",
                }
                .to_string(),
                content: t.content.clone(),
            })
            .collect()
    }

    /// Extract Retry-After header value from HTTP response headers
    ///
    /// Only the numeric-seconds form is parsed; the HTTP-date form falls
    /// back to the caller's default.
    fn extract_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
        headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
    }

    /// Parse an error response
    fn parse_error(status: u16, body: &str, retry_after: Option<u64>) -> ProviderError {
        if let Ok(error_response) = serde_json::from_str::<WireError>(body) {
            let message = error_response.error.message;
            let code = error_response.error.code.as_deref().unwrap_or("");

            match code {
                "invalid_api_key" | "authentication_error" => ProviderError::AuthenticationFailed,
                "rate_limit_exceeded" => {
                    ProviderError::RateLimited(retry_after.unwrap_or(10) as u32)
                }
                "invalid_request_error" => ProviderError::InvalidInput(message),
                "model_not_found" => ProviderError::Unavailable(message),
                _ => Self::map_status(status, message, retry_after),
            }
        } else {
            Self::map_status(status, body.to_string(), retry_after)
        }
    }

    fn map_status(status: u16, message: String, retry_after: Option<u64>) -> ProviderError {
        match status {
            400 | 404 | 422 => ProviderError::InvalidInput(message),
            401 | 403 => ProviderError::AuthenticationFailed,
            429 => ProviderError::RateLimited(retry_after.unwrap_or(10) as u32),
            _ => ProviderError::Unavailable(format!("HTTP {}: {}", status, message)),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenRouterAdapter {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn send(&self, request: ChatRequest) -> Result<ProviderReply, ProviderError> {
        let body = WireRequest {
            model: request.model.clone(),
            messages: self.convert_turns(&request.history),
            max_tokens: Some(request.config.max_tokens),
            temperature: Some(request.config.temperature),
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            // Extract Retry-After header before consuming the response body
            let retry_after = Self::extract_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body, retry_after));
        }

        let api_response: WireResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("response contained no choices".to_string())
            })?;

        let usage = api_response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(ProviderReply::text(content, usage))
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorBody,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_turns_maps_roles() {
        let adapter = OpenRouterAdapter::new("key");
        let wire = adapter.convert_turns(&[
            Turn::system("be brief"),
            Turn::user("hi"),
            Turn::assistant("hello"),
        ]);

        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[1].role, "user");
        assert_eq!(wire[2].role, "assistant");
        assert_eq!(wire[1].content, "hi");
    }

    #[test]
    fn test_parse_error_invalid_api_key() {
        let body = r#"{"error":{"message":"bad key","code":"invalid_api_key"}}"#;
        let err = OpenRouterAdapter::parse_error(401, body, None);
        assert_eq!(err, ProviderError::AuthenticationFailed);
    }

    #[test]
    fn test_parse_error_rate_limited_uses_retry_after() {
        let body = r#"{"error":{"message":"slow down","code":"rate_limit_exceeded"}}"#;
        let err = OpenRouterAdapter::parse_error(429, body, Some(25));
        assert_eq!(err, ProviderError::RateLimited(25));
    }

    #[test]
    fn test_parse_error_rate_limited_defaults_to_ten() {
        let body = r#"{"error":{"message":"slow down","code":"rate_limit_exceeded"}}"#;
        let err = OpenRouterAdapter::parse_error(429, body, None);
        assert_eq!(err, ProviderError::RateLimited(10));
    }

    #[test]
    fn test_parse_error_invalid_request() {
        let body = r#"{"error":{"message":"messages: required","code":"invalid_request_error"}}"#;
        let err = OpenRouterAdapter::parse_error(400, body, None);
        assert!(matches!(err, ProviderError::InvalidInput(m) if m.contains("required")));
    }

    #[test]
    fn test_parse_error_unparseable_body_maps_by_status() {
        let err = OpenRouterAdapter::parse_error(500, "<html>oops</html>", None);
        assert!(matches!(err, ProviderError::Unavailable(m) if m.contains("500")));

        let err = OpenRouterAdapter::parse_error(429, "busy", Some(7));
        assert_eq!(err, ProviderError::RateLimited(7));

        let err = OpenRouterAdapter::parse_error(403, "denied", None);
        assert_eq!(err, ProviderError::AuthenticationFailed);
    }

    #[test]
    fn test_wire_request_skips_absent_options() {
        let body = WireRequest {
            model: "m".to_string(),
            messages: vec![],
            max_tokens: None,
            temperature: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("max_tokens"));
        assert!(!json.contains("temperature"));
    }

    #[test]
    fn test_wire_response_without_usage_decodes() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#;
        let parsed: WireResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.usage.is_none());
        assert_eq!(parsed.choices[0].message.content, "hi");
    }
}
