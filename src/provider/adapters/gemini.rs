// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Google Gemini API adapter
//!
//! Talks to the generative-language `generateContent` endpoint directly.
//! Gemini has no system role, so a leading system turn is folded into a
//! user/model exchange, and assistant turns are sent with role "model".

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::adapter::{ChatRequest, ProviderAdapter, ProviderReply, TokenUsage};
use crate::provider::turn::{Turn, TurnRole};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const SYSTEM_ACK: &str = "Understood. I will follow these guidelines.";

/// Google Gemini adapter
#[derive(Debug)]
pub struct GeminiAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiAdapter {
    /// Create a new Gemini adapter
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, GEMINI_API_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Convert turns to Gemini contents
    ///
    /// System turns become a user turn followed by a canned model
    /// acknowledgement, matching how the API expects standing instructions.
    fn convert_turns(turns: &[Turn]) -> Vec<WireContent> {
        let mut contents = Vec::new();
        for turn in turns {
            match turn.role {
                TurnRole::System => {
                    contents.push(WireContent::text("user", turn.content.clone()));
                    contents.push(WireContent::text("model", SYSTEM_ACK.to_string()));
                }
                TurnRole::User => contents.push(WireContent::text("user", turn.content.clone())),
                TurnRole::Assistant => {
                    contents.push(WireContent::text("model", turn.content.clone()))
                }
            }
        }
        contents
    }

    fn parse_error(status: u16, body: &str, retry_after: Option<u64>) -> ProviderError {
        let message = serde_json::from_str::<WireError>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status {
            400 => ProviderError::InvalidInput(message),
            401 | 403 => ProviderError::AuthenticationFailed,
            429 => ProviderError::RateLimited(retry_after.unwrap_or(10) as u32),
            404 => ProviderError::Unavailable(message),
            _ => ProviderError::Unavailable(format!("HTTP {}: {}", status, message)),
        }
    }

    fn extract_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
        headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn send(&self, request: ChatRequest) -> Result<ProviderReply, ProviderError> {
        let endpoint = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );

        let body = WireRequest {
            contents: Self::convert_turns(&request.history),
            generation_config: WireGenerationConfig {
                temperature: request.config.temperature,
                max_output_tokens: request.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(&endpoint)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = Self::extract_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body, retry_after));
        }

        let api_response: WireResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text = api_response
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("response contained no candidates".to_string())
            })?;

        let usage = api_response
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        Ok(ProviderReply::text(text, usage))
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(rename = "generationConfig")]
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireContent {
    role: String,
    parts: Vec<WirePart>,
}

impl WireContent {
    fn text(role: &str, text: String) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![WirePart { text: Some(text) }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<WireUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    content: WireContent,
}

#[derive(Debug, Deserialize)]
struct WireUsageMetadata {
    #[serde(default, rename = "promptTokenCount")]
    prompt_token_count: u32,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorBody,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    message: String,
}
