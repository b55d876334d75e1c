// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Fal API adapter for image generation
//!
//! Posts the final user turn as a text-to-image prompt and returns the URL
//! of the first generated image. Image generation has no meaningful token
//! accounting, so usage is estimated from the prompt length.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::adapter::{ChatRequest, ProviderAdapter, ProviderReply, TokenUsage};

const FAL_API_URL: &str = "https://fal.run";
// Image synthesis is slower than text completion
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Fal adapter - text-to-image generation
#[derive(Debug)]
pub struct FalAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FalAdapter {
    /// Create a new Fal adapter
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, FAL_API_URL)
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

    fn parse_error(status: u16, body: &str, retry_after: Option<u64>) -> ProviderError {
        let message = serde_json::from_str::<WireError>(body)
            .map(|e| e.detail)
            .unwrap_or_else(|_| body.to_string());

        match status {
            400 | 422 => ProviderError::InvalidInput(message),
            401 | 403 => ProviderError::AuthenticationFailed,
            429 => ProviderError::RateLimited(retry_after.unwrap_or(10) as u32),
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
impl ProviderAdapter for FalAdapter {
    fn name(&self) -> &str {
        "fal"
    }

    async fn send(&self, request: ChatRequest) -> Result<ProviderReply, ProviderError> {
        let prompt = request
            .prompt()
            .ok_or_else(|| ProviderError::InvalidInput("image prompt is empty".to_string()))?;
        if prompt.trim().is_empty() {
            return Err(ProviderError::InvalidInput("image prompt is empty".to_string()));
        }

        let endpoint = format!("{}/{}", self.base_url, request.model);
        let body = WireRequest {
            prompt: prompt.to_string(),
        };

        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Key {}", self.api_key))
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

        let url = api_response
            .images
            .into_iter()
            .next()
            .map(|image| image.url)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("response contained no images".to_string())
            })?;

        let usage = TokenUsage::new((prompt.len() / 4) as u32, 0);
        Ok(ProviderReply::image(url, usage))
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct WireRequest {
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    images: Vec<WireImage>,
}

#[derive(Debug, Deserialize)]
struct WireImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct WireError {
    detail: String,
}
