// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider adapter trait and the uniform request/response contract
//!
//! Every backend, text or image, is reached through [`ProviderAdapter`].
//! Adapters translate the uniform request into one wire call and map every
//! provider-side failure into a [`ProviderError`] variant. They never retry;
//! retry policy belongs to the dispatcher.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::provider::turn::Turn;

/// What kind of content a model produces
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modality::Text => write!(f, "text"),
            Modality::Image => write!(f, "image"),
        }
    }
}

/// Generation options recognized by every adapter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    /// Cap applied to the response length
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Requested output modality
    pub modality: Modality,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
            modality: Modality::Text,
        }
    }
}

/// Uniform request handed to an adapter
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Provider-side model identifier
    pub model: String,

    /// Ordered retained history, newest last; the final turn is the prompt
    pub history: Vec<Turn>,

    /// Generation options
    pub config: GenerationConfig,
}

impl ChatRequest {
    /// Create a request with default generation options
    pub fn new(model: impl Into<String>, history: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            history,
            config: GenerationConfig::default(),
        }
    }

    /// Set the response token cap
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Request image output
    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.config.modality = modality;
        self
    }

    /// The text of the final user turn, if any
    ///
    /// Image adapters use this as the prompt; the rest of the history does
    /// not cross the wire for them.
    pub fn prompt(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|t| t.role == crate::provider::turn::TurnRole::User)
            .map(|t| t.content.as_str())
    }
}

/// Token usage reported by a provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    /// Input tokens
    pub input_tokens: u32,
    /// Output tokens
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Get total tokens used
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Content returned by a provider, or relayed to the transport
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyContent {
    /// Plain text
    Text { text: String },
    /// Reference to generated binary content
    ImageUrl { url: String },
}

impl ReplyContent {
    /// Get as text if this is a text reply
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ReplyContent::Text { text } => Some(text),
            ReplyContent::ImageUrl { .. } => None,
        }
    }

    /// Get the URL if this is an image reply
    pub fn as_image_url(&self) -> Option<&str> {
        match self {
            ReplyContent::ImageUrl { url } => Some(url),
            ReplyContent::Text { .. } => None,
        }
    }
}

/// Successful adapter response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReply {
    /// Generated content
    pub content: ReplyContent,

    /// Token usage for metering
    pub usage: TokenUsage,
}

impl ProviderReply {
    /// Build a text reply
    pub fn text(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            content: ReplyContent::Text { text: text.into() },
            usage,
        }
    }

    /// Build an image reply
    pub fn image(url: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            content: ReplyContent::ImageUrl { url: url.into() },
            usage,
        }
    }
}

/// Main trait for provider adapters
///
/// One instance per backend. `send` performs exactly one network call,
/// bounded by the adapter's HTTP timeout.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + std::fmt::Debug {
    /// Get the adapter name (e.g. "openrouter", "gemini", "fal")
    fn name(&self) -> &str;

    /// Perform one generation call
    async fn send(&self, request: ChatRequest) -> Result<ProviderReply, ProviderError>;
}
