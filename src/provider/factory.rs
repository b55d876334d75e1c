// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Registry assembly from settings
//!
//! Builds the startup model catalog: a provider's models are registered only
//! when its API credential resolves, so a partially configured deployment
//! simply offers fewer models.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::{GatewayError, Result};
use crate::provider::adapter::Modality;
use crate::provider::adapters::{FalAdapter, GeminiAdapter, OpenRouterAdapter};
use crate::provider::registry::{ModelDescriptor, ProviderRegistry};

/// Factory for the startup registry
pub struct ProviderFactory;

impl ProviderFactory {
    /// Build the registry from settings
    ///
    /// Fails when no provider is configured at all, or when the configured
    /// default model did not make it into the catalog.
    pub fn build_registry(settings: &Settings) -> Result<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();

        if let Some(api_key) = settings.get_openrouter_api_key() {
            let adapter = match &settings.providers.openrouter.base_url {
                Some(base_url) => Arc::new(OpenRouterAdapter::with_base_url(api_key, base_url)),
                None => Arc::new(OpenRouterAdapter::new(api_key)),
            };
            for descriptor in Self::openrouter_models() {
                tracing::debug!(model = %descriptor.id, "registering openrouter model");
                registry.register(descriptor, adapter.clone())?;
            }
        }

        if let Some(api_key) = settings.get_gemini_api_key() {
            let adapter = match &settings.providers.gemini.base_url {
                Some(base_url) => Arc::new(GeminiAdapter::with_base_url(api_key, base_url)),
                None => Arc::new(GeminiAdapter::new(api_key)),
            };
            for descriptor in Self::gemini_models() {
                tracing::debug!(model = %descriptor.id, "registering gemini model");
                registry.register(descriptor, adapter.clone())?;
            }
        }

        if let Some(api_key) = settings.get_fal_api_key() {
            let adapter = match &settings.providers.fal.base_url {
                Some(base_url) => Arc::new(FalAdapter::with_base_url(api_key, base_url)),
                None => Arc::new(FalAdapter::new(api_key)),
            };
            for descriptor in Self::fal_models() {
                tracing::debug!(model = %descriptor.id, "registering fal model");
                registry.register(descriptor, adapter.clone())?;
            }
        }

        if registry.is_empty() {
            return Err(GatewayError::Config(
                "no provider credentials configured; the catalog is empty".to_string(),
            ));
        }
        if !registry.contains(&settings.defaults.model) {
            return Err(GatewayError::Config(format!(
                "default model {} is not in the catalog",
                settings.defaults.model
            )));
        }

        tracing::info!(models = registry.len(), "provider registry built");
        Ok(registry)
    }

    /// Text models served through OpenRouter
    fn openrouter_models() -> Vec<ModelDescriptor> {
        vec![
            ModelDescriptor::new(
                "openai/gpt-4o",
                "GPT-4o",
                Modality::Text,
                "openrouter",
                128_000,
            )
            .with_streaming(),
            ModelDescriptor::new(
                "openai/gpt-4o-mini",
                "GPT-4o Mini",
                Modality::Text,
                "openrouter",
                128_000,
            )
            .with_streaming(),
            ModelDescriptor::new(
                "anthropic/claude-3.5-sonnet",
                "Claude 3.5 Sonnet",
                Modality::Text,
                "openrouter",
                200_000,
            )
            .with_streaming(),
            ModelDescriptor::new(
                "perplexity/sonar",
                "Perplexity Sonar",
                Modality::Text,
                "openrouter",
                127_000,
            ),
        ]
    }

    /// Models served by the direct Gemini API
    fn gemini_models() -> Vec<ModelDescriptor> {
        vec![
            ModelDescriptor::new(
                "gemini-2.0-flash",
                "Gemini 2.0 Flash",
                Modality::Text,
                "gemini",
                1_000_000,
            )
            .with_streaming(),
            ModelDescriptor::new(
                "gemini-1.5-pro",
                "Gemini 1.5 Pro",
                Modality::Text,
                "gemini",
                2_000_000,
            )
            .with_streaming(),
        ]
    }

    /// Image models served by Fal
    fn fal_models() -> Vec<ModelDescriptor> {
        vec![ModelDescriptor::new(
            "fal-ai/flux/dev",
            "FLUX.1 dev",
            Modality::Image,
            "fal",
            4_096,
        )]
    }
}
