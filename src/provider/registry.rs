// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model registry
//!
//! Maps model identifiers to their adapter and declared capabilities. The
//! registry is built once at startup and read-only afterwards, so readers
//! share it via `Arc` without locking.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::provider::adapter::{Modality, ProviderAdapter};

/// Capabilities and identity of one registered model
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    /// Identifier users switch to (e.g. "openai/gpt-4o-mini")
    pub id: String,

    /// Human-readable name for menus
    pub display_name: String,

    /// What the model produces
    pub modality: Modality,

    /// Which adapter serves the model
    pub provider: String,

    /// Token budget for retained history
    pub max_tokens: u32,

    /// Whether the backing API can stream this model
    pub supports_streaming: bool,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        modality: Modality,
        provider: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            modality,
            provider: provider.into(),
            max_tokens,
            supports_streaming: false,
        }
    }

    pub fn with_streaming(mut self) -> Self {
        self.supports_streaming = true;
        self
    }
}

/// Registry of models available for routing
///
/// Insertion order is preserved so model-switch menus are stable.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    index: HashMap<String, usize>,
    entries: Vec<(ModelDescriptor, Arc<dyn ProviderAdapter>)>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its descriptor's identifier
    pub fn register(
        &mut self,
        descriptor: ModelDescriptor,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Result<()> {
        if self.index.contains_key(&descriptor.id) {
            return Err(GatewayError::DuplicateModel(descriptor.id));
        }
        self.index.insert(descriptor.id.clone(), self.entries.len());
        self.entries.push((descriptor, adapter));
        Ok(())
    }

    /// Resolve a model identifier to its descriptor and adapter
    pub fn resolve(&self, model_id: &str) -> Result<(&ModelDescriptor, Arc<dyn ProviderAdapter>)> {
        self.index
            .get(model_id)
            .map(|&i| {
                let (descriptor, adapter) = &self.entries[i];
                (descriptor, Arc::clone(adapter))
            })
            .ok_or_else(|| GatewayError::UnknownModel(model_id.to_string()))
    }

    /// Descriptors in registration order, for model-switch menus
    pub fn list(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.entries.iter().map(|(descriptor, _)| descriptor)
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.index.contains_key(model_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
