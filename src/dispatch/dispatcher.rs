// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Request orchestration
//!
//! Each inbound event runs a short state machine: authorize, resolve the
//! session and adapter, invoke the provider, update history, meter usage.
//! The session mutex is held for the whole sequence, so a user's requests
//! serialize while distinct users run in parallel. The provider call is the
//! only suspension point and is bounded by a timeout; a rate-limited call is
//! retried exactly once after the provider-specified delay.

use std::sync::Arc;
use std::time::Duration;

use crate::access::{Access, AccessGate};
use crate::config::Settings;
use crate::dispatch::event::{Command, InboundEvent, OutboundReply};
use crate::error::ProviderError;
use crate::provider::adapter::{
    ChatRequest, ProviderAdapter, ProviderReply, ReplyContent, TokenUsage,
};
use crate::provider::registry::{ModelDescriptor, ProviderRegistry};
use crate::provider::turn::Turn;
use crate::session::store::{ConversationSession, SessionEntry, SessionStore};
use crate::usage::{UsageRecord, UsageSink};

/// Tunables the dispatcher reads per request
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Fallback model when a session's selection no longer resolves
    pub default_model: String,

    /// Response token cap passed to adapters
    pub max_tokens: u32,

    /// Sampling temperature passed to adapters
    pub temperature: f32,

    /// Hard deadline for one provider call
    pub provider_timeout: Duration,

    /// Ceiling on the provider-requested rate-limit delay
    pub retry_after_ceiling: Duration,
}

impl DispatcherConfig {
    /// Build from settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_model: settings.defaults.model.clone(),
            max_tokens: settings.defaults.max_tokens,
            temperature: settings.defaults.temperature,
            provider_timeout: Duration::from_secs(settings.resilience.provider_timeout_secs),
            retry_after_ceiling: Duration::from_secs(settings.resilience.retry_after_ceiling_secs),
        }
    }
}

/// The orchestration core
pub struct Dispatcher {
    gate: AccessGate,
    registry: Arc<ProviderRegistry>,
    sessions: Arc<SessionStore>,
    sink: Arc<dyn UsageSink>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        gate: AccessGate,
        registry: Arc<ProviderRegistry>,
        sessions: Arc<SessionStore>,
        sink: Arc<dyn UsageSink>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            gate,
            registry,
            sessions,
            sink,
            config,
        }
    }

    /// Wire a dispatcher from settings, a built registry, and a sink
    pub fn from_settings(
        settings: &Settings,
        registry: Arc<ProviderRegistry>,
        sink: Arc<dyn UsageSink>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(
            settings.defaults.model.clone(),
            settings.conversation.chars_per_token,
        ));
        Self::new(
            AccessGate::new(settings),
            registry,
            sessions,
            sink,
            DispatcherConfig::from_settings(settings),
        )
    }

    /// The session store, for transport-driven cancel
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// The model registry backing this dispatcher
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Process one inbound event to a terminal reply
    ///
    /// Always returns a well-formed reply; no fault escapes to the
    /// transport.
    pub async fn dispatch(&self, event: InboundEvent) -> OutboundReply {
        let access = self.gate.authorize(&event.user_id);
        if access.is_denied() {
            tracing::info!(user = %event.user_id, "denied inbound event");
            return OutboundReply::failure("You are not allowed to use this service.");
        }

        match event.command {
            Some(command) => self.handle_command(access, &event.user_id, command).await,
            None => self.handle_message(&event.user_id, &event.text).await,
        }
    }

    async fn handle_command(
        &self,
        access: Access,
        user_id: &str,
        command: Command,
    ) -> OutboundReply {
        match command {
            Command::SwitchModel { model_id } => {
                match self
                    .sessions
                    .set_active_model(user_id, &model_id, &self.registry)
                    .await
                {
                    Ok(()) => {
                        let display = self
                            .registry
                            .resolve(&model_id)
                            .map(|(d, _)| d.display_name.clone())
                            .unwrap_or_else(|_| model_id.clone());
                        OutboundReply::text(format!("Now chatting with {}.", display))
                    }
                    Err(_) => OutboundReply::failure(format!("Unknown model: {}", model_id)),
                }
            }
            Command::ListModels => OutboundReply::text(self.render_model_list()),
            Command::Clear => {
                self.sessions.clear(user_id).await;
                OutboundReply::text("History cleared.")
            }
            Command::Regenerate => self.handle_regenerate(user_id).await,
            Command::ResetUser { target_user_id } => {
                if !access.is_admin() {
                    return OutboundReply::failure("This command requires admin access.");
                }
                if self.sessions.reset(&target_user_id).await {
                    OutboundReply::text(format!("Session for {} was reset.", target_user_id))
                } else {
                    OutboundReply::failure(format!("No session found for {}.", target_user_id))
                }
            }
            Command::Broadcast { text } => {
                if !access.is_admin() {
                    return OutboundReply::failure("This command requires admin access.");
                }
                OutboundReply::broadcast(text, self.gate.allowed_users())
            }
        }
    }

    async fn handle_message(&self, user_id: &str, text: &str) -> OutboundReply {
        if text.trim().is_empty() {
            return OutboundReply::failure("Message is empty.");
        }

        let entry = self.sessions.get_or_create(user_id).await;
        let mut session = entry.lock().await;
        let (descriptor, adapter) = match self.resolve_active(&mut session) {
            Ok(resolved) => resolved,
            Err(_) => return OutboundReply::failure("No model is available right now."),
        };

        session.push_turn(
            Turn::user(text),
            descriptor.max_tokens,
            self.sessions.chars_per_token(),
        );

        self.invoke(&entry, &mut session, &descriptor, adapter, user_id)
            .await
    }

    async fn handle_regenerate(&self, user_id: &str) -> OutboundReply {
        let entry = self.sessions.get_or_create(user_id).await;
        let mut session = entry.lock().await;

        session.pop_trailing_assistant();
        if !session.has_user_turn() {
            return OutboundReply::failure("Nothing to regenerate.");
        }

        let (descriptor, adapter) = match self.resolve_active(&mut session) {
            Ok(resolved) => resolved,
            Err(_) => return OutboundReply::failure("No model is available right now."),
        };
        self.invoke(&entry, &mut session, &descriptor, adapter, user_id)
            .await
    }

    /// Resolve the session's model, repairing a stale selection
    ///
    /// A selection can stop resolving when the catalog changes between
    /// restarts; the chat path falls back to the default model instead of
    /// failing the request.
    fn resolve_active(
        &self,
        session: &mut ConversationSession,
    ) -> crate::Result<(ModelDescriptor, Arc<dyn ProviderAdapter>)> {
        if let Ok((descriptor, adapter)) = self.registry.resolve(session.active_model()) {
            return Ok((descriptor.clone(), adapter));
        }

        tracing::warn!(
            model = %session.active_model(),
            fallback = %self.config.default_model,
            "active model no longer resolves; falling back"
        );
        session.select_model(self.config.default_model.clone());
        let (descriptor, adapter) = self.registry.resolve(&self.config.default_model)?;
        Ok((descriptor.clone(), adapter))
    }

    async fn invoke(
        &self,
        entry: &SessionEntry,
        session: &mut ConversationSession,
        descriptor: &ModelDescriptor,
        adapter: Arc<dyn ProviderAdapter>,
        user_id: &str,
    ) -> OutboundReply {
        let epoch = entry.epoch();
        let request = ChatRequest::new(descriptor.id.clone(), session.turns().to_vec())
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_modality(descriptor.modality);

        match self.call_with_retry(adapter.as_ref(), request).await {
            Ok(reply) => {
                if entry.epoch() != epoch {
                    tracing::debug!(user = %user_id, "discarding stale completion");
                    self.emit_usage(user_id, &descriptor.id, reply.usage, false).await;
                    return OutboundReply::failure("Request was superseded.");
                }

                session.push_turn(
                    Turn::assistant(history_text(&reply.content)),
                    descriptor.max_tokens,
                    self.sessions.chars_per_token(),
                );
                self.emit_usage(user_id, &descriptor.id, reply.usage, true).await;
                OutboundReply::content(reply.content)
            }
            Err(error) => {
                tracing::warn!(
                    user = %user_id,
                    model = %descriptor.id,
                    error = %error,
                    "provider call failed"
                );
                self.emit_usage(user_id, &descriptor.id, TokenUsage::default(), false)
                    .await;
                OutboundReply::failure(error.user_message())
            }
        }
    }

    /// One bounded call, retried once on a rate limit
    async fn call_with_retry(
        &self,
        adapter: &dyn ProviderAdapter,
        request: ChatRequest,
    ) -> Result<ProviderReply, ProviderError> {
        match self.call_once(adapter, request.clone()).await {
            Err(ProviderError::RateLimited(secs)) => {
                let delay =
                    Duration::from_secs(u64::from(secs)).min(self.config.retry_after_ceiling);
                tracing::debug!(delay_secs = delay.as_secs(), "rate limited; retrying once");
                tokio::time::sleep(delay).await;
                self.call_once(adapter, request).await
            }
            other => other,
        }
    }

    async fn call_once(
        &self,
        adapter: &dyn ProviderAdapter,
        request: ChatRequest,
    ) -> Result<ProviderReply, ProviderError> {
        match tokio::time::timeout(self.config.provider_timeout, adapter.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        }
    }

    async fn emit_usage(&self, user_id: &str, model_id: &str, usage: TokenUsage, success: bool) {
        let record = UsageRecord::new(user_id, model_id, usage, success);
        if let Err(error) = self.sink.record(record).await {
            tracing::warn!(error = %error, "usage sink rejected record; continuing");
        }
    }

    fn render_model_list(&self) -> String {
        let mut lines = vec!["Available models:".to_string()];
        for descriptor in self.registry.list() {
            lines.push(format!(
                "  {} - {} ({})",
                descriptor.id, descriptor.display_name, descriptor.modality
            ));
        }
        lines.join("\n")
    }
}

/// How a reply lands in history: text verbatim, images by their URL
fn history_text(content: &ReplyContent) -> String {
    match content {
        ReplyContent::Text { text } => text.clone(),
        ReplyContent::ImageUrl { url } => url.clone(),
    }
}
