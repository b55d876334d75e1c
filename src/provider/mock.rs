// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scriptable adapter for tests
//!
//! Returns queued results in order, records every request it receives, and
//! can simulate provider latency. Used by dispatcher and session tests that
//! must not touch the network.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::adapter::{ChatRequest, ProviderAdapter, ProviderReply, TokenUsage};

type MockResult = Result<ProviderReply, ProviderError>;

/// In-process adapter with scripted responses
#[derive(Debug)]
pub struct MockAdapter {
    name: String,
    queue: Mutex<VecDeque<MockResult>>,
    calls: Mutex<Vec<ChatRequest>>,
    latency: Option<Duration>,
}

impl MockAdapter {
    /// Create a mock that answers every call with a canned text reply
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            queue: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// Set the adapter name reported to the registry
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Simulate provider latency on every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a successful text reply
    pub fn push_text(&self, text: impl Into<String>, usage: TokenUsage) {
        self.push_result(Ok(ProviderReply::text(text, usage)));
    }

    /// Queue an error
    pub fn push_error(&self, error: ProviderError) {
        self.push_result(Err(error));
    }

    /// Queue an arbitrary result
    pub fn push_result(&self, result: MockResult) {
        self.queue.lock().unwrap().push_back(result);
    }

    /// Number of calls received so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Snapshot of every request received, in order
    pub fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// The most recent request, if any
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.calls.lock().unwrap().last().cloned()
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: ChatRequest) -> Result<ProviderReply, ProviderError> {
        self.calls.lock().unwrap().push(request);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.queue.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(ProviderReply::text("mock reply", TokenUsage::new(1, 1))),
        }
    }
}
