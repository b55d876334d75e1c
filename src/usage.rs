// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Usage metering
//!
//! One record per dispatcher invocation that reached the provider layer.
//! Records are handed to a [`UsageSink`]; emission is fire-and-forget and a
//! sink failure never aborts the user-facing reply.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::provider::adapter::TokenUsage;

/// One metered provider invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageRecord {
    /// Unique record identifier
    pub id: Uuid,

    /// Who sent the message
    pub user_id: String,

    /// Which model served (or failed) the request
    pub model_id: String,

    /// Input tokens consumed
    pub input_tokens: u32,

    /// Output tokens produced
    pub output_tokens: u32,

    /// When the invocation completed
    pub timestamp: DateTime<Utc>,

    /// Whether the invocation produced a reply
    pub success: bool,
}

impl UsageRecord {
    /// Create a record for a completed invocation
    pub fn new(
        user_id: impl Into<String>,
        model_id: impl Into<String>,
        usage: TokenUsage,
        success: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            model_id: model_id.into(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            timestamp: Utc::now(),
            success,
        }
    }

    /// Get total tokens metered
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Write-only consumer of usage records
#[async_trait]
pub trait UsageSink: Send + Sync {
    /// Consume one record
    async fn record(&self, record: UsageRecord) -> Result<()>;
}

/// Bounded in-memory sink
///
/// Keeps the most recent records up to a capacity; useful for embedding
/// transports that poll recent usage, and for tests.
pub struct MemoryUsageSink {
    records: Mutex<VecDeque<UsageRecord>>,
    capacity: usize,
}

impl MemoryUsageSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of retained records, oldest first
    pub async fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().await.iter().cloned().collect()
    }

    /// Number of retained records
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Sum of (input, output) tokens across retained records
    pub async fn totals(&self) -> (u64, u64) {
        let records = self.records.lock().await;
        records.iter().fold((0, 0), |(input, output), r| {
            (input + r.input_tokens as u64, output + r.output_tokens as u64)
        })
    }
}

#[async_trait]
impl UsageSink for MemoryUsageSink {
    async fn record(&self, record: UsageRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        Ok(())
    }
}

/// Sink that drops every record
pub struct NullUsageSink;

#[async_trait]
impl UsageSink for NullUsageSink {
    async fn record(&self, _record: UsageRecord) -> Result<()> {
        Ok(())
    }
}
