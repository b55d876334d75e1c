// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation turn primitives
//!
//! A turn is one utterance in a per-user conversation. Turns flow from the
//! session store into provider requests, so the token estimate used for the
//! history budget lives here too.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a turn's author
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// Standing context set by the operator or transport
    System,
    /// End-user message
    User,
    /// Model response
    Assistant,
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnRole::System => write!(f, "system"),
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single utterance in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    /// Who authored the turn
    pub role: TurnRole,

    /// Plain-text content
    pub content: String,

    /// When the turn was created
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a new user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Estimate token count using a characters-per-token heuristic
    ///
    /// Deterministic by construction; the history budget depends on that.
    pub fn estimate_tokens(&self, chars_per_token: u32) -> u32 {
        let chars_per_token = chars_per_token.max(1) as usize;
        (self.content.len().div_ceil(chars_per_token)) as u32
    }
}

/// Estimate the total token count for a sequence of turns
pub fn estimate_history_tokens(turns: &[Turn], chars_per_token: u32) -> u32 {
    turns.iter().map(|t| t.estimate_tokens(chars_per_token)).sum()
}
