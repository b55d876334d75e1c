// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Switchboard - multi-user AI chat gateway.
//!
//! This crate exposes the routing core embedded by a chat transport:
//! - `provider`: adapter abstraction, model registry, and concrete backends
//!   (OpenRouter/Gemini/Fal)
//! - `session`: per-user conversation state with per-key locking
//! - `access`: allow-list/admin authorization
//! - `dispatch`: the per-request state machine tying it all together
//! - `usage`: usage metering records and sinks
//! - `config`: settings loaded from TOML or the environment
//!
//! The transport owns message delivery and `main`; it feeds
//! [`dispatch::InboundEvent`]s in and relays [`dispatch::OutboundReply`]s
//! out.

pub mod access;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod provider;
pub mod session;
pub mod usage;

pub use error::{GatewayError, ProviderError, Result};
