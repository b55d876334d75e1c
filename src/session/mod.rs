// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session module for Switchboard
//!
//! Per-user conversation state with per-key locking.

pub mod store;

pub use store::{ConversationSession, SessionEntry, SessionStore};
