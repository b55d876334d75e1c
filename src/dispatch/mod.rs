// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Dispatch module for Switchboard
//!
//! The per-request state machine and the transport-facing event types.

pub mod dispatcher;
pub mod event;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use event::{Command, InboundEvent, OutboundReply};
