// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider module for Switchboard
//!
//! Provides the abstraction over text and image backends: the adapter
//! contract, the model registry, and the concrete adapters.

pub mod adapter;
pub mod adapters;
pub mod factory;
pub mod mock;
pub mod registry;
pub mod turn;

pub use adapter::*;
pub use factory::ProviderFactory;
pub use mock::MockAdapter;
pub use registry::{ModelDescriptor, ProviderRegistry};
pub use turn::{estimate_history_tokens, Turn, TurnRole};
