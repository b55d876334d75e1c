// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Concrete provider adapter implementations

pub mod fal;
pub mod gemini;
pub mod openrouter;

pub use fal::FalAdapter;
pub use gemini::GeminiAdapter;
pub use openrouter::OpenRouterAdapter;
