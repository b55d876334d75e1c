// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Switchboard
//!
//! This module defines all error types used throughout the gateway.

use thiserror::Error;

/// Main error type for gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Provider-boundary errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// User is not on the allow-list and is not the admin
    #[error("Access denied for user {0}")]
    AccessDenied(String),

    /// Model identifier not present in the registry
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Model identifier registered more than once
    #[error("Duplicate model: {0}")]
    DuplicateModel(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session errors
    #[error("Session error: {0}")]
    Session(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(String),
}

/// Errors produced at the provider adapter boundary
///
/// Every provider-side failure resolves to one of these variants before it
/// leaves an adapter; raw transport faults never escape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited; retry after the given number of seconds
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// The provider rejected the request as malformed or unprocessable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The provider is unreachable or failed server-side
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Response payload could not be decoded
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,
}

impl ProviderError {
    /// Whether the dispatcher's single bounded retry applies
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }

    /// User-facing description of the failure
    ///
    /// Invalid-input reasons pass through so the user can correct the
    /// request; everything operator-internal collapses to a generic message.
    pub fn user_message(&self) -> String {
        match self {
            ProviderError::RateLimited(secs) => {
                format!("The model is rate limited. Try again in {} seconds.", secs)
            }
            ProviderError::InvalidInput(reason) => {
                format!("The model rejected the request: {}", reason)
            }
            ProviderError::Timeout => "The model took too long to respond.".to_string(),
            ProviderError::AuthenticationFailed
            | ProviderError::Unavailable(_)
            | ProviderError::InvalidResponse(_)
            | ProviderError::Network(_) => {
                "The model is currently unavailable. Try again later.".to_string()
            }
        }
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        GatewayError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for GatewayError {
    fn from(err: toml::ser::Error) -> Self {
        GatewayError::Toml(err.to_string())
    }
}
