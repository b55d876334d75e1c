// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Access control for inbound events
//!
//! Authorization is a pure function of static configuration plus the user
//! identifier. The dispatcher consults the gate before any session or
//! provider work happens.

use std::collections::HashSet;

use crate::config::Settings;

/// Outcome of authorizing a user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The operator; unlocks admin-only commands
    Admin,
    /// On the allow-list
    Allowed,
    /// Everyone else; terminal for the request
    Denied,
}

impl Access {
    pub fn is_admin(&self) -> bool {
        matches!(self, Access::Admin)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Access::Denied)
    }
}

/// Authorizes user identifiers against the configured allow-list
#[derive(Debug, Clone)]
pub struct AccessGate {
    allowed: HashSet<String>,
    admin_id: String,
}

impl AccessGate {
    /// Build a gate from settings
    pub fn new(settings: &Settings) -> Self {
        Self::from_parts(
            settings.access.allowed_user_ids.iter().cloned(),
            settings.access.admin_id.clone(),
        )
    }

    /// Build a gate from explicit parts
    pub fn from_parts(allowed: impl IntoIterator<Item = String>, admin_id: String) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            admin_id,
        }
    }

    /// Authorize a user identifier
    pub fn authorize(&self, user_id: &str) -> Access {
        if user_id == self.admin_id {
            Access::Admin
        } else if self.allowed.contains(user_id) {
            Access::Allowed
        } else {
            Access::Denied
        }
    }

    /// All user identifiers that may receive a broadcast, admin included
    pub fn allowed_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.allowed.iter().cloned().collect();
        users.sort();
        if !users.contains(&self.admin_id) {
            users.push(self.admin_id.clone());
        }
        users
    }
}
