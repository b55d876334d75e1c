// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-user conversation state
//!
//! The store owns one [`ConversationSession`] per user identifier. Each
//! session sits behind its own async mutex so users serialize only against
//! themselves; the outer map lock is held just long enough to find or insert
//! an entry. Sessions carry a monotonic epoch counter, bumpable without the
//! session mutex, so in-flight provider completions can be detected as stale
//! after a cancel or reset.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::error::Result;
use crate::provider::registry::ProviderRegistry;
use crate::provider::turn::{estimate_history_tokens, Turn, TurnRole};

/// One user's conversation: retained turns plus the active model selection
#[derive(Debug, Clone)]
pub struct ConversationSession {
    turns: Vec<Turn>,
    active_model: String,
    created_at: DateTime<Utc>,
}

impl ConversationSession {
    fn new(active_model: impl Into<String>) -> Self {
        Self {
            turns: Vec::new(),
            active_model: active_model.into(),
            created_at: Utc::now(),
        }
    }

    /// Retained turns, oldest first
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Identifier of the currently selected model
    pub fn active_model(&self) -> &str {
        &self.active_model
    }

    /// When the session was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Replace the model selection
    ///
    /// Validation against the registry happens in [`SessionStore`]; the
    /// dispatcher also calls this directly when repairing a selection that
    /// no longer resolves.
    pub fn select_model(&mut self, model_id: impl Into<String>) {
        self.active_model = model_id.into();
    }

    /// Append a turn, then enforce the history budget
    ///
    /// While the token estimate of retained turns exceeds `budget_tokens`,
    /// turns are evicted from the oldest end. The most recent system turn
    /// and the turn just appended are never evicted. Returns the number of
    /// evicted turns.
    pub fn push_turn(&mut self, turn: Turn, budget_tokens: u32, chars_per_token: u32) -> usize {
        self.turns.push(turn);
        self.enforce_budget(budget_tokens, chars_per_token)
    }

    fn enforce_budget(&mut self, budget_tokens: u32, chars_per_token: u32) -> usize {
        let mut evicted = 0;
        while estimate_history_tokens(&self.turns, chars_per_token) > budget_tokens {
            let newest = self.turns.len() - 1;
            let protected = self
                .turns
                .iter()
                .rposition(|t| t.role == TurnRole::System);
            let candidate =
                (0..self.turns.len()).find(|&i| Some(i) != protected && i != newest);
            match candidate {
                Some(i) => {
                    self.turns.remove(i);
                    evicted += 1;
                }
                // Only the newest turn and a protected system turn remain;
                // the budget cannot be met by further eviction
                None => break,
            }
        }
        evicted
    }

    /// Remove a trailing assistant turn, if present
    ///
    /// Regeneration re-runs the last exchange; the superseded response must
    /// not stay in history.
    pub fn pop_trailing_assistant(&mut self) -> Option<Turn> {
        if matches!(self.turns.last(), Some(t) if t.role == TurnRole::Assistant) {
            self.turns.pop()
        } else {
            None
        }
    }

    /// Whether any user turn is retained
    pub fn has_user_turn(&self) -> bool {
        self.turns.iter().any(|t| t.role == TurnRole::User)
    }

    /// Reset history to empty; the model selection survives
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Token estimate of the retained history
    pub fn estimate_tokens(&self, chars_per_token: u32) -> u32 {
        estimate_history_tokens(&self.turns, chars_per_token)
    }
}

/// A session plus its epoch counter
///
/// The epoch is intentionally outside the mutex: cancel and reset bump it
/// without waiting behind an in-flight provider call.
pub struct SessionEntry {
    state: Mutex<ConversationSession>,
    epoch: AtomicU64,
}

impl SessionEntry {
    fn new(session: ConversationSession) -> Self {
        Self {
            state: Mutex::new(session),
            epoch: AtomicU64::new(0),
        }
    }

    /// Lock the session for a read-modify-write sequence
    pub async fn lock(&self) -> MutexGuard<'_, ConversationSession> {
        self.state.lock().await
    }

    /// Current epoch; capture before a provider call, compare after
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub(crate) fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Owns every user's session, keyed by user identifier
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionEntry>>>,
    default_model: String,
    chars_per_token: u32,
}

impl SessionStore {
    pub fn new(default_model: impl Into<String>, chars_per_token: u32) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_model: default_model.into(),
            chars_per_token: chars_per_token.max(1),
        }
    }

    /// Characters-per-token heuristic shared by budget enforcement
    pub fn chars_per_token(&self) -> u32 {
        self.chars_per_token
    }

    /// Fetch a user's session entry, creating an empty one on first access
    pub async fn get_or_create(&self, user_id: &str) -> Arc<SessionEntry> {
        {
            let sessions = self.sessions.read().await;
            if let Some(entry) = sessions.get(user_id) {
                return Arc::clone(entry);
            }
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(user_id.to_string()).or_insert_with(|| {
            tracing::debug!(user = %user_id, "creating session");
            Arc::new(SessionEntry::new(ConversationSession::new(
                self.default_model.clone(),
            )))
        }))
    }

    /// Fetch a user's session entry without creating one
    pub async fn get(&self, user_id: &str) -> Option<Arc<SessionEntry>> {
        self.sessions.read().await.get(user_id).cloned()
    }

    /// Switch a user's active model
    ///
    /// Fails with UnknownModel when the registry cannot resolve the id; the
    /// previous selection and the history stay untouched either way.
    pub async fn set_active_model(
        &self,
        user_id: &str,
        model_id: &str,
        registry: &ProviderRegistry,
    ) -> Result<()> {
        registry.resolve(model_id)?;
        let entry = self.get_or_create(user_id).await;
        let mut session = entry.lock().await;
        session.select_model(model_id);
        Ok(())
    }

    /// Clear a user's history, retaining the model selection
    pub async fn clear(&self, user_id: &str) {
        if let Some(entry) = self.get(user_id).await {
            entry.lock().await.clear();
        }
    }

    /// Admin path: invalidate in-flight work and drop the session entirely
    ///
    /// Returns false when the user had no session.
    pub async fn reset(&self, user_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(user_id);
        match removed {
            Some(entry) => {
                entry.bump_epoch();
                tracing::info!(user = %user_id, "session reset");
                true
            }
            None => false,
        }
    }

    /// Transport path: mark any in-flight completion for this user stale
    ///
    /// History is untouched; the next completed provider call for the old
    /// epoch is discarded.
    pub async fn cancel(&self, user_id: &str) -> bool {
        match self.get(user_id).await {
            Some(entry) => {
                entry.bump_epoch();
                true
            }
            None => false,
        }
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::adapter::Modality;
    use crate::provider::registry::ModelDescriptor;
    use crate::provider::MockAdapter;
    use proptest::prelude::*;

    fn registry_with(ids: &[&str]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        let adapter = Arc::new(MockAdapter::new());
        for id in ids {
            registry
                .register(
                    ModelDescriptor::new(*id, *id, Modality::Text, "mock", 1000),
                    adapter.clone(),
                )
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_get_or_create_uses_default_model() {
        let store = SessionStore::new("default-model", 4);
        let entry = store.get_or_create("u1").await;
        let session = entry.lock().await;
        assert_eq!(session.active_model(), "default-model");
        assert!(session.turns().is_empty());
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = SessionStore::new("m", 4);
        let a = store.get_or_create("u1").await;
        let b = store.get_or_create("u1").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_set_active_model_unknown_fails_and_keeps_previous() {
        let store = SessionStore::new("m1", 4);
        let registry = registry_with(&["m1", "m2"]);

        store.set_active_model("u1", "m2", &registry).await.unwrap();

        let err = store
            .set_active_model("u1", "ghost", &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::GatewayError::UnknownModel(_)));

        let entry = store.get("u1").await.unwrap();
        assert_eq!(entry.lock().await.active_model(), "m2");
    }

    #[tokio::test]
    async fn test_switch_then_clear_keeps_model() {
        let store = SessionStore::new("m1", 4);
        let registry = registry_with(&["m1", "m2"]);

        {
            let entry = store.get_or_create("u1").await;
            entry.lock().await.push_turn(Turn::user("hello"), 1000, 4);
        }
        store.set_active_model("u1", "m2", &registry).await.unwrap();
        store.clear("u1").await;

        let entry = store.get("u1").await.unwrap();
        let session = entry.lock().await;
        assert_eq!(session.active_model(), "m2");
        assert!(session.turns().is_empty());
    }

    #[tokio::test]
    async fn test_clear_without_session_is_noop() {
        let store = SessionStore::new("m", 4);
        store.clear("nobody").await;
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_reset_removes_session_and_bumps_epoch() {
        let store = SessionStore::new("m", 4);
        let entry = store.get_or_create("u1").await;
        let before = entry.epoch();

        assert!(store.reset("u1").await);
        assert_eq!(store.session_count().await, 0);
        assert!(entry.epoch() > before);

        assert!(!store.reset("u1").await);
    }

    #[tokio::test]
    async fn test_cancel_bumps_epoch_keeps_history() {
        let store = SessionStore::new("m", 4);
        let entry = store.get_or_create("u1").await;
        entry.lock().await.push_turn(Turn::user("hi"), 1000, 4);
        let before = entry.epoch();

        assert!(store.cancel("u1").await);
        assert_eq!(entry.epoch(), before + 1);
        assert_eq!(entry.lock().await.turns().len(), 1);

        assert!(!store.cancel("stranger").await);
    }

    #[test]
    fn test_eviction_drops_oldest_until_budget_fits() {
        let mut session = ConversationSession::new("m");
        // 4 chars per token => each 8-char turn is 2 tokens
        session.push_turn(Turn::user("aaaaaaaa"), 6, 4);
        session.push_turn(Turn::assistant("bbbbbbbb"), 6, 4);
        session.push_turn(Turn::user("cccccccc"), 6, 4);
        assert_eq!(session.turns().len(), 3);

        // Fourth turn pushes the estimate to 8 tokens; oldest goes
        let evicted = session.push_turn(Turn::assistant("dddddddd"), 6, 4);
        assert_eq!(evicted, 1);
        let contents: Vec<&str> = session.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["bbbbbbbb", "cccccccc", "dddddddd"]);
    }

    #[test]
    fn test_eviction_preserves_most_recent_system_turn() {
        let mut session = ConversationSession::new("m");
        session.push_turn(Turn::system("S1S1S1S1"), 100, 4);
        session.push_turn(Turn::user("aaaaaaaa"), 100, 4);
        session.push_turn(Turn::assistant("bbbbbbbb"), 100, 4);

        // Budget of 4 tokens forces heavy eviction; the system turn stays
        session.push_turn(Turn::user("cccccccc"), 4, 4);
        let roles: Vec<TurnRole> = session.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![TurnRole::System, TurnRole::User]);
        assert_eq!(session.turns()[1].content, "cccccccc");
    }

    #[test]
    fn test_eviction_never_drops_newest_turn() {
        let mut session = ConversationSession::new("m");
        // A single oversized turn stays even though it busts the budget
        let evicted = session.push_turn(Turn::user("x".repeat(100)), 2, 4);
        assert_eq!(evicted, 0);
        assert_eq!(session.turns().len(), 1);
    }

    #[test]
    fn test_pop_trailing_assistant() {
        let mut session = ConversationSession::new("m");
        session.push_turn(Turn::user("q"), 100, 4);
        session.push_turn(Turn::assistant("a"), 100, 4);

        let popped = session.pop_trailing_assistant().unwrap();
        assert_eq!(popped.content, "a");
        assert_eq!(session.turns().len(), 1);

        // Trailing turn is now a user turn; nothing to pop
        assert!(session.pop_trailing_assistant().is_none());
        assert_eq!(session.turns().len(), 1);
    }

    #[test]
    fn test_has_user_turn() {
        let mut session = ConversationSession::new("m");
        assert!(!session.has_user_turn());
        session.push_turn(Turn::system("s"), 100, 4);
        assert!(!session.has_user_turn());
        session.push_turn(Turn::user("q"), 100, 4);
        assert!(session.has_user_turn());
    }

    proptest! {
        // Identical append sequences always retain the identical set
        #[test]
        fn prop_eviction_is_deterministic(
            contents in proptest::collection::vec("[a-z]{1,40}", 1..20),
            budget in 1u32..50,
        ) {
            let run = |contents: &[String], budget: u32| {
                let mut session = ConversationSession::new("m");
                for (i, content) in contents.iter().enumerate() {
                    let turn = if i % 2 == 0 {
                        Turn::user(content.clone())
                    } else {
                        Turn::assistant(content.clone())
                    };
                    session.push_turn(turn, budget, 4);
                }
                session
                    .turns()
                    .iter()
                    .map(|t| t.content.clone())
                    .collect::<Vec<_>>()
            };

            let first = run(&contents, budget);
            let second = run(&contents, budget);
            prop_assert_eq!(&first, &second);

            // The final history fits the budget whenever more than one turn
            // is retained; a lone oversized newest turn is the only excess
            if first.len() > 1 {
                let total: u32 = first
                    .iter()
                    .map(|c| (c.len().div_ceil(4)) as u32)
                    .sum();
                prop_assert!(total <= budget);
            }
        }
    }
}
