// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Transport-facing event types
//!
//! The transport feeds [`InboundEvent`]s to the dispatcher and relays
//! [`OutboundReply`]s back to the user. Both sides are plain data so any
//! transport (bot API, CLI, test harness) can drive the core.

use serde::{Deserialize, Serialize};

use crate::provider::adapter::ReplyContent;

/// A user action other than a plain chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Select a different model for this user's session
    SwitchModel { model_id: String },
    /// Show the model-switch menu
    ListModels,
    /// Clear this user's history, keeping the model selection
    Clear,
    /// Re-run the last exchange, replacing the previous response
    Regenerate,
    /// Admin: forcibly reset another user's session
    ResetUser { target_user_id: String },
    /// Admin: send a message to every allowed user
    Broadcast { text: String },
}

/// One inbound user event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InboundEvent {
    /// Opaque user identifier from the transport
    pub user_id: String,

    /// Message text; empty for pure commands
    #[serde(default)]
    pub text: String,

    /// Optional command; when present, `text` is ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
}

impl InboundEvent {
    /// A plain chat message
    pub fn message(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            command: None,
        }
    }

    /// A command event
    pub fn command(user_id: impl Into<String>, command: Command) -> Self {
        Self {
            user_id: user_id.into(),
            text: String::new(),
            command: Some(command),
        }
    }
}

/// One outbound reply to the transport
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundReply {
    /// Content to deliver, absent on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ReplyContent>,

    /// Whether the request completed
    pub success: bool,

    /// User-facing failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Additional recipients for a broadcast; empty for normal replies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub broadcast_to: Vec<String>,
}

impl OutboundReply {
    /// A successful reply carrying provider content
    pub fn content(content: ReplyContent) -> Self {
        Self {
            content: Some(content),
            success: true,
            error: None,
            broadcast_to: Vec::new(),
        }
    }

    /// A successful plain-text reply
    pub fn text(text: impl Into<String>) -> Self {
        Self::content(ReplyContent::Text { text: text.into() })
    }

    /// A failed reply with a user-facing reason
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            content: None,
            success: false,
            error: Some(reason.into()),
            broadcast_to: Vec::new(),
        }
    }

    /// A broadcast: text for the transport to fan out to `recipients`
    pub fn broadcast(text: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            content: Some(ReplyContent::Text { text: text.into() }),
            success: true,
            error: None,
            broadcast_to: recipients,
        }
    }

    /// Text content, if this reply carries any
    pub fn text_content(&self) -> Option<&str> {
        self.content.as_ref().and_then(|c| c.as_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructor() {
        let event = InboundEvent::message("u1", "hello");
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.text, "hello");
        assert!(event.command.is_none());
    }

    #[test]
    fn test_command_constructor() {
        let event = InboundEvent::command("u1", Command::Clear);
        assert_eq!(event.command, Some(Command::Clear));
        assert!(event.text.is_empty());
    }

    #[test]
    fn test_reply_text() {
        let reply = OutboundReply::text("hi");
        assert!(reply.success);
        assert_eq!(reply.text_content(), Some("hi"));
        assert!(reply.error.is_none());
        assert!(reply.broadcast_to.is_empty());
    }

    #[test]
    fn test_reply_failure() {
        let reply = OutboundReply::failure("nope");
        assert!(!reply.success);
        assert!(reply.content.is_none());
        assert_eq!(reply.error.as_deref(), Some("nope"));
    }

    #[test]
    fn test_reply_broadcast() {
        let reply = OutboundReply::broadcast("maintenance at noon", vec!["a".to_string()]);
        assert!(reply.success);
        assert_eq!(reply.broadcast_to, vec!["a".to_string()]);
        assert_eq!(reply.text_content(), Some("maintenance at noon"));
    }

    #[test]
    fn test_command_serde_tags() {
        let json = serde_json::to_string(&Command::SwitchModel {
            model_id: "gpt".to_string(),
        })
        .unwrap();
        assert!(json.contains("switch_model"));

        let parsed: Command = serde_json::from_str(r#"{"type":"list_models"}"#).unwrap();
        assert_eq!(parsed, Command::ListModels);
    }

    #[test]
    fn test_inbound_event_deserializes_without_command() {
        let parsed: InboundEvent =
            serde_json::from_str(r#"{"user_id":"7","text":"hey"}"#).unwrap();
        assert_eq!(parsed, InboundEvent::message("7", "hey"));
    }
}
