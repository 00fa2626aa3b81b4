//! Game session types.
//!
//! A `GameSession` is the evolving game document for one conversation. The
//! version counter moves in lockstep with `game_json`: every accepted change
//! increments it by exactly one, and a normal chat turn appends exactly two
//! conversation entries (the user message and the assistant reply).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SessionId, UserId, WorkspaceId};

/// The versioned, conversational game-document state for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    /// Opaque session token, stable across turns.
    pub session_id: SessionId,

    /// Owning workspace.
    pub workspace_id: WorkspaceId,

    /// Owning user. Other users are denied access at the handler layer.
    pub user_id: UserId,

    /// Display title, if the user named the game.
    pub game_title: Option<String>,

    /// The full current game document.
    pub game_json: serde_json::Value,

    /// Generated asset references (sprites, sounds) keyed by object.
    pub assets_manifest: serde_json::Value,

    /// Ordered chat transcript.
    pub conversation_history: Vec<ConversationEntry>,

    /// Monotonic document version. Starts at 1.
    pub version: i64,

    /// Lifecycle state.
    pub status: SessionStatus,

    /// URL of the last successful preview build, if any.
    pub preview_url: Option<String>,

    /// URL of the last successful export archive, if any.
    pub export_url: Option<String>,

    /// Sanitized message of the last build failure, cleared on the next
    /// successful build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_log: Option<String>,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// When the game document last changed.
    pub last_modified: DateTime<Utc>,
}

impl GameSession {
    /// Create a new active session at version 1 with the given initial
    /// document.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        workspace_id: WorkspaceId,
        user_id: UserId,
        game_json: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            workspace_id,
            user_id,
            game_title: None,
            game_json,
            assets_manifest: serde_json::Value::Array(Vec::new()),
            conversation_history: Vec::new(),
            version: 1,
            status: SessionStatus::Active,
            preview_url: None,
            export_url: None,
            error_log: None,
            created_at: now,
            last_modified: now,
        }
    }

    /// Replace the game document and bump the version.
    pub fn apply_game_json(&mut self, game_json: serde_json::Value) {
        self.game_json = game_json;
        self.version += 1;
        self.last_modified = Utc::now();
    }

    /// Append one full chat turn: the user message followed by the
    /// assistant reply (with its thinking narrative, when present).
    pub fn record_turn(
        &mut self,
        user_message: String,
        assistant_reply: String,
        thinking_process: Option<String>,
    ) {
        self.conversation_history
            .push(ConversationEntry::user(user_message));
        self.conversation_history
            .push(ConversationEntry::assistant(assistant_reply, thinking_process));
    }

    /// Display title, falling back to a short form of the session id.
    #[must_use]
    pub fn title(&self) -> String {
        self.game_title.clone().unwrap_or_else(|| {
            let id = self.session_id.to_string();
            format!("Game {}", &id[..8])
        })
    }

    /// Whether the session accepts modifications.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Move the session to the archived state.
    pub fn archive(&mut self) {
        self.status = SessionStatus::Archived;
    }

    /// Record failure diagnostics without touching the document or status.
    pub fn mark_error(&mut self, message: String) {
        self.error_log = Some(message);
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting chat turns and builds.
    Active,
    /// Retained for history, no further modifications.
    Archived,
}

/// One message in a session's transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// Who said it.
    pub role: ConversationRole,

    /// Message text.
    pub content: String,

    /// Assistant reasoning narrative, when the provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_process: Option<String>,

    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ConversationEntry {
    /// A user message.
    #[must_use]
    pub fn user(content: String) -> Self {
        Self {
            role: ConversationRole::User,
            content,
            thinking_process: None,
            timestamp: Utc::now(),
        }
    }

    /// An assistant reply.
    #[must_use]
    pub fn assistant(content: String, thinking_process: Option<String>) -> Self {
        Self {
            role: ConversationRole::Assistant,
            content,
            thinking_process,
            timestamp: Utc::now(),
        }
    }
}

/// Speaker of a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationRole {
    /// The end user.
    User,
    /// The AI assistant.
    Assistant,
}
