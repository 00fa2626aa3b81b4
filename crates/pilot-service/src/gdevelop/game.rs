//! AI-driven game creation and modification.
//!
//! Each chat turn sends the conversation plus the current game document to a
//! provider and expects a complete replacement document back, fenced as JSON.
//! The reply is validated before anything is stored; a turn whose reply has
//! no document is a pure conversation turn and leaves the version untouched.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use pilot_core::{
    merge_preserving_existing, validate_game_json, ConversationRole, GameSession, SessionId,
    UserId, WorkspaceId,
};
use pilot_store::{SessionTurn, Store};

use crate::error::ApiError;
use crate::providers::{
    ChatCompletion, ChatMessage, ChatRequest, ProviderRegistry, DEFAULT_MAX_TOKENS,
};

/// How much conversation history each provider call carries.
const HISTORY_WINDOW: usize = 20;

/// System prompt for game generation turns.
const SYSTEM_PROMPT: &str = "You are a GDevelop game designer. You create and \
modify HTML5 games as GDevelop project JSON. Always reply with a short \
explanation followed by the COMPLETE updated project document in a ```json \
fenced block. The document must keep `properties.name`, at least one entry \
in `layouts`, and an `objects` array. Never omit objects or layouts that \
already exist unless the user asked for their removal. If the user is only \
asking a question, answer it without a JSON block.";

/// Per-turn options carried through from the API request.
#[derive(Debug, Clone, Default)]
pub struct ChatTurnOptions {
    /// Provider name; registry default when `None`.
    pub provider: Option<String>,
    /// Model override.
    pub model: Option<String>,
    /// Carry over objects, variables, and layouts the reply dropped.
    pub preserve_existing: bool,
}

impl ChatTurnOptions {
    /// Options with element preservation on, matching the API default.
    #[must_use]
    pub fn preserving() -> Self {
        Self {
            provider: None,
            model: None,
            preserve_existing: true,
        }
    }
}

/// Result of one accepted chat turn.
#[derive(Debug)]
pub struct TurnOutcome {
    /// The stored session after the turn.
    pub session: GameSession,
    /// The provider completion, for credit deduction.
    pub completion: ChatCompletion,
    /// Whether the turn changed the game document (and bumped the version).
    pub game_changed: bool,
}

/// Orchestrates provider calls and session storage for game turns.
pub struct GameService {
    store: Arc<dyn Store>,
    providers: Arc<ProviderRegistry>,
}

impl GameService {
    /// Create the service over a store and provider registry.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, providers: Arc<ProviderRegistry>) -> Self {
        Self { store, providers }
    }

    /// Start a new session from the user's first message. The session is
    /// stored at version 1 with the generated (validated) document and the
    /// opening turn in its history.
    ///
    /// # Errors
    ///
    /// Fails on provider errors, document validation failures, and store
    /// errors.
    #[instrument(skip(self, message, options), fields(%workspace_id, %user_id))]
    pub async fn create_game(
        &self,
        session_id: SessionId,
        workspace_id: WorkspaceId,
        user_id: UserId,
        message: &str,
        options: &ChatTurnOptions,
    ) -> Result<TurnOutcome, ApiError> {
        let completion = self
            .call_provider(options, None, Vec::new(), message)
            .await?;

        // A creation turn without a document still yields a playable game.
        let game_json = extract_game_json(&completion.content)
            .unwrap_or_else(|| starter_game(&derive_title(message)));
        validate_game_json(&game_json).map_err(ApiError::Validation)?;

        let mut session = GameSession::new(session_id, workspace_id, user_id, game_json);
        session.game_title = title_from_document(&session.game_json);
        session.record_turn(
            message.to_owned(),
            completion.content.clone(),
            completion.thinking.clone(),
        );
        self.store.put_session(&session)?;

        info!(%session_id, title = %session.title(), "Game session created");
        Ok(TurnOutcome {
            session,
            completion,
            game_changed: true,
        })
    }

    /// Apply one chat turn to an existing session. When the reply carries a
    /// document it is merged, validated, and stored with the version check;
    /// otherwise the turn only extends the conversation.
    ///
    /// # Errors
    ///
    /// Fails on provider errors, validation failures, `VersionConflict` when
    /// the session changed since it was read, and store errors.
    #[instrument(skip(self, session, message, options), fields(session_id = %session.session_id, version = session.version))]
    pub async fn modify_game(
        &self,
        session: &GameSession,
        message: &str,
        options: &ChatTurnOptions,
    ) -> Result<TurnOutcome, ApiError> {
        let history = conversation_messages(session);
        let completion = self
            .call_provider(options, Some(&session.game_json), history, message)
            .await?;

        let game_json = match extract_game_json(&completion.content) {
            Some(document) => {
                let merged = if options.preserve_existing {
                    merge_preserving_existing(&session.game_json, document)
                } else {
                    document
                };
                validate_game_json(&merged).map_err(ApiError::Validation)?;
                Some(merged)
            }
            None => {
                debug!("Reply carried no document, conversation-only turn");
                None
            }
        };
        let game_changed = game_json.is_some();

        let updated = self.store.append_session_turn(
            &session.session_id,
            Some(session.version),
            SessionTurn {
                game_json,
                user_message: message.to_owned(),
                assistant_reply: completion.content.clone(),
                thinking_process: completion.thinking.clone(),
            },
        )?;

        Ok(TurnOutcome {
            session: updated,
            completion,
            game_changed,
        })
    }

    async fn call_provider(
        &self,
        options: &ChatTurnOptions,
        current_game: Option<&Value>,
        mut messages: Vec<ChatMessage>,
        message: &str,
    ) -> Result<ChatCompletion, ApiError> {
        let provider = self
            .providers
            .get(options.provider.as_deref())
            .ok_or_else(|| {
                ApiError::BadRequest(match &options.provider {
                    Some(name) => format!("provider not configured: {name}"),
                    None => "no AI provider configured".to_string(),
                })
            })?;

        let mut system = SYSTEM_PROMPT.to_string();
        if let Some(game) = current_game {
            system.push_str("\n\nCurrent project document:\n```json\n");
            system.push_str(&game.to_string());
            system.push_str("\n```");
        }

        messages.push(ChatMessage::user(message));
        let completion = provider
            .chat(ChatRequest {
                model: options.model.clone(),
                system: Some(system),
                messages,
                max_tokens: DEFAULT_MAX_TOKENS,
            })
            .await?;
        Ok(completion)
    }
}

/// Extract the last ```json fenced block from a reply, or parse the whole
/// reply when it is bare JSON. Only objects count as game documents.
#[must_use]
pub fn extract_game_json(reply: &str) -> Option<Value> {
    let mut last_block: Option<&str> = None;
    let mut rest = reply;
    while let Some(start) = rest.find("```json") {
        let after = &rest[start + "```json".len()..];
        if let Some(end) = after.find("```") {
            last_block = Some(&after[..end]);
            rest = &after[end + 3..];
        } else {
            break;
        }
    }

    let candidate = last_block.unwrap_or(reply).trim();
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

/// Minimal valid project document used when a creation reply has no JSON.
#[must_use]
pub fn starter_game(title: &str) -> Value {
    json!({
        "properties": {
            "name": title,
            "orientation": "landscape",
            "packageName": "com.surrealpilot.game",
        },
        "resources": { "resources": [] },
        "objects": [],
        "objectsGroups": [],
        "variables": [],
        "layouts": [
            {
                "name": "MainScene",
                "layers": [{ "name": "", "visibility": true }],
                "objects": [],
                "events": [],
            }
        ],
    })
}

fn title_from_document(game: &Value) -> Option<String> {
    game.pointer("/properties/name")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

/// First few words of the opening message, as a fallback title.
fn derive_title(message: &str) -> String {
    let words: Vec<&str> = message.split_whitespace().take(4).collect();
    if words.is_empty() {
        "New Game".to_string()
    } else {
        words.join(" ")
    }
}

fn conversation_messages(session: &GameSession) -> Vec<ChatMessage> {
    let history = &session.conversation_history;
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    history[start..]
        .iter()
        .map(|entry| match entry.role {
            ConversationRole::User => ChatMessage::user(entry.content.clone()),
            ConversationRole::Assistant => ChatMessage::assistant(entry.content.clone()),
        })
        .collect()
}
