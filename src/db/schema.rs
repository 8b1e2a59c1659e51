//! Database schema and record types

use crate::conversation::ConversationLog;
use crate::game::{GameMode, Winner};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS games (
    id TEXT PRIMARY KEY,
    game_type TEXT NOT NULL,
    model_name TEXT NOT NULL,
    user_character TEXT NOT NULL,
    llm_character TEXT NOT NULL,
    conversation TEXT NOT NULL,
    player_conversation TEXT,
    user_eliminated TEXT NOT NULL DEFAULT '[]',
    llm_eliminated TEXT NOT NULL DEFAULT '[]',
    winner TEXT,
    completed_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_games_created ON games(created_at DESC);

CREATE TABLE IF NOT EXISTS ai_configurations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    model_name TEXT NOT NULL,
    provider TEXT NOT NULL DEFAULT 'openai',
    key_encrypted TEXT NOT NULL,
    base_url TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Durable copy of one game. Writes replace the whole row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameRecord {
    pub id: String,
    pub mode: GameMode,
    pub model_name: String,
    pub user_character: String,
    pub llm_character: String,
    /// Conversation of the model in the opponent seat
    pub conversation: ConversationLog,
    /// Conversation of agent 1 (agent-vs-agent only)
    pub player_conversation: Option<ConversationLog>,
    pub user_eliminated: BTreeSet<String>,
    pub llm_eliminated: BTreeSet<String>,
    pub winner: Option<Winner>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameRecord {
    pub fn new(
        id: &str,
        mode: GameMode,
        model_name: &str,
        user_character: &str,
        llm_character: &str,
        conversation: ConversationLog,
        player_conversation: Option<ConversationLog>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            mode,
            model_name: model_name.to_string(),
            user_character: user_character.to_string(),
            llm_character: llm_character.to_string(),
            conversation,
            player_conversation,
            user_eliminated: BTreeSet::new(),
            llm_eliminated: BTreeSet::new(),
            winner: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// AES-GCM ciphertext of an API key, stored as-is; decryption happens
/// outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub iv: String,
    pub content: String,
    pub tag: String,
}

/// A saved model endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AiConfiguration {
    pub id: String,
    pub name: String,
    pub model_name: String,
    pub provider: String,
    #[serde(skip_serializing)]
    pub key_encrypted: EncryptedSecret,
    pub base_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a saved configuration
#[derive(Debug, Clone)]
pub struct AiConfigurationInput {
    pub name: String,
    pub model_name: String,
    pub provider: String,
    pub key_encrypted: EncryptedSecret,
    pub base_url: Option<String>,
}
