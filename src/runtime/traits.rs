//! Trait abstractions for runtime I/O
//!
//! The session talks to storage and to models only through these traits, so
//! it can be driven by the mocks in `testing` as well as the real adapters.

use crate::config::PlayerSettings;
use crate::conversation::Message;
use crate::db::{Database, DbError, GameRecord};
use crate::llm::{
    game_tool_definitions, ChatProvider, ChatRequest, EventStream, LlmError, LoggingProvider,
    OpenAIProvider, ToolDefinition,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Game not found: {0}")]
    NotFound(String),
    #[error("Storage failure: {0}")]
    Backend(String),
}

/// Durable storage for game records
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Latest record for a game
    async fn load_game(&self, id: &str) -> Result<GameRecord, StoreError>;

    /// Replace the stored record (last write wins)
    async fn save_game(&self, record: &GameRecord) -> Result<(), StoreError>;
}

/// One model endpoint with its model id and tool schema bound
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Open a streamed turn over the given conversation
    async fn open_turn(&self, messages: &[Message]) -> Result<EventStream, LlmError>;

    fn model_id(&self) -> &str;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: GameStore + ?Sized> GameStore for Arc<T> {
    async fn load_game(&self, id: &str) -> Result<GameRecord, StoreError> {
        (**self).load_game(id).await
    }

    async fn save_game(&self, record: &GameRecord) -> Result<(), StoreError> {
        (**self).save_game(record).await
    }
}

#[async_trait]
impl<T: ChatClient + ?Sized> ChatClient for Arc<T> {
    async fn open_turn(&self, messages: &[Message]) -> Result<EventStream, LlmError> {
        (**self).open_turn(messages).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl GameStore for Database {
    async fn load_game(&self, id: &str) -> Result<GameRecord, StoreError> {
        self.get_game(id).map_err(|e| match e {
            DbError::GameNotFound(id) => StoreError::NotFound(id),
            other => StoreError::Backend(other.to_string()),
        })
    }

    async fn save_game(&self, record: &GameRecord) -> Result<(), StoreError> {
        Database::save_game(self, record).map_err(|e| StoreError::Backend(e.to_string()))
    }
}

/// Chat client for a configured provider endpoint, offering the game tools
pub struct EndpointChatClient {
    provider: Arc<dyn ChatProvider>,
    model: String,
    tools: Vec<ToolDefinition>,
}

impl EndpointChatClient {
    pub fn new(provider: Arc<dyn ChatProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            tools: game_tool_definitions(),
        }
    }

    /// `OpenAI`-compatible endpoint from resolved player settings, with
    /// request logging
    pub fn from_settings(settings: &PlayerSettings) -> Result<Self, LlmError> {
        let provider = OpenAIProvider::new(settings.api_key.clone(), settings.base_url.as_deref())?;
        let logged = LoggingProvider::new(Arc::new(provider));
        Ok(Self::new(Arc::new(logged), settings.model.clone()))
    }
}

#[async_trait]
impl ChatClient for EndpointChatClient {
    async fn open_turn(&self, messages: &[Message]) -> Result<EventStream, LlmError> {
        let request =
            ChatRequest::new(self.model.clone(), messages.to_vec()).with_tools(self.tools.clone());
        self.provider.stream_chat(&request).await
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
