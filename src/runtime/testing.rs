//! Mock implementations for testing
//!
//! These mocks enable session and orchestrator tests without real I/O.

use super::traits::*;
use crate::conversation::Message;
use crate::db::GameRecord;
use crate::game::{opening_conversation, GameMode};
use crate::llm::{EventStream, FinishReason, LlmError, StreamEvent, ToolCallDelta};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// In-memory Game Store
// ============================================================================

/// Game store that keeps records in memory and remembers every write
#[derive(Clone, Default)]
pub struct InMemoryGameStore {
    games: Arc<Mutex<HashMap<String, GameRecord>>>,
    saves: Arc<Mutex<Vec<GameRecord>>>,
    fail_saves: Arc<AtomicBool>,
}

impl InMemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_game(self, record: GameRecord) -> Self {
        self.games.lock().unwrap().insert(record.id.clone(), record);
        self
    }

    /// Make every subsequent save fail
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Every successfully written record, in write order
    pub fn saved_records(&self) -> Vec<GameRecord> {
        self.saves.lock().unwrap().clone()
    }

    pub fn get(&self, id: &str) -> Option<GameRecord> {
        self.games.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl GameStore for InMemoryGameStore {
    async fn load_game(&self, id: &str) -> Result<GameRecord, StoreError> {
        self.get(id).ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn save_game(&self, record: &GameRecord) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        self.games
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        self.saves.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ============================================================================
// Mock Chat Client
// ============================================================================

enum MockTurn {
    Events(Vec<StreamEvent>),
    OpenError(LlmError),
}

/// Chat client that replays queued event scripts, one per request
pub struct MockChatClient {
    turns: Mutex<VecDeque<MockTurn>>,
    model_id: String,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockChatClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            turns: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a raw event script
    pub fn queue_events(&self, events: Vec<StreamEvent>) {
        self.turns.lock().unwrap().push_back(MockTurn::Events(events));
    }

    /// Queue a plain text answer
    pub fn queue_text(&self, text: &str) {
        self.queue_events(vec![
            StreamEvent::ContentDelta(text.to_string()),
            StreamEvent::Done(Some(FinishReason::Stop)),
        ]);
    }

    /// Queue a turn consisting of complete tool calls `(id, name, arguments)`
    pub fn queue_tool_calls(&self, calls: &[(&str, &str, &str)]) {
        let mut events: Vec<StreamEvent> = calls
            .iter()
            .enumerate()
            .map(|(index, (id, name, args))| {
                StreamEvent::ToolCallDelta(
                    ToolCallDelta::new(u32::try_from(index).unwrap())
                        .id(*id)
                        .name(*name)
                        .arguments(*args),
                )
            })
            .collect();
        events.push(StreamEvent::Done(Some(FinishReason::ToolCalls)));
        self.queue_events(events);
    }

    /// Queue a request that fails before streaming starts
    pub fn queue_open_error(&self, error: LlmError) {
        self.turns.lock().unwrap().push_back(MockTurn::OpenError(error));
    }

    /// Conversations sent with each request, in order
    pub fn recorded_requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn open_turn(&self, messages: &[Message]) -> Result<EventStream, LlmError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        match self.turns.lock().unwrap().pop_front() {
            Some(MockTurn::Events(events)) => Ok(futures::stream::iter(events).boxed()),
            Some(MockTurn::OpenError(error)) => Err(error),
            None => Err(LlmError::network("No mock response queued")),
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Fresh human-vs-model game: user has Alex, the model has Amy
pub fn human_game(id: &str) -> GameRecord {
    GameRecord::new(
        id,
        GameMode::HumanVsAi,
        "gpt-5-mini",
        "Alex",
        "Amy",
        opening_conversation("You are playing Guess Who.", "Qk9BUkQ=", "QU1Z"),
        None,
    )
}

/// Fresh agent-vs-agent game: agent 1 has Alex, agent 2 has Amy
pub fn agent_game(id: &str) -> GameRecord {
    GameRecord::new(
        id,
        GameMode::AiVsAi,
        "gpt-5-mini",
        "Alex",
        "Amy",
        opening_conversation("You are agent 2.", "Qk9BUkQ=", "QU1Z"),
        Some(opening_conversation("You are agent 1.", "Qk9BUkQ=", "QUxFWA==")),
    )
}
