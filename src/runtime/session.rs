//! Game session
//!
//! Owns one game's state, conversations and event channel. Every change goes
//! through [`transition`]; the session executes the resulting effects in
//! order.

use super::traits::{ChatClient, GameStore, StoreError};
use super::{SessionEvent, TurnOutcome};
use crate::conversation::{ConversationLog, LogError, Message, ToolCall, TranscriptEntry};
use crate::db::GameRecord;
use crate::game::{GameMode, Roster, Side, Winner};
use crate::llm::{LlmError, StreamEvent, ToolCallAccumulator};
use crate::state_machine::{
    transition, Effect, Event, GameContext, GamePhase, GameState, TransitionError,
};
use chrono::Utc;
use futures::StreamExt;
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;
const DEFAULT_MAX_CONTINUATIONS: u32 = 16;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Conversation log rejected message: {0}")]
    Log(#[from] LogError),
    #[error("No conversation for the {0:?} seat")]
    NoConversation(Side),
}

/// A live game bound to a store
pub struct GameSession<S: GameStore> {
    store: S,
    context: GameContext,
    state: GameState,
    record: GameRecord,
    events: broadcast::Sender<SessionEvent>,
    max_continuations: u32,
}

impl<S: GameStore> GameSession<S> {
    /// Start a session for a freshly built record and write it once.
    pub async fn create(store: S, record: GameRecord, roster: Roster) -> Result<Self, SessionError> {
        store.save_game(&record).await?;
        tracing::info!(game_id = %record.id, mode = record.mode.as_str(), "Game created");
        Ok(Self::from_record(store, record, roster))
    }

    /// Resume a stored game. Tool calls left unanswered by an interrupted
    /// turn receive an error result so the logs are valid again.
    pub async fn load(store: S, game_id: &str, roster: Roster) -> Result<Self, SessionError> {
        let mut record = store.load_game(game_id).await?;

        let mut repaired = record.conversation.repair_orphans("interrupted");
        if let Some(log) = record.player_conversation.as_mut() {
            repaired += log.repair_orphans("interrupted");
        }
        record.conversation.validate()?;
        if let Some(log) = &record.player_conversation {
            log.validate()?;
        }

        let mut session = Self::from_record(store, record, roster);
        if repaired > 0 {
            tracing::warn!(game_id, repaired, "Answered orphaned tool calls on resume");
            session.persist().await;
        }
        Ok(session)
    }

    fn from_record(store: S, record: GameRecord, roster: Roster) -> Self {
        let state = state_from_record(&record);
        let context = GameContext::new(record.id.clone(), record.mode, roster);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            context,
            state,
            record,
            events,
            max_continuations: DEFAULT_MAX_CONTINUATIONS,
        }
    }

    /// Cap on follow-up requests after the first one of a turn
    #[must_use]
    pub fn with_max_continuations(mut self, max_continuations: u32) -> Self {
        self.max_continuations = max_continuations;
        self
    }

    pub fn game_id(&self) -> &str {
        &self.context.game_id
    }

    pub fn mode(&self) -> GameMode {
        self.context.mode
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn record(&self) -> &GameRecord {
        &self.record
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Conversation of the model seated at `side`
    pub fn log(&self, side: Side) -> Result<&ConversationLog, SessionError> {
        match side {
            Side::Opponent => Ok(&self.record.conversation),
            Side::User => self
                .record
                .player_conversation
                .as_ref()
                .ok_or(SessionError::NoConversation(side)),
        }
    }

    fn log_mut(&mut self, side: Side) -> Result<&mut ConversationLog, SessionError> {
        match side {
            Side::Opponent => Ok(&mut self.record.conversation),
            Side::User => self
                .record
                .player_conversation
                .as_mut()
                .ok_or(SessionError::NoConversation(side)),
        }
    }

    pub fn transcript(&self, side: Side) -> Result<Vec<TranscriptEntry>, SessionError> {
        Ok(self.log(side)?.transcript())
    }

    /// The model opponent has not answered its opening message yet.
    pub fn needs_opening_turn(&self) -> bool {
        self.context.mode == GameMode::HumanVsAi
            && !self.state.is_completed()
            && self.record.conversation.awaiting_reply()
    }

    // ========================================================================
    // Player actions
    // ========================================================================

    /// Send the human's text to the model opponent and run its turn.
    pub async fn send_player_message(
        &mut self,
        text: &str,
        client: &dyn ChatClient,
    ) -> Result<TurnOutcome, SessionError> {
        if self.context.mode != GameMode::HumanVsAi {
            return Err(TransitionError::InvalidTransition(
                "player messages require a human player".to_string(),
            )
            .into());
        }
        self.apply(Event::PlayerMessage {
            to: Side::Opponent,
            text: text.to_string(),
        })
        .await?;
        self.run_turn(Side::Opponent, client).await
    }

    /// Append `text` as a user message to the conversation seated at `to`.
    pub async fn relay_message(&mut self, to: Side, text: &str) -> Result<(), SessionError> {
        self.log(to)?;
        self.apply(Event::PlayerMessage {
            to,
            text: text.to_string(),
        })
        .await
    }

    /// Flip a character on the human's board.
    pub async fn toggle_elimination(&mut self, character: &str) -> Result<(), SessionError> {
        self.apply(Event::ToggleElimination {
            character: character.to_string(),
        })
        .await
    }

    /// End an unfinished game as a tie. No-op once completed.
    pub async fn abandon(&mut self) -> Result<(), SessionError> {
        self.apply(Event::ForceTie { now: Utc::now() }).await
    }

    // ========================================================================
    // Model turns
    // ========================================================================

    /// Run one model turn for the seat at `side`, continuing after tool
    /// calls until the model answers without tools, the game ends, the
    /// transport fails, or the continuation cap is hit.
    pub async fn run_turn(
        &mut self,
        side: Side,
        client: &dyn ChatClient,
    ) -> Result<TurnOutcome, SessionError> {
        if self.state.is_completed() {
            return Err(TransitionError::GameCompleted.into());
        }
        self.log(side)?;
        self.apply(Event::ConversationStarted).await?;
        self.notify(SessionEvent::TurnStarted { side });

        let mut produced: Vec<String> = Vec::new();

        for request in 0..=self.max_continuations {
            let streamed = {
                let messages = self.log(side)?.messages();
                self.stream_response(side, client, messages).await
            };

            let (text, mut tool_calls) = match streamed {
                Ok(response) => response,
                Err(error) => {
                    tracing::error!(
                        game_id = %self.context.game_id,
                        ?side,
                        model = client.model_id(),
                        error = %error,
                        "Model request failed"
                    );
                    self.notify(SessionEvent::Error {
                        side,
                        message: format!("Communication with the model failed: {}", error.message),
                    });
                    return Ok(TurnOutcome::TransportFailed {
                        error,
                        text: produced.join("\n\n"),
                    });
                }
            };

            rename_reused_ids(self.log(side)?, &mut tool_calls);
            if !text.is_empty() {
                produced.push(text.clone());
            }
            let call_count = tool_calls.len();
            self.log_mut(side)?
                .push(Message::assistant(text, tool_calls.clone()))?;
            self.persist().await;
            tracing::info!(
                game_id = %self.context.game_id,
                ?side,
                request,
                tool_calls = call_count,
                "Model response recorded"
            );

            if tool_calls.is_empty() {
                return Ok(TurnOutcome::Finished {
                    text: produced.join("\n\n"),
                });
            }

            self.dispatch_batch(side, tool_calls).await?;

            if let Some(winner) = self.state.winner() {
                return Ok(TurnOutcome::GameOver {
                    winner,
                    text: produced.join("\n\n"),
                });
            }
        }

        tracing::warn!(
            game_id = %self.context.game_id,
            ?side,
            max_continuations = self.max_continuations,
            "Continuation limit reached"
        );
        Ok(TurnOutcome::ContinuationLimit {
            text: produced.join("\n\n"),
        })
    }

    /// Stream one response, relaying text deltas and sealing tool calls.
    /// Nothing is returned for a response that failed part way.
    async fn stream_response(
        &self,
        side: Side,
        client: &dyn ChatClient,
        messages: &[Message],
    ) -> Result<(String, Vec<ToolCall>), LlmError> {
        let mut stream = client.open_turn(messages).await?;
        let mut text = String::new();
        let mut calls = ToolCallAccumulator::new();

        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::ContentDelta(delta) => {
                    text.push_str(&delta);
                    self.notify(SessionEvent::ContentDelta { side, text: delta });
                }
                StreamEvent::ToolCallDelta(delta) => calls.apply(&delta),
                StreamEvent::Done(_) => return Ok((text, calls.seal())),
                StreamEvent::StreamError(error) => return Err(error),
            }
        }
        Err(LlmError::network("stream closed before completion"))
    }

    /// Dispatch one response's tool calls and write the record once at the
    /// end, after every call has its tool result.
    async fn dispatch_batch(&mut self, side: Side, calls: Vec<ToolCall>) -> Result<(), SessionError> {
        let mut dirty = false;
        let mut completion = None;

        for call in calls {
            let result = transition(
                &self.state,
                &self.context,
                Event::ToolCallCompleted {
                    side,
                    call,
                    now: Utc::now(),
                },
            )?;
            self.state = result.new_state;
            for effect in result.effects {
                match effect {
                    Effect::PersistGame => dirty = true,
                    Effect::PersistCompletion { completed_at } => completion = Some(completed_at),
                    other => self.execute_effect(other).await?,
                }
            }
        }

        // Calls after an endGame in the same response are never dispatched
        if self.log_mut(side)?.repair_orphans("game already ended") > 0 {
            dirty = true;
        }

        if let Some(completed_at) = completion {
            self.execute_effect(Effect::PersistCompletion { completed_at })
                .await?;
        } else if dirty {
            self.persist().await;
        }
        Ok(())
    }

    // ========================================================================
    // Effect execution
    // ========================================================================

    async fn apply(&mut self, event: Event) -> Result<(), SessionError> {
        let result = transition(&self.state, &self.context, event)?;
        self.state = result.new_state;
        for effect in result.effects {
            self.execute_effect(effect).await?;
        }
        Ok(())
    }

    async fn execute_effect(&mut self, effect: Effect) -> Result<(), SessionError> {
        match effect {
            Effect::AppendMessage { side, message } => {
                self.log_mut(side)?.push(message)?;
            }
            Effect::PersistGame => self.persist().await,
            Effect::PersistCompletion { completed_at } => {
                tracing::info!(
                    game_id = %self.context.game_id,
                    winner = ?self.state.winner(),
                    %completed_at,
                    "Game completed"
                );
                self.persist().await;
            }
            Effect::Notify(event) => self.notify(event),
        }
        Ok(())
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Copy state into the record and write it. Failures are logged only.
    async fn persist(&mut self) {
        self.record.user_eliminated = self.state.user_eliminated.clone();
        self.record.llm_eliminated = self.state.opponent_eliminated.clone();
        self.record.winner = self.state.winner();
        self.record.completed_at = self.state.completed_at();
        self.record.updated_at = Utc::now();

        if let Err(e) = self.store.save_game(&self.record).await {
            tracing::warn!(game_id = %self.context.game_id, error = %e, "Failed to persist game");
        }
    }
}

/// Synthetic `call_{index}` ids repeat across responses when a provider
/// omits ids, and some providers repeat an id within one response. Suffix
/// any id already seen in the log or earlier in the batch.
fn rename_reused_ids(log: &ConversationLog, calls: &mut [ToolCall]) {
    let mut seen: HashSet<String> = log
        .messages()
        .iter()
        .flat_map(|m| m.tool_calls.iter())
        .map(|c| c.id.clone())
        .collect();
    let mut suffix = log.len();
    for call in calls.iter_mut() {
        if seen.contains(&call.id) {
            let base = std::mem::take(&mut call.id);
            call.id = loop {
                let candidate = format!("{base}_{suffix}");
                suffix += 1;
                if !seen.contains(&candidate) {
                    break candidate;
                }
            };
        }
        seen.insert(call.id.clone());
    }
}

fn state_from_record(record: &GameRecord) -> GameState {
    let mut state = GameState::new(&record.user_character, &record.llm_character);
    state.user_eliminated = record.user_eliminated.clone();
    state.opponent_eliminated = record.llm_eliminated.clone();
    state.phase = match (record.winner, record.completed_at) {
        (Some(winner), completed_at) => GamePhase::Completed {
            winner,
            completed_at: completed_at.unwrap_or(record.updated_at),
        },
        (None, Some(completed_at)) => GamePhase::Completed {
            winner: Winner::Tie,
            completed_at,
        },
        (None, None) if record.conversation.is_empty() => GamePhase::NotStarted,
        (None, None) => GamePhase::InProgress,
    };
    state
}
