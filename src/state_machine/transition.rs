//! Pure state transition function

use super::{Effect, Event, GameContext, GamePhase, GameState};
use crate::conversation::{Message, ToolCall};
use crate::game::{GameMode, GameTool, Side, ToolCallError, Winner};
use crate::runtime::SessionEvent;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: GameState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: GameState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Events a game in its current state refuses
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Game is already over")]
    GameCompleted,
    #[error("Unknown character: {0}")]
    UnknownCharacter(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function: same inputs, same outputs, no I/O.
pub fn transition(
    state: &GameState,
    context: &GameContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (&state.phase, event) {
        // ============================================================
        // Completed is terminal
        // ============================================================
        (
            GamePhase::Completed { .. },
            Event::ToolCallCompleted { .. } | Event::ForceTie { .. } | Event::ConversationStarted,
        )
        | (GamePhase::InProgress, Event::ConversationStarted) => {
            Ok(TransitionResult::new(state.clone()))
        }
        (GamePhase::Completed { .. }, Event::PlayerMessage { .. } | Event::ToggleElimination { .. }) => {
            Err(TransitionError::GameCompleted)
        }

        // ============================================================
        // Start of play
        // ============================================================
        (GamePhase::NotStarted, Event::ConversationStarted) => {
            Ok(TransitionResult::new(started(state)).with_effect(Effect::PersistGame))
        }

        (_, Event::PlayerMessage { to, text }) => Ok(TransitionResult::new(started(state))
            .with_effect(Effect::AppendMessage {
                side: to,
                message: Message::user(text),
            })
            .with_effect(Effect::PersistGame)),

        // ============================================================
        // Tool dispatch
        // ============================================================
        (_, Event::ToolCallCompleted { side, call, now }) => {
            Ok(dispatch_tool_call(state, context, side, &call, now))
        }

        // ============================================================
        // Player actions
        // ============================================================
        (_, Event::ToggleElimination { character }) => {
            if context.mode != GameMode::HumanVsAi {
                return Err(TransitionError::InvalidTransition(
                    "manual elimination is only available to a human player".to_string(),
                ));
            }
            if !context.roster.contains(&character) {
                return Err(TransitionError::UnknownCharacter(character));
            }

            let mut next = started(state);
            let notification = if next.user_eliminated.remove(&character) {
                SessionEvent::CharacterRestored {
                    side: Side::User,
                    character,
                }
            } else {
                next.user_eliminated.insert(character.clone());
                SessionEvent::CharacterEliminated {
                    side: Side::User,
                    character,
                }
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistGame)
                .with_effect(Effect::Notify(notification)))
        }

        (_, Event::ForceTie { now }) => Ok(with_completion(
            TransitionResult::new(completed(state, Winner::Tie, now)),
            Winner::Tie,
            now,
        )),
    }
}

fn started(state: &GameState) -> GameState {
    let mut next = state.clone();
    if next.phase == GamePhase::NotStarted {
        next.phase = GamePhase::InProgress;
    }
    next
}

fn completed(state: &GameState, winner: Winner, now: DateTime<Utc>) -> GameState {
    let mut next = state.clone();
    next.phase = GamePhase::Completed {
        winner,
        completed_at: now,
    };
    next
}

fn with_completion(result: TransitionResult, winner: Winner, now: DateTime<Utc>) -> TransitionResult {
    result
        .with_effect(Effect::PersistCompletion { completed_at: now })
        .with_effect(Effect::Notify(SessionEvent::GameOver { winner }))
}

/// Apply one sealed tool call from the model at `side`. Invalid calls become
/// error tool results and leave the board untouched.
fn dispatch_tool_call(
    state: &GameState,
    context: &GameContext,
    side: Side,
    call: &ToolCall,
    now: DateTime<Utc>,
) -> TransitionResult {
    let announce = Effect::Notify(SessionEvent::ToolCall {
        side,
        name: call.name().to_string(),
        arguments: call.arguments().to_string(),
    });

    let rejected = |err: ToolCallError| {
        TransitionResult::new(started(state))
            .with_effect(announce.clone())
            .with_effect(Effect::tool_result(side, &call.id, call.name(), err.to_string()))
            .with_effect(Effect::PersistGame)
    };

    match GameTool::parse(call) {
        Err(err) => rejected(err),

        Ok(GameTool::Eliminate { character_name }) => {
            if !context.roster.contains(&character_name) {
                return rejected(ToolCallError::InvalidEliminationTarget(character_name));
            }
            let mut next = started(state);
            next.eliminated_mut(side).insert(character_name.clone());
            TransitionResult::new(next)
                .with_effect(announce)
                .with_effect(Effect::tool_result(
                    side,
                    &call.id,
                    call.name(),
                    format!("Successfully eliminated {character_name} from your board."),
                ))
                .with_effect(Effect::PersistGame)
                .with_effect(Effect::Notify(SessionEvent::CharacterEliminated {
                    side,
                    character: character_name,
                }))
        }

        Ok(GameTool::EndGame { winner }) => {
            let resolved = winner.resolve(side);
            let result = TransitionResult::new(completed(state, resolved, now))
                .with_effect(announce)
                .with_effect(Effect::tool_result(
                    side,
                    &call.id,
                    call.name(),
                    format!("Game ended. Winner: {}", winner.as_str()),
                ));
            with_completion(result, resolved, now)
        }
    }
}
