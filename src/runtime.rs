//! Runtime for driving games against model endpoints
//!
//! A [`GameSession`] owns one game's state and conversations and runs model
//! turns; a [`TurnOrchestrator`] alternates two sessions' seats in
//! agent-vs-agent play.

mod orchestrator;
mod session;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use orchestrator::{
    AgentTurnContext, NextStep, OrchestratorError, OrchestratorHandle, StopReason,
    TurnOrchestrator,
};
pub use session::{GameSession, SessionError};
pub use traits::*;

use crate::game::{Side, Winner};
use crate::llm::LlmError;
use serde::Serialize;

/// Events broadcast to subscribers of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    TurnStarted { side: Side },
    ContentDelta { side: Side, text: String },
    ToolCall {
        side: Side,
        name: String,
        arguments: String,
    },
    CharacterEliminated { side: Side, character: String },
    CharacterRestored { side: Side, character: String },
    GameOver { winner: Winner },
    Error { side: Side, message: String },
}

/// How a model turn ended
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The model answered without calling tools
    Finished { text: String },
    /// A tool call ended the game
    GameOver { winner: Winner, text: String },
    /// The stream could not be opened or broke; nothing was appended for
    /// the failed request
    TransportFailed { error: LlmError, text: String },
    /// The model kept calling tools past the continuation cap
    ContinuationLimit { text: String },
}

impl TurnOutcome {
    /// Assistant text produced over the whole turn
    pub fn text(&self) -> &str {
        match self {
            TurnOutcome::Finished { text }
            | TurnOutcome::GameOver { text, .. }
            | TurnOutcome::TransportFailed { text, .. }
            | TurnOutcome::ContinuationLimit { text } => text,
        }
    }
}
