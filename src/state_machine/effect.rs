//! Effects produced by state transitions

use crate::conversation::Message;
use crate::game::Side;
use crate::runtime::SessionEvent;
use chrono::{DateTime, Utc};

/// Effects to be executed after a state transition, in order
#[derive(Debug, Clone)]
pub enum Effect {
    /// Append to the conversation of the model seated at `side`
    AppendMessage { side: Side, message: Message },

    /// Write the whole record
    PersistGame,

    /// Write the final record; emitted once per game
    PersistCompletion { completed_at: DateTime<Utc> },

    /// Broadcast to subscribers
    Notify(SessionEvent),
}

impl Effect {
    pub fn tool_result(side: Side, call_id: &str, tool: &str, text: impl Into<String>) -> Self {
        Effect::AppendMessage {
            side,
            message: Message::tool_result(call_id, tool, text),
        }
    }
}
