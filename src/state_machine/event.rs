//! Events that can occur in a game

use crate::conversation::ToolCall;
use crate::game::Side;
use chrono::{DateTime, Utc};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// The opening conversation is in place and play begins
    ConversationStarted,

    /// A user-role message for the model seated at `to`: the human's text,
    /// or the other agent's relayed turn
    PlayerMessage { to: Side, text: String },

    /// A sealed tool call issued by the model seated at `side`
    ToolCallCompleted {
        side: Side,
        call: ToolCall,
        now: DateTime<Utc>,
    },

    /// Manual add/remove on the human's board
    ToggleElimination { character: String },

    /// New game requested while this one is unfinished
    ForceTie { now: DateTime<Utc> },
}
