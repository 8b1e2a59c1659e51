//! Game vocabulary: sides, winners, the roster, and the tool calls a model
//! can make against the board.

mod roster;
pub mod setup;
mod tools;

pub use roster::Roster;
pub use setup::{opening_conversation, GameSetup, ImageAssets, SetupError};
pub use tools::{ClaimedWinner, GameTool, ToolCallError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A seat at the table. The opponent seat is always a model; the user seat
/// is the human, or agent 1 in agent-vs-agent play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    User,
    Opponent,
}

impl Side {
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Side::User => Side::Opponent,
            Side::Opponent => Side::User,
        }
    }
}

/// Final outcome. Serialized with the stored names (`user`, `llm`, `tie`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "llm")]
    Opponent,
    #[serde(rename = "tie")]
    Tie,
}

impl From<Side> for Winner {
    fn from(side: Side) -> Self {
        match side {
            Side::User => Winner::User,
            Side::Opponent => Winner::Opponent,
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::User => write!(f, "user"),
            Winner::Opponent => write!(f, "llm"),
            Winner::Tie => write!(f, "tie"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    HumanVsAi,
    AiVsAi,
}

impl GameMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::HumanVsAi => "human_vs_ai",
            GameMode::AiVsAi => "ai_vs_ai",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "human_vs_ai" => Some(GameMode::HumanVsAi),
            "ai_vs_ai" => Some(GameMode::AiVsAi),
            _ => None,
        }
    }
}
