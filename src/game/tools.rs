//! Tool-call validation at the dispatcher boundary

use super::{Side, Winner};
use crate::conversation::ToolCall;
use crate::llm::{ELIMINATE_CHARACTER, END_GAME};
use serde::Deserialize;
use thiserror::Error;

/// Winner as the model names it: `llm` is whoever made the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimedWinner {
    User,
    Llm,
}

impl ClaimedWinner {
    /// Absolute winner given the side that issued the call
    pub fn resolve(self, acting: Side) -> Winner {
        match self {
            ClaimedWinner::Llm => Winner::from(acting),
            ClaimedWinner::User => Winner::from(acting.other()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClaimedWinner::User => "user",
            ClaimedWinner::Llm => "llm",
        }
    }
}

/// A validated game tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameTool {
    Eliminate { character_name: String },
    EndGame { winner: ClaimedWinner },
}

/// Why a tool call could not be applied. The display text is what the model
/// sees as the tool result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("Error: Unknown tool {0}")]
    UnknownTool(String),
    #[error("Error: Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("Error: {0} is not a valid character name.")]
    InvalidEliminationTarget(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EliminateArgs {
    character_name: String,
}

#[derive(Deserialize)]
struct EndGameArgs {
    winner: ClaimedWinner,
}

impl GameTool {
    /// Parse a completed tool call into a game tool
    pub fn parse(call: &ToolCall) -> Result<Self, ToolCallError> {
        let invalid = |e: serde_json::Error| ToolCallError::InvalidArguments {
            tool: call.name().to_string(),
            reason: e.to_string(),
        };
        match call.name() {
            ELIMINATE_CHARACTER => {
                let args: EliminateArgs = serde_json::from_str(call.arguments()).map_err(invalid)?;
                Ok(GameTool::Eliminate {
                    character_name: args.character_name,
                })
            }
            END_GAME => {
                let args: EndGameArgs = serde_json::from_str(call.arguments()).map_err(invalid)?;
                Ok(GameTool::EndGame {
                    winner: args.winner,
                })
            }
            other => Err(ToolCallError::UnknownTool(other.to_string())),
        }
    }
}
