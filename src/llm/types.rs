//! Request types and the fixed game tool schema

use crate::conversation::Message;
use serde::Serialize;
use serde_json::json;

/// Streaming chat-completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// Function tool offered to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

pub const ELIMINATE_CHARACTER: &str = "eliminateCharacter";
pub const END_GAME: &str = "endGame";

/// The two tools every player model gets
pub fn game_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: ELIMINATE_CHARACTER.to_string(),
            description: "Eliminate a character from your board when you learn they cannot be the user's character".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "characterName": {
                        "type": "string",
                        "description": "The name of the character to eliminate"
                    }
                },
                "required": ["characterName"]
            }),
        },
        ToolDefinition {
            name: END_GAME.to_string(),
            description: "When you or the user guesses correctly, the game should end.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "winner": {
                        "type": "string",
                        "enum": ["user", "llm"],
                        "description": "Who won the game"
                    }
                },
                "required": ["winner"]
            }),
        },
    ]
}
