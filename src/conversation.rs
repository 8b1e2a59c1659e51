//! Conversation log
//!
//! Messages are stored in the chat-completions wire shape so the same
//! value is sent to the provider, persisted, and reloaded without a
//! translation layer in between.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

// ============================================================================
// Message Types
// ============================================================================

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message body: plain text or a multi-part payload (opening turn only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of a multi-part user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Inline PNG as a `data:` URL
    pub fn png_base64(data: &str) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:image/png;base64,{data}"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Only function tools exist on the wire today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallKind {
    #[default]
    Function,
}

/// Function name plus raw JSON arguments, exactly as the model produced them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A tool invocation recorded on an assistant message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ToolCallKind,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ToolCallKind::Function,
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn arguments(&self) -> &str {
        &self.function.arguments
    }
}

/// One entry in the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Function name of the call a tool message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn plain(role: Role, content: Option<MessageContent>) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(Role::System, Some(MessageContent::Text(text.into())))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(Role::User, Some(MessageContent::Text(text.into())))
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self::plain(Role::User, Some(MessageContent::Parts(parts)))
    }

    /// Assistant turn. Content is `null` when the turn only carried tool
    /// calls and produced no text.
    pub fn assistant(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let text = text.into();
        let content = if text.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(MessageContent::Text(text))
        };
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        function_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(MessageContent::Text(text.into())),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            name: Some(function_name.into()),
        }
    }

    /// Plain text content, if this message has any
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(MessageContent::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.content, Some(MessageContent::Parts(_)))
    }
}

// ============================================================================
// Conversation Log
// ============================================================================

/// Linkage violations between tool results and assistant tool calls
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("Tool message is missing its tool_call_id")]
    MissingToolCallId,
    #[error("Tool result references unknown tool call: {0}")]
    UnknownToolCall(String),
    #[error("Tool call already has a result: {0}")]
    DuplicateToolResult(String),
    #[error("Tool call id used twice: {0}")]
    DuplicateToolCallId(String),
}

/// Ordered record of every message exchanged with one model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a log with a system prompt and a multi-part opening message
    pub fn start(system_prompt: &str, opening: Vec<ContentPart>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user_parts(opening)],
        }
    }

    /// Build a log from stored messages, checking tool-call linkage
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, LogError> {
        let log = Self { messages };
        log.validate()?;
        Ok(log)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append a message. Tool messages must answer an earlier, still
    /// unanswered assistant tool call.
    pub fn push(&mut self, message: Message) -> Result<(), LogError> {
        let mut linkage = Linkage::scan(&self.messages)?;
        linkage.admit(&message)?;
        self.messages.push(message);
        Ok(())
    }

    /// Check the tool-call linkage invariant over the whole log
    pub fn validate(&self) -> Result<(), LogError> {
        Linkage::scan(&self.messages).map(|_| ())
    }

    /// Assistant tool calls that never received a tool result, in log order
    pub fn orphaned_tool_calls(&self) -> Vec<ToolCall> {
        let answered: HashSet<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();

        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| m.tool_calls.iter())
            .filter(|tc| !answered.contains(tc.id.as_str()))
            .cloned()
            .collect()
    }

    /// Inject an error tool result for every orphaned tool call. Returns
    /// how many were injected.
    pub fn repair_orphans(&mut self, note: &str) -> usize {
        let orphans = self.orphaned_tool_calls();
        for call in &orphans {
            self.messages
                .push(Message::tool_result(&call.id, call.name(), format!("Error: {note}")));
        }
        orphans.len()
    }

    /// The opening user message is the last entry: the model has not
    /// answered yet.
    pub fn awaiting_reply(&self) -> bool {
        self.messages.last().is_some_and(|m| m.role == Role::User)
    }

    /// Display-oriented projection of the log
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        let mut entries = Vec::new();
        for msg in &self.messages {
            match msg.role {
                Role::System | Role::Tool => {}
                _ if msg.is_multipart() => {}
                Role::User => entries.push(TranscriptEntry::User(
                    msg.text().unwrap_or_default().to_string(),
                )),
                Role::Assistant => {
                    if let Some(text) = msg.text().filter(|t| !t.is_empty()) {
                        entries.push(TranscriptEntry::Assistant(text.to_string()));
                    }
                    for call in &msg.tool_calls {
                        if let Some(summary) = summarize_tool_call(call) {
                            entries.push(TranscriptEntry::ToolCall {
                                tool_name: call.name().to_string(),
                                summary,
                            });
                        }
                    }
                }
            }
        }
        entries
    }
}

/// Entry of the display transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum TranscriptEntry {
    User(String),
    Assistant(String),
    ToolCall { tool_name: String, summary: String },
}

fn summarize_tool_call(call: &ToolCall) -> Option<String> {
    let args: serde_json::Value = serde_json::from_str(call.arguments()).ok()?;
    let field = |key: &str| args.get(key).and_then(|v| v.as_str()).map(str::to_string);
    match call.name() {
        "eliminateCharacter" => field("characterName").map(|c| format!("character={c}")),
        "endGame" => field("winner").map(|w| format!("winner={w}")),
        _ => Some(String::new()),
    }
}

/// Running view of issued and answered tool call ids
struct Linkage<'a> {
    issued: HashSet<&'a str>,
    answered: HashSet<&'a str>,
}

impl<'a> Linkage<'a> {
    fn scan(messages: &'a [Message]) -> Result<Self, LogError> {
        let mut linkage = Self {
            issued: HashSet::new(),
            answered: HashSet::new(),
        };
        for msg in messages {
            linkage.admit(msg)?;
            linkage.record(msg);
        }
        Ok(linkage)
    }

    fn admit(&self, msg: &Message) -> Result<(), LogError> {
        match msg.role {
            Role::Assistant => {
                let mut seen = HashSet::new();
                for call in &msg.tool_calls {
                    if self.issued.contains(call.id.as_str()) || !seen.insert(call.id.as_str()) {
                        return Err(LogError::DuplicateToolCallId(call.id.clone()));
                    }
                }
                Ok(())
            }
            Role::Tool => {
                let id = msg.tool_call_id.as_deref().ok_or(LogError::MissingToolCallId)?;
                if !self.issued.contains(id) {
                    return Err(LogError::UnknownToolCall(id.to_string()));
                }
                if self.answered.contains(id) {
                    return Err(LogError::DuplicateToolResult(id.to_string()));
                }
                Ok(())
            }
            Role::System | Role::User => Ok(()),
        }
    }

    fn record(&mut self, msg: &'a Message) {
        match msg.role {
            Role::Assistant => self.issued.extend(msg.tool_calls.iter().map(|c| c.id.as_str())),
            Role::Tool => self.answered.extend(msg.tool_call_id.as_deref()),
            Role::System | Role::User => {}
        }
    }
}
