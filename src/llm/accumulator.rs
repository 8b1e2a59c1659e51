//! Tool-call accumulator
//!
//! Providers stream each tool call as index-addressed fragments: the id and
//! function name usually arrive once, the JSON arguments arrive in pieces.
//! The accumulator merges them into complete [`ToolCall`]s.

use super::streaming::ToolCallDelta;
use crate::conversation::ToolCall;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Keyed buffer of partial tool calls for one assistant turn
#[derive(Debug, Clone, Default)]
pub struct ToolCallAccumulator {
    slots: BTreeMap<u32, PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment into its slot. The first non-empty id and name win;
    /// argument fragments are appended in arrival order.
    pub fn apply(&mut self, delta: &ToolCallDelta) {
        let slot = self.slots.entry(delta.index).or_default();
        if slot.id.is_none() {
            slot.id = delta.id.clone().filter(|id| !id.is_empty());
        }
        if slot.name.is_none() {
            slot.name = delta.name.clone().filter(|name| !name.is_empty());
        }
        slot.arguments.push_str(&delta.arguments);
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Complete tool calls in ascending index order. A slot that never got an
    /// id is assigned `call_{index}`.
    pub fn seal(self) -> Vec<ToolCall> {
        self.slots
            .into_iter()
            .map(|(index, slot)| {
                let id = slot.id.unwrap_or_else(|| format!("call_{index}"));
                ToolCall::new(id, slot.name.unwrap_or_default(), slot.arguments)
            })
            .collect()
    }
}
