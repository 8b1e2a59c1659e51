//! Game state types

use crate::game::{GameMode, Roster, Side, Winner};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lifecycle of a game. Nothing leaves `Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum GamePhase {
    NotStarted,
    InProgress,
    Completed {
        winner: Winner,
        completed_at: DateTime<Utc>,
    },
}

/// Board state for both sides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub user_character: String,
    pub opponent_character: String,
    pub user_eliminated: BTreeSet<String>,
    pub opponent_eliminated: BTreeSet<String>,
    pub phase: GamePhase,
}

impl GameState {
    pub fn new(user_character: impl Into<String>, opponent_character: impl Into<String>) -> Self {
        Self {
            user_character: user_character.into(),
            opponent_character: opponent_character.into(),
            user_eliminated: BTreeSet::new(),
            opponent_eliminated: BTreeSet::new(),
            phase: GamePhase::NotStarted,
        }
    }

    pub fn eliminated(&self, side: Side) -> &BTreeSet<String> {
        match side {
            Side::User => &self.user_eliminated,
            Side::Opponent => &self.opponent_eliminated,
        }
    }

    pub(crate) fn eliminated_mut(&mut self, side: Side) -> &mut BTreeSet<String> {
        match side {
            Side::User => &mut self.user_eliminated,
            Side::Opponent => &mut self.opponent_eliminated,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.phase, GamePhase::Completed { .. })
    }

    pub fn winner(&self) -> Option<Winner> {
        match self.phase {
            GamePhase::Completed { winner, .. } => Some(winner),
            _ => None,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self.phase {
            GamePhase::Completed { completed_at, .. } => Some(completed_at),
            _ => None,
        }
    }
}

/// Static facts a transition may consult
#[derive(Debug, Clone)]
pub struct GameContext {
    pub game_id: String,
    pub mode: GameMode,
    pub roster: Roster,
}

impl GameContext {
    pub fn new(game_id: impl Into<String>, mode: GameMode, roster: Roster) -> Self {
        Self {
            game_id: game_id.into(),
            mode,
            roster,
        }
    }
}
