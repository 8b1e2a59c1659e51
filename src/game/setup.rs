//! New-game setup: character draw and the opening conversation

use super::{GameMode, Roster};
use crate::conversation::{ContentPart, ConversationLog};
use crate::db::GameRecord;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::Rng;
use std::path::{Path, PathBuf};
use thiserror::Error;

const OPENING_TEXT: &str = "Here is the full board and your character. Let's start!";
const BOARD_IMAGE: &str = "full-board.png";

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Roster needs at least two characters")]
    RosterTooSmall,
    #[error("Unknown character: {0}")]
    UnknownCharacter(String),
    #[error("Both players cannot have the same character: {0}")]
    SameCharacter(String),
    #[error("Failed to read asset {path}: {source}")]
    Asset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Board and character images plus prompt files, laid out as
/// `full-board.png`, `characters/{Name}.png`, `prompts/{name}.txt`.
#[derive(Debug, Clone)]
pub struct ImageAssets {
    root: PathBuf,
}

impl ImageAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Base64 of the full board image
    pub async fn board_png(&self) -> Result<String, SetupError> {
        self.read_base64(Path::new(BOARD_IMAGE)).await
    }

    /// Base64 of one character card
    pub async fn character_png(&self, name: &str) -> Result<String, SetupError> {
        self.read_base64(&Path::new("characters").join(format!("{name}.png")))
            .await
    }

    /// A bundled system prompt, e.g. `simple`
    pub async fn prompt(&self, name: &str) -> Result<String, SetupError> {
        let path = self.root.join("prompts").join(format!("{name}.txt"));
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| SetupError::Asset { path, source })
    }

    async fn read_base64(&self, relative: &Path) -> Result<String, SetupError> {
        let path = self.root.join(relative);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| SetupError::Asset { path, source })?;
        Ok(STANDARD.encode(bytes))
    }
}

/// System prompt followed by the board and the model's own character card
pub fn opening_conversation(
    system_prompt: &str,
    board_png: &str,
    character_png: &str,
) -> ConversationLog {
    ConversationLog::start(
        system_prompt,
        vec![
            ContentPart::text(OPENING_TEXT),
            ContentPart::png_base64(board_png),
            ContentPart::png_base64(character_png),
        ],
    )
}

/// Character assignment for a new game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSetup {
    pub mode: GameMode,
    pub user_character: String,
    pub opponent_character: String,
}

impl GameSetup {
    pub fn random<R: Rng + ?Sized>(
        roster: &Roster,
        mode: GameMode,
        rng: &mut R,
    ) -> Result<Self, SetupError> {
        let (user_character, opponent_character) =
            roster.pick_pair(rng).ok_or(SetupError::RosterTooSmall)?;
        Ok(Self {
            mode,
            user_character,
            opponent_character,
        })
    }

    pub fn with_characters(
        roster: &Roster,
        mode: GameMode,
        user_character: &str,
        opponent_character: &str,
    ) -> Result<Self, SetupError> {
        for name in [user_character, opponent_character] {
            if !roster.contains(name) {
                return Err(SetupError::UnknownCharacter(name.to_string()));
            }
        }
        if user_character == opponent_character {
            return Err(SetupError::SameCharacter(user_character.to_string()));
        }
        Ok(Self {
            mode,
            user_character: user_character.to_string(),
            opponent_character: opponent_character.to_string(),
        })
    }

    /// Build the initial record. In agent-vs-agent play the user seat gets
    /// its own opening conversation showing its own character, using
    /// `player_prompt`; human games ignore it.
    pub async fn build_record(
        &self,
        id: &str,
        model_name: &str,
        assets: &ImageAssets,
        opponent_prompt: &str,
        player_prompt: &str,
    ) -> Result<GameRecord, SetupError> {
        let board = assets.board_png().await?;
        let opponent_card = assets.character_png(&self.opponent_character).await?;
        let conversation = opening_conversation(opponent_prompt, &board, &opponent_card);

        let player_conversation = match self.mode {
            GameMode::HumanVsAi => None,
            GameMode::AiVsAi => {
                let user_card = assets.character_png(&self.user_character).await?;
                Some(opening_conversation(player_prompt, &board, &user_card))
            }
        };

        tracing::info!(
            game_id = %id,
            mode = self.mode.as_str(),
            model = %model_name,
            "Game created"
        );

        Ok(GameRecord::new(
            id,
            self.mode,
            model_name,
            &self.user_character,
            &self.opponent_character,
            conversation,
            player_conversation,
        ))
    }
}
