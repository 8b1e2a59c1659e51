//! SQLite persistence for games and saved AI configurations

mod schema;

pub use schema::*;

use crate::conversation::ConversationLog;
use crate::game::{GameMode, Winner};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to encode column: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Game not found: {0}")]
    GameNotFound(String),
    #[error("AI configuration not found: {0}")]
    ConfigurationNotFound(String),
    #[error("Database connection lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // ==================== Game Operations ====================

    /// Insert or replace the whole game row
    pub fn save_game(&self, game: &GameRecord) -> DbResult<()> {
        let conversation = serde_json::to_string(&game.conversation)?;
        let player_conversation = game
            .player_conversation
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let user_eliminated = serde_json::to_string(&game.user_eliminated)?;
        let llm_eliminated = serde_json::to_string(&game.llm_eliminated)?;
        let winner = game.winner.as_ref().map(ToString::to_string);

        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO games (id, game_type, model_name, user_character, llm_character,
                conversation, player_conversation, user_eliminated, llm_eliminated, winner,
                completed_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                game.id,
                game.mode.as_str(),
                game.model_name,
                game.user_character,
                game.llm_character,
                conversation,
                player_conversation,
                user_eliminated,
                llm_eliminated,
                winner,
                game.completed_at.as_ref().map(DateTime::to_rfc3339),
                game.created_at.to_rfc3339(),
                game.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get game by ID
    pub fn get_game(&self, id: &str) -> DbResult<GameRecord> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {GAME_COLUMNS} FROM games WHERE id = ?1"),
            params![id],
            parse_game_row,
        )
        .optional()?
        .ok_or_else(|| DbError::GameNotFound(id.to_string()))
    }

    /// Most recent games first
    pub fn list_games(&self, limit: u32) -> DbResult<Vec<GameRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {GAME_COLUMNS} FROM games ORDER BY created_at DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], parse_game_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== AI Configuration Operations ====================

    pub fn create_ai_configuration(&self, input: &AiConfigurationInput) -> DbResult<AiConfiguration> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let key = serde_json::to_string(&input.key_encrypted)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO ai_configurations (id, name, model_name, provider, key_encrypted, base_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                id,
                input.name,
                input.model_name,
                input.provider,
                key,
                input.base_url,
                now.to_rfc3339()
            ],
        )?;

        Ok(AiConfiguration {
            id,
            name: input.name.clone(),
            model_name: input.model_name.clone(),
            provider: input.provider.clone(),
            key_encrypted: input.key_encrypted.clone(),
            base_url: input.base_url.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update_ai_configuration(&self, id: &str, input: &AiConfigurationInput) -> DbResult<()> {
        let key = serde_json::to_string(&input.key_encrypted)?;
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE ai_configurations
             SET name = ?2, model_name = ?3, provider = ?4, key_encrypted = ?5, base_url = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                id,
                input.name,
                input.model_name,
                input.provider,
                key,
                input.base_url,
                Utc::now().to_rfc3339()
            ],
        )?;
        if updated == 0 {
            return Err(DbError::ConfigurationNotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn get_ai_configuration(&self, id: &str) -> DbResult<AiConfiguration> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {CONFIG_COLUMNS} FROM ai_configurations WHERE id = ?1"),
            params![id],
            parse_config_row,
        )
        .optional()?
        .ok_or_else(|| DbError::ConfigurationNotFound(id.to_string()))
    }

    /// Newest first
    pub fn list_ai_configurations(&self) -> DbResult<Vec<AiConfiguration>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONFIG_COLUMNS} FROM ai_configurations ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map([], parse_config_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn delete_ai_configuration(&self, id: &str) -> DbResult<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM ai_configurations WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(DbError::ConfigurationNotFound(id.to_string()));
        }
        Ok(())
    }
}

const GAME_COLUMNS: &str = "id, game_type, model_name, user_character, llm_character, conversation,
    player_conversation, user_eliminated, llm_eliminated, winner, completed_at, created_at, updated_at";

const CONFIG_COLUMNS: &str =
    "id, name, model_name, provider, key_encrypted, base_url, created_at, updated_at";

fn parse_game_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GameRecord> {
    let mode_str: String = row.get(1)?;
    let winner: Option<String> = row.get(9)?;
    Ok(GameRecord {
        id: row.get(0)?,
        mode: GameMode::parse(&mode_str)
            .ok_or_else(|| unknown_value(1, "game_type", &mode_str))?,
        model_name: row.get(2)?,
        user_character: row.get(3)?,
        llm_character: row.get(4)?,
        conversation: json_column::<ConversationLog>(row, 5)?,
        player_conversation: row
            .get::<_, Option<String>>(6)?
            .map(|raw| decode_json(6, &raw))
            .transpose()?,
        user_eliminated: json_column(row, 7)?,
        llm_eliminated: json_column(row, 8)?,
        winner: winner
            .map(|w| parse_winner(&w).ok_or_else(|| unknown_value(9, "winner", &w)))
            .transpose()?,
        completed_at: row
            .get::<_, Option<String>>(10)?
            .map(|s| parse_datetime(10, &s))
            .transpose()?,
        created_at: parse_datetime(11, &row.get::<_, String>(11)?)?,
        updated_at: parse_datetime(12, &row.get::<_, String>(12)?)?,
    })
}

fn parse_config_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AiConfiguration> {
    Ok(AiConfiguration {
        id: row.get(0)?,
        name: row.get(1)?,
        model_name: row.get(2)?,
        provider: row.get(3)?,
        key_encrypted: json_column(row, 4)?,
        base_url: row.get(5)?,
        created_at: parse_datetime(6, &row.get::<_, String>(6)?)?,
        updated_at: parse_datetime(7, &row.get::<_, String>(7)?)?,
    })
}

fn json_column<T: DeserializeOwned>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    decode_json(idx, &raw)
}

fn decode_json<T: DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_winner(s: &str) -> Option<Winner> {
    match s {
        "user" => Some(Winner::User),
        "llm" => Some(Winner::Opponent),
        "tie" => Some(Winner::Tie),
        _ => None,
    }
}

fn parse_datetime(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn unknown_value(idx: usize, column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unknown {column}: {value}").into(),
    )
}
