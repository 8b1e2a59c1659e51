//! Runtime configuration and per-player endpoint settings

use crate::db::{Database, DbError, EncryptedSecret};
use crate::game::Side;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-5-mini";
pub const DEFAULT_MAX_CONTINUATIONS: u32 = 16;
pub const DEFAULT_MAX_AGENT_TURNS: u32 = 200;
pub const DEFAULT_AGENT_PACING: Duration = Duration::from_millis(1500);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
    #[error("No endpoint configured for the {0:?} seat")]
    NotConfigured(Side),
    #[error("API key is required")]
    MissingApiKey,
    #[error("Failed to decrypt API key: {0}")]
    Decrypt(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

// ============================================================================
// Runtime configuration
// ============================================================================

/// Process-level settings, read from `GUESSWHO_*` environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub db_path: PathBuf,
    pub asset_dir: PathBuf,
    /// Follow-up requests allowed after the first one within a single turn
    pub max_continuations: u32,
    pub max_agent_turns: u32,
    pub agent_pacing: Duration,
    pub default_model: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            asset_dir: PathBuf::from("public"),
            max_continuations: DEFAULT_MAX_CONTINUATIONS,
            max_agent_turns: DEFAULT_MAX_AGENT_TURNS,
            agent_pacing: DEFAULT_AGENT_PACING,
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let number = |var: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(var) {
                None => Ok(default),
                Some(value) => value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue { var, value }),
            }
        };
        let small = |var: &'static str, default: u32| -> Result<u32, ConfigError> {
            let value = number(var, u64::from(default))?;
            u32::try_from(value).map_err(|_| ConfigError::InvalidValue {
                var,
                value: value.to_string(),
            })
        };

        let pacing_default = u64::try_from(defaults.agent_pacing.as_millis()).unwrap_or(u64::MAX);

        Ok(Self {
            db_path: lookup("GUESSWHO_DB_PATH").map_or(defaults.db_path, PathBuf::from),
            asset_dir: lookup("GUESSWHO_ASSET_DIR").map_or(defaults.asset_dir, PathBuf::from),
            max_continuations: small("GUESSWHO_MAX_CONTINUATIONS", defaults.max_continuations)?,
            max_agent_turns: small("GUESSWHO_MAX_AGENT_TURNS", defaults.max_agent_turns)?,
            agent_pacing: Duration::from_millis(number("GUESSWHO_AGENT_PACING_MS", pacing_default)?),
            default_model: lookup("GUESSWHO_DEFAULT_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.default_model),
        })
    }
}

fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".guess-who-arena").join("games.db")
}

// ============================================================================
// Player settings
// ============================================================================

/// Everything needed to talk to one player's model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSettings {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    /// `None` means the bundled default prompt
    pub system_prompt: Option<String>,
    /// Show the model's character to the human while playing
    pub reveal_character: bool,
}

impl PlayerSettings {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            model: model.into(),
            system_prompt: None,
            reveal_character: false,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Resolves the endpoint for a seat: agent 1 sits in [`Side::User`], the
/// opponent model (agent 2) in [`Side::Opponent`].
#[async_trait]
pub trait SettingsResolver: Send + Sync {
    async fn resolve(&self, seat: Side) -> Result<PlayerSettings, ConfigError>;
}

/// Settings held in memory for the lifetime of the caller (guest play)
#[derive(Debug, Clone, Default)]
pub struct EphemeralSettings {
    seats: HashMap<Side, PlayerSettings>,
}

impl EphemeralSettings {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_seat(mut self, seat: Side, settings: PlayerSettings) -> Self {
        self.seats.insert(seat, settings);
        self
    }
}

#[async_trait]
impl SettingsResolver for EphemeralSettings {
    async fn resolve(&self, seat: Side) -> Result<PlayerSettings, ConfigError> {
        let settings = self
            .seats
            .get(&seat)
            .cloned()
            .ok_or(ConfigError::NotConfigured(seat))?;
        if settings.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(settings)
    }
}

/// Decrypts stored API keys. Key management lives with the host.
pub trait SecretDecryptor: Send + Sync {
    fn decrypt(&self, secret: &EncryptedSecret) -> Result<String, ConfigError>;
}

/// Settings backed by saved AI configurations in the database
pub struct StoredSettings {
    db: Database,
    decryptor: Arc<dyn SecretDecryptor>,
    seats: HashMap<Side, String>,
    system_prompts: HashMap<Side, String>,
}

impl StoredSettings {
    pub fn new(db: Database, decryptor: Arc<dyn SecretDecryptor>) -> Self {
        Self {
            db,
            decryptor,
            seats: HashMap::new(),
            system_prompts: HashMap::new(),
        }
    }

    /// Seat a saved configuration by id
    #[must_use]
    pub fn with_seat(mut self, seat: Side, configuration_id: impl Into<String>) -> Self {
        self.seats.insert(seat, configuration_id.into());
        self
    }

    #[must_use]
    pub fn with_system_prompt(mut self, seat: Side, prompt: impl Into<String>) -> Self {
        self.system_prompts.insert(seat, prompt.into());
        self
    }
}

#[async_trait]
impl SettingsResolver for StoredSettings {
    async fn resolve(&self, seat: Side) -> Result<PlayerSettings, ConfigError> {
        let id = self.seats.get(&seat).ok_or(ConfigError::NotConfigured(seat))?;
        let configuration = self.db.get_ai_configuration(id)?;
        let api_key = self.decryptor.decrypt(&configuration.key_encrypted)?;
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        tracing::debug!(seat = ?seat, configuration = %configuration.name, "Resolved stored settings");
        Ok(PlayerSettings {
            api_key,
            base_url: configuration.base_url,
            model: configuration.model_name,
            system_prompt: self.system_prompts.get(&seat).cloned(),
            reveal_character: false,
        })
    }
}
