//! Process configuration for sync runs.
//!
//! # Responsibility
//! - Resolve sync settings from the process environment and an optional
//!   `.env` file.
//! - Decide which chat channel, if any, receives pass notifications.
//!
//! # Invariants
//! - Required keys are never defaulted.
//! - Process environment values win over `.env` file values.
//! - Parsing goes through an injected lookup, never process-global state.

use crate::logging::default_log_level;
use crate::store::memory_target::DEFAULT_MAX_RESULTS;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_DB_PATH: &str = "TASKSYNC_DB_PATH";
pub const ENV_TARGET_PATH: &str = "TASKSYNC_TARGET_PATH";
pub const ENV_LOG_LEVEL: &str = "TASKSYNC_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "TASKSYNC_LOG_DIR";
pub const ENV_TARGET_MAX_RESULTS: &str = "TASKSYNC_TARGET_MAX_RESULTS";
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const DOTENV_FILE: &str = ".env";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid {
        key: &'static str,
        value: String,
        message: String,
    },
    EnvFile {
        path: PathBuf,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "missing required setting `{key}`"),
            Self::Invalid {
                key,
                value,
                message,
            } => write!(f, "invalid value `{value}` for `{key}`: {message}"),
            Self::EnvFile { path, message } => {
                write!(f, "failed to read env file `{}`: {message}", path.display())
            }
        }
    }
}

impl Error for ConfigError {}

/// Settings for one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// SQLite notes database holding the source tasks.
    pub db_path: PathBuf,
    /// JSON snapshot of the target task list.
    pub target_path: PathBuf,
    pub log_level: String,
    /// File logging is disabled when unset.
    pub log_dir: Option<PathBuf>,
    pub target_max_results: usize,
    /// Chat notifications are logged instead when unset.
    pub telegram: Option<TelegramConfig>,
}

/// Bot credentials for Telegram notifications.
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl Debug for TelegramConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl SyncConfig {
    /// Reads settings from the process environment, falling back to a `.env`
    /// file in the working directory when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dotenv = Path::new(DOTENV_FILE);
        if dotenv.is_file() {
            return Self::from_env_file(dotenv);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings from the process environment, then from `path`.
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        let file_values = read_env_file(path)?;
        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .or_else(|| file_values.get(key).cloned())
        })
    }

    /// Reads settings through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let db_path = get(ENV_DB_PATH)
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing(ENV_DB_PATH))?;
        let target_path = get(ENV_TARGET_PATH)
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing(ENV_TARGET_PATH))?;
        let log_level = get(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string());
        let log_dir = get(ENV_LOG_DIR).map(PathBuf::from);

        let target_max_results = match get(ENV_TARGET_MAX_RESULTS) {
            Some(value) => match value.parse::<usize>() {
                Ok(parsed) if parsed > 0 => parsed,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: ENV_TARGET_MAX_RESULTS,
                        value,
                        message: "expected a positive integer".to_string(),
                    });
                }
            },
            None => DEFAULT_MAX_RESULTS,
        };

        let telegram = match (get(ENV_TELEGRAM_BOT_TOKEN), get(ENV_TELEGRAM_CHAT_ID)) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig { bot_token, chat_id }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(ENV_TELEGRAM_CHAT_ID)),
            (None, Some(_)) => return Err(ConfigError::Missing(ENV_TELEGRAM_BOT_TOKEN)),
        };

        Ok(Self {
            db_path,
            target_path,
            log_level,
            log_dir,
            target_max_results,
            telegram,
        })
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let env_file_error = |err: dotenvy::Error| ConfigError::EnvFile {
        path: path.to_path_buf(),
        message: err.to_string(),
    };

    let mut values = HashMap::new();
    for item in dotenvy::from_path_iter(path).map_err(env_file_error)? {
        let (key, value) = item.map_err(env_file_error)?;
        values.insert(key, value);
    }
    Ok(values)
}
