//! Persistent game preferences (`mode`, `boardSize`) stored as a JSON file.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// Default config file name.
pub const DEFAULT_CONFIG_PATH: &str = "game_config.json";

/// Default board side length.
pub const DEFAULT_BOARD_SIZE: usize = 3;

/// Accepted board sizes.
pub const BOARD_SIZE_RANGE: std::ops::RangeInclusive<usize> = 3..=9;

/// How a game is played.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMode {
    /// Local human against the heuristic opponent.
    #[default]
    HumanVsAi,
    /// Two humans on two devices over the LAN.
    HumanVsHumanOnline,
}

/// Saved preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Preferred mode.
    mode: GameMode,
    /// Board side length for new games.
    board_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: GameMode::default(),
            board_size: DEFAULT_BOARD_SIZE,
        }
    }
}

impl Config {
    /// Creates a config, clamping the board size into the accepted range.
    #[instrument]
    pub fn new(mode: GameMode, board_size: usize) -> Self {
        let clamped = board_size.clamp(*BOARD_SIZE_RANGE.start(), *BOARD_SIZE_RANGE.end());
        if clamped != board_size {
            warn!(requested = board_size, used = clamped, "Board size out of range");
        }
        Self {
            mode,
            board_size: clamped,
        }
    }

    /// Parses config text, substituting the default for any field that is
    /// missing or invalid. Never fails.
    #[instrument(skip(raw))]
    pub fn parse(raw: &str) -> Self {
        let defaults = Self::default();
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Config is not valid JSON, using defaults");
                return defaults;
            }
        };

        let mode = value
            .get("mode")
            .and_then(Value::as_str)
            .and_then(|s| GameMode::from_str(s).ok())
            .unwrap_or_else(|| {
                debug!(raw = ?value.get("mode"), "Using default mode");
                defaults.mode
            });

        let board_size = value
            .get("boardSize")
            .and_then(parse_board_size)
            .filter(|size| BOARD_SIZE_RANGE.contains(size))
            .unwrap_or_else(|| {
                debug!(raw = ?value.get("boardSize"), "Using default board size");
                defaults.board_size
            });

        Self { mode, board_size }
    }

    /// Loads the config file, falling back to defaults on any error.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(content) => {
                let config = Self::parse(&content);
                info!(mode = %config.mode, board_size = config.board_size, "Config loaded");
                config
            }
            Err(e) => {
                debug!(error = %e, "Config file unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// Writes the config file, creating parent directories as needed.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::new(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::new(format!("Failed to encode config: {}", e)))?;
        std::fs::write(path, json)
            .map_err(|e| ConfigError::new(format!("Failed to write config file: {}", e)))?;

        info!(mode = %self.mode, board_size = self.board_size, "Config saved");
        Ok(())
    }
}

/// Accepts a JSON integer or a numeric string, as older files stored either.
fn parse_board_size(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
