// Configuration loading and parsing (league.toml, engine.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::draft::league::RawLeagueSettings;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: RawLeagueSettings,
    pub poller: PollerConfig,
    pub tracker: TrackerConfig,
    pub snapshot: SnapshotConfig,
    pub queue: QueueConfig,
    pub data_paths: DataPaths,
}

/// Wrapper for the top-level `[league]` table in league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: RawLeagueSettings,
}

// ---------------------------------------------------------------------------
// engine.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct EngineFile {
    poller: PollerConfig,
    #[serde(default)]
    tracker: TrackerConfig,
    #[serde(default)]
    snapshot: SnapshotConfig,
    #[serde(default)]
    queue: QueueConfig,
    data_paths: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Endpoint returning the full list of picks made so far.
    pub url: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// At most this many requests per `window_secs`.
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_max_requests() -> usize {
    60
}

fn default_window_secs() -> u64 {
    60
}

fn default_retry_delay_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Minimum name similarity in (0, 1] for a vision name to match.
    pub similarity_threshold: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            similarity_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    /// Available entities listed per position.
    pub top_n: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig { top_n: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig { capacity: 256 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub players: String,
    pub teams: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml` and
/// `config/engine.toml`, relative to the given `base_dir`.
///
/// Does not copy defaults; `load_config()` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;

    let engine_path = config_dir.join("engine.toml");
    let engine_text = read_file(&engine_path)?;
    let engine_file: EngineFile =
        toml::from_str(&engine_text).map_err(|e| ConfigError::ParseError {
            path: engine_path.clone(),
            source: e,
        })?;

    let config = Config {
        league: league_file.league,
        poller: engine_file.poller,
        tracker: engine_file.tracker,
        snapshot: engine_file.snapshot,
        queue: engine_file.queue,
        data_paths: engine_file.data_paths,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying any
/// missing default files first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.league.num_teams == 0 {
        return Err(invalid("league.num_teams", "must be greater than 0"));
    }
    if config.league.slots.values().sum::<usize>() == 0 {
        return Err(invalid("league.slots", "roster must have at least one slot"));
    }

    let poller = &config.poller;
    if poller.url.trim().is_empty() {
        return Err(invalid("poller.url", "must not be empty"));
    }
    let poller_fields: &[(&str, u64)] = &[
        ("poller.interval_ms", poller.interval_ms),
        ("poller.request_timeout_ms", poller.request_timeout_ms),
        ("poller.window_secs", poller.window_secs),
        ("poller.retry_delay_ms", poller.retry_delay_ms),
    ];
    for (name, val) in poller_fields {
        if *val == 0 {
            return Err(invalid(name, "must be > 0"));
        }
    }
    if poller.max_requests == 0 {
        return Err(invalid("poller.max_requests", "must be > 0"));
    }

    let threshold = config.tracker.similarity_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(invalid(
            "tracker.similarity_threshold",
            format!("must be in (0.0, 1.0], got {threshold}"),
        ));
    }

    if config.snapshot.top_n == 0 {
        return Err(invalid("snapshot.top_n", "must be > 0"));
    }
    if config.queue.capacity == 0 {
        return Err(invalid("queue.capacity", "must be > 0"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
