use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::search::SearchMode;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "io error: {error}"),
            Self::Parse(error) => write!(f, "parse error: {error}"),
            Self::Invalid(error) => write!(f, "invalid config: {error}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchModeSetting {
    Direct,
    Fuzzy,
}

impl From<SearchModeSetting> for SearchMode {
    fn from(value: SearchModeSetting) -> Self {
        match value {
            SearchModeSetting::Direct => SearchMode::Direct,
            SearchModeSetting::Fuzzy => SearchMode::Fuzzy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session_id: String,
    pub max_results: u16,
    pub search_mode: SearchModeSetting,
    pub preserve_order: bool,
    pub custom_entry: bool,
    #[serde(skip)]
    pub cache_db_path: PathBuf,
    #[serde(skip)]
    pub lock_dir: PathBuf,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let base = stable_app_data_dir();
        Self {
            session_id: String::new(),
            max_results: 20,
            search_mode: SearchModeSetting::Fuzzy,
            preserve_order: false,
            custom_entry: false,
            cache_db_path: base.join("cache.sqlite3"),
            lock_dir: base.join("locks"),
            config_path: base.join("config.toml"),
        }
    }
}

/// Stable per-user data directory; overridable for tests and sandboxed
/// runs.
pub fn stable_app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("QUICKMENU_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    std::env::temp_dir().join("quickmenu")
}

pub fn validate(cfg: &Config) -> Result<(), String> {
    if cfg.max_results > 500 {
        return Err("max_results out of range (0-500, 0 = unlimited)".into());
    }

    if cfg.cache_db_path.as_os_str().is_empty() {
        return Err("cache_db_path is required".into());
    }

    if cfg.lock_dir.as_os_str().is_empty() {
        return Err("lock_dir is required".into());
    }

    if cfg.config_path.as_os_str().is_empty() {
        return Err("config_path is required".into());
    }

    Ok(())
}

pub fn load(explicit_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    let path = explicit_path.unwrap_or_else(|| Config::default().config_path);

    let mut cfg = if path.exists() {
        let raw = std::fs::read_to_string(&path)?;
        toml::from_str::<Config>(&raw).map_err(|error| ConfigError::Parse(error.to_string()))?
    } else {
        Config::default()
    };

    // serde(skip) leaves the path fields at their zero values
    let defaults = Config::default();
    cfg.cache_db_path = defaults.cache_db_path;
    cfg.lock_dir = defaults.lock_dir;
    cfg.config_path = path;

    validate(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    validate(cfg).map_err(ConfigError::Invalid)?;
    if let Some(parent) = cfg.config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let encoded =
        toml::to_string_pretty(cfg).map_err(|error| ConfigError::Parse(error.to_string()))?;
    std::fs::write(&cfg.config_path, encoded)?;
    Ok(())
}
