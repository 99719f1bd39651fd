//! Runtime settings. Values resolve in order: command-line flags, the config
//! file (named by `--config` / `BIRD_CATALOG_CONFIG`, else
//! `<data_dir>/config.toml`), then built-in defaults.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DATA_DIR_NAME: &str = ".bird-catalog";
const CONFIG_FILE_NAME: &str = "config.toml";
pub const LOG_FILE_NAME: &str = "catalog.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Flat JSON file holding only birds.
    Json,
    /// SQLite database with locations, observations, habitats and reports.
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageMode,
    pub data_dir: PathBuf,
    pub json_file: String,
    pub db_file: String,
    pub page_size: i64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageMode::Sqlite,
            data_dir: default_data_dir(),
            json_file: "birds.json".to_string(),
            db_file: "birds.sqlite".to_string(),
            page_size: 10,
            log_level: "info".to_string(),
        }
    }
}

/// Values supplied on the command line. `None` defers to the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub storage: Option<StorageMode>,
    pub data_dir: Option<PathBuf>,
    pub page_size: Option<i64>,
    pub log_level: Option<String>,
}

/// `~/.bird-catalog`, or a relative directory when no home can be found.
fn default_data_dir() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME))
}

impl Config {
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let path = match &overrides.config {
            Some(path) => path.clone(),
            None => overrides
                .data_dir
                .clone()
                .unwrap_or_else(default_data_dir)
                .join(CONFIG_FILE_NAME),
        };

        let mut config = Self::from_file(&path)?.unwrap_or_default();
        config.apply(overrides);
        Ok(config)
    }

    /// Parse a config file. A missing file yields `None`; an unreadable or
    /// malformed one is an error.
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(None);
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read config {}", path.display()))
            }
        };
        let config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(Some(config))
    }

    fn apply(&mut self, overrides: &Overrides) {
        if let Some(storage) = overrides.storage {
            self.storage = storage;
        }
        if let Some(data_dir) = &overrides.data_dir {
            self.data_dir = data_dir.clone();
        }
        if let Some(page_size) = overrides.page_size {
            self.page_size = page_size;
        }
        if let Some(level) = &overrides.log_level {
            self.log_level = level.clone();
        }
    }

    pub fn json_path(&self) -> PathBuf {
        self.data_dir.join(&self.json_file)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }
}
