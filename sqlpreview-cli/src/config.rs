//! CLI configuration handling.
//!
//! Values come from three layers: command-line flags (or their `INPUT_*`
//! environment variables), then `sqlpreview.toml`, then built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CliResult;

/// Default config file name (lives in the repository root)
pub const CONFIG_FILE_NAME: &str = "sqlpreview.toml";

/// sqlpreview configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target database
    pub database: DatabaseConfig,

    /// Engine download and invocation
    pub engine: EngineConfig,

    /// Review comment
    pub comment: CommentConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `explicit`, or `sqlpreview.toml` under `dir` when it exists.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file just yields the defaults.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> CliResult<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        let default_path = dir.join(CONFIG_FILE_NAME);
        if default_path.is_file() {
            Ok((Self::load(&default_path)?, Some(default_path)))
        } else {
            Ok((Self::default(), None))
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database kind (mysql, postgresql, sqlite, mssql)
    pub kind: Option<String>,

    /// Host name
    pub host: Option<String>,

    /// Port number
    pub port: Option<u16>,

    /// User name
    pub user: Option<String>,

    /// Database name or sqlite file
    pub name: Option<String>,

    /// Desired schema file
    pub schema_file: Option<PathBuf>,

    /// Baseline schema file overriding the base revision
    pub baseline_file: Option<PathBuf>,
}

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Release to download ("latest" or a tag)
    pub version: Option<String>,

    /// Engine configuration file passed as --config
    pub config: Option<PathBuf>,

    /// Release download root
    pub release_base_url: Option<String>,

    /// Apply instead of plan
    pub apply: bool,
}

/// Comment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentConfig {
    /// Post a comment at all
    pub enabled: bool,

    /// Custom title
    pub title: Option<String>,

    /// Login whose comments may be updated
    pub author: Option<String>,
}

impl Default for CommentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: None,
            author: None,
        }
    }
}
