/*!
 * Runtime configuration for the ICD reference host
 *
 * Resolved from a TOML file, then `ICDREF_*` environment overrides,
 * then built-in defaults.
 */

use crate::error::{IcdError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// ICD-10-CM code file (`<code> <description>` per line)
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// Log file; `None` or "-" logs to stderr
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,

    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Load the catalog at startup when the catalog table is empty
    #[serde(default = "default_load_catalog_on_startup")]
    pub load_catalog_on_startup: bool,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("icd_codes.db")
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("icd10cm-codes-2025.txt")
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("app.log"))
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_load_catalog_on_startup() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            catalog_path: default_catalog_path(),
            log_file: default_log_file(),
            log_level: default_log_level(),
            load_catalog_on_startup: default_load_catalog_on_startup(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| IcdError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|e| IcdError::Configuration {
            message: format!("failed to parse {}: {}", path.display(), e),
        })
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self).map_err(|e| IcdError::Configuration {
            message: format!("failed to serialize config: {}", e),
        })?;
        std::fs::write(path, contents).map_err(|source| IcdError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides
    ///
    /// Supported environment variables:
    /// - `ICDREF_DATABASE`: database file path
    /// - `ICDREF_CATALOG`: code file path
    /// - `ICDREF_LOG_FILE`: log file path, or "-" for stderr
    /// - `ICDREF_LOG_LEVEL`: filter directive, e.g. "info"
    /// - `ICDREF_LOAD_ON_STARTUP`: "true" or "false"
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("ICDREF_DATABASE") {
            self.database_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("ICDREF_CATALOG") {
            self.catalog_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("ICDREF_LOG_FILE") {
            self.log_file = match val.as_str() {
                "" | "-" => None,
                path => Some(PathBuf::from(path)),
            };
        }

        if let Some(val) = lookup("ICDREF_LOG_LEVEL") {
            self.log_level = val;
        }

        if let Some(val) = lookup("ICDREF_LOAD_ON_STARTUP") {
            self.load_catalog_on_startup = val.to_lowercase() == "true";
        }
    }

    /// Default configuration file path
    ///
    /// Returns `~/.config/icdref/config.toml` on Unix-like systems
    /// or `%APPDATA%\icdref\config.toml` on Windows
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "icdref")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Resolve configuration: explicit file (must exist), else the default
    /// file if present, else defaults; environment overrides on top.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let base = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        Ok(base.with_env_overrides())
    }
}
