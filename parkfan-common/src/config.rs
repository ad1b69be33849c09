//! Configuration file resolution and loading
//!
//! Config path resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config directory (`<config_dir>/parkfan/<file_name>`)
//! 4. No file: compiled defaults
//!
//! A missing file is never fatal. The caller gets `T::default()` and a warning
//! is logged. A file that exists but fails to parse is an error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Application directory name under the platform config directory
pub const APP_DIR: &str = "parkfan";

/// Logging section shared by every parkfan config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (e.g. "info", "parkfan_ingest=debug")
    pub level: String,
    /// Emit JSON-formatted lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Resolves which config file (if any) should be loaded
#[derive(Debug, Clone)]
pub struct ConfigPathResolver {
    file_name: String,
    env_var: String,
}

impl ConfigPathResolver {
    /// Create resolver for `file_name`, overridable via `env_var`
    pub fn new(file_name: impl Into<String>, env_var: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            env_var: env_var.into(),
        }
    }

    /// Resolve config path by priority; `None` means "use compiled defaults"
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Per-user config directory
        let user_config = dirs::config_dir().map(|d| d.join(APP_DIR).join(&self.file_name));
        match user_config {
            Some(path) if path.exists() => Some(path),
            _ => None,
        }
    }
}

/// Load a TOML config file, degrading to defaults when it does not exist
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No config file found, using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(path = %path.display(), "Config file missing, using compiled defaults");
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}
