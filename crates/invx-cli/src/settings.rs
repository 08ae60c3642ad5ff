//! CLI settings file.
//!
//! ```toml
//! [mapping]
//! cache_ttl_secs = 300
//! fetch_timeout_ms = 2000
//! enable_cache = true
//!
//! [store]
//! config_dir = "configs"
//! ```
//!
//! Every key is optional. Command-line flags take precedence.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use invx_map::{DEFAULT_TTL, MappingOptions};

/// Settings file looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "invx.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mapping: MappingSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingSettings {
    pub cache_ttl_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_ms: Option<u64>,
    pub enable_cache: bool,
}

impl Default for MappingSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_TTL.as_secs(),
            fetch_timeout_ms: None,
            enable_cache: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub config_dir: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("configs"),
        }
    }
}

impl Settings {
    /// Load settings from `explicit`, else from `./invx.toml` when present,
    /// else defaults.
    ///
    /// An explicit path must exist; a malformed file is always an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_SETTINGS_FILE);
                if path.is_file() {
                    Self::from_file(path)
                } else {
                    tracing::debug!("No settings file found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        tracing::info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn mapping_options(&self) -> MappingOptions {
        let mut options = MappingOptions::default()
            .with_cache_ttl(Duration::from_secs(self.mapping.cache_ttl_secs));
        if let Some(ms) = self.mapping.fetch_timeout_ms {
            options = options.with_fetch_timeout(Duration::from_millis(ms));
        }
        if !self.mapping.enable_cache {
            options = options.without_cache();
        }
        options
    }

    /// Config directory, with a command-line override.
    pub fn config_dir(&self, overridden: Option<&Path>) -> PathBuf {
        overridden.map_or_else(|| self.store.config_dir.clone(), Path::to_path_buf)
    }
}
