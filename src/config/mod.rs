//! Configuration for the dependency graph viewer
//!
//! A single TOML file carries the theme (per-role colors, shapes, widths,
//! bundling thresholds) and layout spacing. Every field has a default, so a
//! missing file or a partial file is fine; a malformed file is an error.
//!
//! # Location
//!
//! The default file is `config.toml` under the platform config directory:
//! - **Linux**: `~/.config/depgraph-view/`
//! - **macOS**: `~/Library/Application Support/depgraph-view/`
//! - **Windows**: `%APPDATA%\depgraph-view\`
//!
//! # Example
//!
//! ```toml
//! [theme]
//! font_size = 14.0
//!
//! [theme.bundling]
//! enabled = true
//! out_threshold = 4
//!
//! [layout]
//! rank_separation = 90.0
//! ```

pub mod theme;

pub use theme::{
    BundlingSettings, LinkStyle, LinkStyleKind, NodeStyle, PreferenceChanged, ShapeToken, Theme,
    ThemeSettings, ThemeStore,
};

use crate::layout::LayoutSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Application identifier for the config directory
pub const APP_ID: &str = "depgraph-view";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Default config file path, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Complete viewer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub theme: ThemeSettings,
    pub layout: LayoutSettings,
}

impl ViewerConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path`, or from the default location when `None`, falling
    /// back to defaults on any error.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(default_config_path) else {
            return Self::default();
        };
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
