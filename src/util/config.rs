//! Configuration file support for nuconvert.
//!
//! nuconvert supports two configuration file locations:
//! - Global: `~/.nuconvert/config.toml` - User-wide defaults
//! - Project: `<root>/.nuconvert/config.toml` - Repository-specific overrides
//!
//! Project config takes precedence over global config, and command-line
//! flags take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sources::credentials::CredentialsMigrationMode;

/// nuconvert configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Conversion settings
    pub convert: ConvertConfig,
}

/// Defaults for `nuconvert convert`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Credential migration mode (`encrypt`, `plaintext`, `selective`)
    pub credentials: Option<String>,

    /// Target manifest path, relative to the repository root
    pub dependencies_file: Option<PathBuf>,

    /// Extra directory names to skip while scanning
    pub exclude: Vec<String>,

    /// Keep `packages.config`, `NuGet.exe` and `NuGet.targets` after converting
    pub keep_legacy_files: Option<bool>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing
    /// or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.convert.credentials.is_some() {
            self.convert.credentials = other.convert.credentials;
        }
        if other.convert.dependencies_file.is_some() {
            self.convert.dependencies_file = other.convert.dependencies_file;
        }
        if !other.convert.exclude.is_empty() {
            self.convert.exclude.extend(other.convert.exclude);
        }
        if other.convert.keep_legacy_files.is_some() {
            self.convert.keep_legacy_files = other.convert.keep_legacy_files;
        }
    }

    /// The configured credential migration mode, if any.
    ///
    /// An unknown mode is an error, not a silent default.
    pub fn credentials_mode(&self) -> Result<Option<CredentialsMigrationMode>> {
        self.convert
            .credentials
            .as_deref()
            .map(|mode| mode.parse::<CredentialsMigrationMode>())
            .transpose()
            .context("invalid `convert.credentials` in config")
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.nuconvert/config.toml)
/// 2. Global config (~/.nuconvert/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global nuconvert config directory (~/.nuconvert).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".nuconvert"))
}

/// Get the global config path (~/.nuconvert/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (<root>/.nuconvert/config.toml).
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(".nuconvert").join("config.toml")
}
