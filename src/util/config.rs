//! Configuration file support for Quay.
//!
//! Two configuration file locations are read:
//! - Global: `~/.quay/config.toml` - user-wide defaults
//! - Workspace: `.quay/config.toml` - workspace-specific overrides
//!
//! Workspace config takes precedence over global config, and values set in
//! the workspace manifest take precedence over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::manifest::WorkspaceSection;

/// Default wait for a project's exclusive lock.
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 120;

/// Default wait for a background artifact fetch.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;

/// Quay configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workspace: WorkspaceConfig,
}

/// Workspace-wide settings that may come from a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct WorkspaceConfig {
    /// Treat every project as stale
    pub offline: Option<bool>,

    pub lock_timeout_secs: Option<u64>,

    pub fetch_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing or broken.
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

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("failed to write config: {}", path.display()))?;

        Ok(())
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.workspace.offline.is_some() {
            self.workspace.offline = other.workspace.offline;
        }
        if other.workspace.lock_timeout_secs.is_some() {
            self.workspace.lock_timeout_secs = other.workspace.lock_timeout_secs;
        }
        if other.workspace.fetch_timeout_secs.is_some() {
            self.workspace.fetch_timeout_secs = other.workspace.fetch_timeout_secs;
        }
    }

    /// Overlay the values written in a workspace manifest.
    pub fn apply_manifest(&mut self, section: &WorkspaceSection) {
        self.merge(Config {
            workspace: WorkspaceConfig {
                offline: section.offline,
                lock_timeout_secs: section.lock_timeout_secs,
                fetch_timeout_secs: section.fetch_timeout_secs,
            },
        });
    }

    pub fn offline(&self) -> bool {
        self.workspace.offline.unwrap_or(false)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(
            self.workspace
                .lock_timeout_secs
                .unwrap_or(DEFAULT_LOCK_TIMEOUT_SECS),
        )
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(
            self.workspace
                .fetch_timeout_secs
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
        )
    }
}

/// Load merged configuration from global and workspace locations.
///
/// Order of precedence (highest to lowest):
/// 1. Workspace config (.quay/config.toml)
/// 2. Global config (~/.quay/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, workspace_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    config.merge(Config::load_or_default(workspace_path));

    config
}

/// Get the global quay config directory (~/.quay).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".quay"))
}

/// Get the global config path (~/.quay/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the workspace config path (.quay/config.toml).
pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".quay").join("config.toml")
}
