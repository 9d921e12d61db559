//! Global context for Quay operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::manifest::{is_workspace_root, ManifestError, MANIFEST_NAME};
use crate::util::config::{self, Config};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global Quay data (~/.quay/)
    home: PathBuf,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,

    /// Forced offline mode from the command line
    offline: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::at(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let cwd = if cwd.is_absolute() {
            cwd
        } else {
            std::env::current_dir()
                .context("failed to get current directory")?
                .join(cwd)
        };
        Ok(Self::at(cwd))
    }

    fn at(cwd: PathBuf) -> Self {
        let home = config::global_config_dir().unwrap_or_else(|| PathBuf::from(".quay"));
        GlobalContext {
            cwd,
            home,
            verbose: false,
            color: true,
            offline: false,
        }
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the Quay home directory (~/.quay/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if color output is enabled.
    pub fn color(&self) -> bool {
        self.color
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Load the merged global and workspace configuration for `root`.
    pub fn load_config(&self, root: &Path) -> Config {
        let global = self.config_path();
        let mut config = config::load_config(Some(&global), &config::workspace_config_path(root));
        if self.offline {
            config.workspace.offline = Some(true);
        }
        config
    }

    /// Find the workspace manifest starting from cwd and searching upward.
    ///
    /// Project manifests are passed over, so running inside a project
    /// directory finds the enclosing workspace.
    pub fn find_manifest(&self) -> Result<PathBuf, ManifestError> {
        let mut current = self.cwd.clone();
        loop {
            if is_workspace_root(&current) {
                return Ok(current.join(MANIFEST_NAME));
            }
            if !current.pop() {
                return Err(ManifestError::NotFound {
                    dir: self.cwd.clone(),
                });
            }
        }
    }

    /// Find the workspace root (directory containing the workspace manifest).
    pub fn find_workspace_root(&self) -> Result<PathBuf, ManifestError> {
        let manifest = self.find_manifest()?;
        Ok(manifest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cwd.clone()))
    }
}
