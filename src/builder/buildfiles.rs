//! Persisted build-outputs record.
//!
//! After a successful build the absolute paths of the produced artifacts
//! are written, one per line, to `<target>/buildfiles`. A record that
//! names a file which no longer exists is deleted on read and reported as
//! absent, so the next build regenerates both.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::fs::{normalize_path, write_string};

/// File name of the record inside the target directory.
pub const BUILDFILES: &str = "buildfiles";

#[derive(Debug, Clone)]
pub struct BuildFilesRecord {
    path: PathBuf,
}

impl BuildFilesRecord {
    pub fn new(target_dir: &Path) -> Self {
        BuildFilesRecord {
            path: target_dir.join(BUILDFILES),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the record.
    ///
    /// Returns `Ok(None)` when there is no record, or when the record was
    /// dangling and has been deleted.
    pub fn load(&self) -> Result<Option<Vec<PathBuf>>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read build record: {}", self.path.display())
                })
            }
        };

        let files: Vec<PathBuf> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect();

        if let Some(missing) = files.iter().find(|f| !f.is_file()) {
            tracing::debug!(
                "build record {} names missing file {}, discarding it",
                self.path.display(),
                missing.display()
            );
            self.clear()?;
            return Ok(None);
        }

        Ok(Some(files))
    }

    /// Write the record with absolute paths.
    pub fn save(&self, files: &[PathBuf]) -> Result<()> {
        let mut content = String::new();
        for file in files {
            content.push_str(&normalize_path(file).display().to_string());
            content.push('\n');
        }
        write_string(&self.path, &content)
    }

    /// Delete the record if present.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("failed to delete build record: {}", self.path.display())
            }),
        }
    }
}
