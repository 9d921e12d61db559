//! Structural errors raised while preparing a project.
//!
//! Per-entry resolution failures are not errors here; they become ERROR
//! containers and diagnostics. These variants abort the current
//! `prepare()` or `build()` call.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("circular dependency: {}", trail.join(" -> "))]
    CircularDependency {
        /// Projects being prepared, outermost first, ending with the re-entered one
        trail: Vec<String>,
    },

    #[error("project `{name}` is invalid: {reason}")]
    InvalidProject { name: String, reason: String },

    #[error("failed to create {role} directory `{}`", path.display())]
    CreateDirectory {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("project `{name}` is locked by another operation (waited {}s)", waited.as_secs())]
    Locked { name: String, waited: Duration },

    #[error("failed to load manifest for `{name}`: {message}")]
    Manifest { name: String, message: String },
}

impl PrepareError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            PrepareError::CircularDependency { trail } => {
                let mut diag = Diagnostic::error("circular dependency between projects");
                for pair in trail.windows(2) {
                    diag = diag.with_context(format!("`{}` depends on `{}`", pair[0], pair[1]));
                }
                diag.with_suggestion(suggestions::BREAK_CYCLE)
            }
            PrepareError::CreateDirectory { path, source, .. } => {
                Diagnostic::error(self.to_string())
                    .with_location(path)
                    .with_context(source.to_string())
            }
            PrepareError::Locked { .. } => Diagnostic::error(self.to_string())
                .with_suggestion("raise `lock-timeout-secs` in the workspace manifest"),
            _ => Diagnostic::error(self.to_string()),
        }
    }
}
