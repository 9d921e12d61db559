//! Path builder - turn a declaration list into an ordered container list.
//!
//! Building resolves every entry, expands libraries and drops duplicate
//! containers while keeping declaration order. Partitioning then routes the
//! survivors onto the regular path, the boot path and the set of referenced
//! projects.

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::container::{Container, ContainerKind};
use crate::core::manifest::PathKind;
use crate::core::project::Project;
use crate::core::version::{RangeToken, Strategy};
use crate::core::workspace::Workspace;
use crate::resolver::bundle::BundleResolver;
use crate::resolver::declaration::{self, Declaration};
use crate::util::diagnostic::{Diagnostic, Reporter};

/// Library files may include other libraries up to this depth.
pub const MAX_LIBRARY_DEPTH: usize = 8;

/// Prefix of execution-environment names that belong on the boot path.
pub const BOOT_PREFIX: &str = "ee.";

/// Default selection strategy for a path.
pub fn default_strategy(kind: PathKind) -> Strategy {
    match kind {
        PathKind::Buildpath => Strategy::Lowest,
        _ => Strategy::Highest,
    }
}

/// Builds paths for one requesting project.
pub struct PathBuilder<'a> {
    workspace: &'a Workspace,
    project: &'a Project,
    reporter: &'a mut Reporter,
    depth: usize,
}

impl<'a> PathBuilder<'a> {
    pub fn new(workspace: &'a Workspace, project: &'a Project, reporter: &'a mut Reporter) -> Self {
        PathBuilder {
            workspace,
            project,
            reporter,
            depth: 0,
        }
    }

    /// Resolve a declaration list.
    ///
    /// `source` names the path being built and only appears in diagnostics.
    pub fn build(&mut self, spec: &str, strategy: Strategy, source: &str) -> Vec<Container> {
        let declarations = match declaration::parse(spec) {
            Ok(d) => d,
            Err(e) => {
                self.reporter.report(
                    Diagnostic::error(format!("invalid {} declaration: {}", source, e))
                        .with_context(format!("in project `{}`", self.project.name())),
                );
                return Vec::new();
            }
        };

        let mut result: Vec<Container> = Vec::new();

        for decl in &declarations {
            let Some(found) = self.entry(decl, strategy, source) else {
                continue;
            };

            for member in found.members() {
                if member.is_error() {
                    self.reporter.warning(format!(
                        "cannot find {}: {}",
                        member,
                        member.error().unwrap_or_default()
                    ));
                    result.push(member.clone());
                } else if result.contains(member) {
                    self.reporter.warning(format!(
                        "{} appears more than once on the {} of `{}`, dropped duplicate",
                        member,
                        source,
                        self.project.name()
                    ));
                } else {
                    result.push(member.clone());
                }
            }
        }

        result
    }

    /// Resolve one declaration; `None` means the entry is skipped.
    fn entry(&mut self, decl: &Declaration, strategy: Strategy, source: &str) -> Option<Container> {
        let bsn = decl.name();
        let version = decl.version();
        let token = version.and_then(RangeToken::parse);

        let found = if token == Some(RangeToken::File) {
            Some(self.file_container(bsn, &decl.attrs))
        } else {
            BundleResolver::new(self.workspace, self.project.name()).resolve(
                bsn,
                version,
                strategy,
                &decl.attrs,
                self.reporter,
            )
        };

        match found {
            Some(container) if container.kind() == ContainerKind::Library => {
                Some(self.expand_library(container, source))
            }
            Some(container) => Some(container),
            None if token == Some(RangeToken::Project) => {
                self.reporter.warning(format!(
                    "no such project `{}` (referenced from the {} of `{}`)",
                    bsn,
                    source,
                    self.project.name()
                ));
                None
            }
            None => {
                let version = version.unwrap_or("0");
                Some(Container::failed(
                    Some(self.project.name()),
                    bsn,
                    version,
                    format!("{};version={} not found", bsn, version),
                    decl.attrs.clone(),
                ))
            }
        }
    }

    /// A `version=file` entry: a path relative to the requesting project.
    fn file_container(&self, bsn: &str, attrs: &BTreeMap<String, String>) -> Container {
        let path = self.project.base().join(bsn);
        if !path.is_file() {
            return Container::failed(
                Some(self.project.name()),
                bsn,
                RangeToken::File.as_str(),
                format!("File does not exist: {}", path.display()),
                attrs.clone(),
            );
        }

        let kind = if is_library_file(&path) {
            ContainerKind::Library
        } else {
            ContainerKind::External
        };
        Container::new(
            Some(self.project.name()),
            bsn,
            RangeToken::File.as_str(),
            kind,
            path,
            attrs.clone(),
        )
    }

    /// Read a library file and attach its resolved members.
    fn expand_library(&mut self, library: Container, source: &str) -> Container {
        fn fail(library: &Container, message: String) -> Container {
            Container::failed(
                library.project(),
                library.bsn(),
                library.version(),
                message,
                library.attributes().clone(),
            )
        }

        if self.depth >= MAX_LIBRARY_DEPTH {
            let message = format!(
                "{} nests libraries deeper than {} levels",
                library, MAX_LIBRARY_DEPTH
            );
            return fail(&library, message);
        }

        let Some(file) = library.file().map(Path::to_path_buf) else {
            return library;
        };
        let content = match std::fs::read_to_string(&file) {
            Ok(c) => c,
            Err(e) => {
                let message = format!("cannot read library {}: {}", file.display(), e);
                return fail(&library, message);
            }
        };

        self.depth += 1;
        let mut members: Vec<Container> = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            for member in self.build(line, Strategy::Highest, source) {
                if member.is_error() || !members.contains(&member) {
                    members.push(member);
                }
            }
        }
        self.depth -= 1;

        library.with_members(members)
    }
}

fn is_library_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "lib")
}

/// A built path split by destination.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub path: Vec<Container>,
    pub boot: Vec<Container>,
    /// Names of referenced workspace projects, first-seen order
    pub projects: Vec<String>,
    /// ERROR containers, kept off every path
    pub errors: Vec<Container>,
}

/// Options for [`partition`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionOptions {
    /// Route boot entries to the boot path
    pub route_boot: bool,
    /// Reject raw project output directories
    pub no_project: bool,
}

/// Whether a container belongs on the boot path.
pub fn is_boot(container: &Container) -> bool {
    container.bsn().starts_with(BOOT_PREFIX)
        || container
            .attribute("boot")
            .is_some_and(|v| !v.eq_ignore_ascii_case("false"))
}

/// Route built containers onto their paths.
pub fn partition(
    containers: Vec<Container>,
    options: PartitionOptions,
    source: &str,
    reporter: &mut Reporter,
) -> Partition {
    let mut out = Partition::default();

    for container in containers {
        if container.is_error() {
            let mut diagnostic = Diagnostic::error(format!("cannot find {}", container))
                .with_context(container.error().unwrap_or_default().to_string())
                .with_context(format!("on the {}", source));
            if let Some(hint) = container.hint() {
                diagnostic = diagnostic.with_suggestion(hint);
            }
            reporter.report(diagnostic);
            out.errors.push(container);
            continue;
        }

        if container.kind() == ContainerKind::Project {
            if let Some(name) = container.project() {
                if !out.projects.iter().any(|p| p == name) {
                    out.projects.push(name.to_string());
                }
            }
            if options.no_project && container.version() == RangeToken::Project.as_str() {
                reporter.error(format!(
                    "{} is a project output directory and cannot be used on the {}; \
                     use version=snapshot or version=latest for the packaged artifact",
                    container, source
                ));
                continue;
            }
        }

        if options.route_boot && is_boot(&container) {
            out.boot.push(container);
        } else {
            out.path.push(container);
        }
    }

    out
}
