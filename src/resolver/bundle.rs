//! Bundle resolver - pick one artifact for a name and version range.
//!
//! Candidates come from every registered repository, in registration
//! order, plus the deliverables of workspace projects. Repository failures
//! never abort resolution; they are reported and the repository is skipped.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::container::{Container, ContainerKind};
use crate::core::project::Project;
use crate::core::version::{RangeToken, Strategy, Version, VersionRange};
use crate::core::workspace::Workspace;
use crate::sources::source::{Fetched, RepositorySource};
use crate::util::diagnostic::{suggestions, Reporter};

/// Who offers a candidate version.
enum Provider {
    Remote(Arc<dyn RepositorySource>),
    /// A repository that cannot list versions but answered a direct probe
    Probed(Fetched),
    Local(Arc<Project>),
}

/// Resolves single entries on behalf of one requesting project.
pub struct BundleResolver<'a> {
    workspace: &'a Workspace,
    requester: &'a str,
}

impl<'a> BundleResolver<'a> {
    pub fn new(workspace: &'a Workspace, requester: &'a str) -> Self {
        BundleResolver {
            workspace,
            requester,
        }
    }

    /// Resolve `bsn` within `range` (a version range or range token).
    ///
    /// Returns `None` only for the `project` and `snapshot` tokens when no
    /// workspace project provides `bsn`; every other failure is an ERROR
    /// container.
    pub fn resolve(
        &self,
        bsn: &str,
        range: Option<&str>,
        strategy: Strategy,
        attrs: &BTreeMap<String, String>,
        reporter: &mut Reporter,
    ) -> Option<Container> {
        let range = range.map(str::trim).filter(|r| !r.is_empty()).unwrap_or("0");
        let token = RangeToken::parse(range);

        if matches!(token, Some(RangeToken::Project) | Some(RangeToken::Snapshot)) {
            return self.from_project(bsn, token, attrs);
        }

        let mut strategy = strategy;
        if token == Some(RangeToken::Latest) {
            if let Some(container) = self.from_project(bsn, token, attrs) {
                return Some(container);
            }
            strategy = Strategy::Highest;
        }

        let strategy = override_strategy(attrs, strategy, reporter);
        let repositories = self.workspace.repositories();

        if strategy == Strategy::Exact {
            let version = match Version::parse(range) {
                Ok(v) => v,
                Err(_) => {
                    return Some(self.failed(
                        bsn,
                        range,
                        format!("{};version={} Invalid version", bsn, range),
                        attrs,
                    ))
                }
            };

            for repo in repositories {
                match repo.get(bsn, &version, attrs) {
                    Ok(Some(fetched)) => {
                        tracing::debug!("{} {} taken from {}", bsn, version, repo.name());
                        return Some(to_container(bsn, &version.to_string(), attrs, fetched));
                    }
                    Ok(None) => {}
                    Err(e) => reporter.warning(format!(
                        "repository `{}` failed to get {} {}: {:#}",
                        repo.name(),
                        bsn,
                        version,
                        e
                    )),
                }
            }
        } else {
            let version_range = if token == Some(RangeToken::Latest) {
                VersionRange::any()
            } else {
                match VersionRange::parse(range) {
                    Ok(r) => r,
                    Err(e) => return Some(self.failed(bsn, range, e.to_string(), attrs)),
                }
            };
            let concrete = Version::parse(range).ok();

            let mut candidates: BTreeMap<Version, Provider> = BTreeMap::new();

            for repo in repositories {
                match repo.versions(bsn) {
                    Ok(Some(versions)) => {
                        for v in versions {
                            if version_range.includes(&v) {
                                candidates
                                    .entry(v)
                                    .or_insert_with(|| Provider::Remote(repo.clone()));
                            }
                        }
                    }
                    Ok(None) => {
                        let Some(v) = &concrete else { continue };
                        if candidates.contains_key(v) {
                            continue;
                        }
                        match repo.get(bsn, v, attrs) {
                            Ok(Some(fetched)) => {
                                candidates.insert(v.clone(), Provider::Probed(fetched));
                            }
                            Ok(None) => {}
                            Err(e) => reporter.warning(format!(
                                "repository `{}` failed to probe {} {}: {:#}",
                                repo.name(),
                                bsn,
                                v,
                                e
                            )),
                        }
                    }
                    Err(e) => reporter.warning(format!(
                        "repository `{}` failed to list versions of {}: {:#}",
                        repo.name(),
                        bsn,
                        e
                    )),
                }
            }

            for (v, project) in self.workspace.local_providers(bsn) {
                if version_range.includes(&v) {
                    candidates.entry(v).or_insert(Provider::Local(project));
                }
            }

            let picked = match strategy {
                Strategy::Lowest => candidates.pop_first(),
                _ => candidates.pop_last(),
            };

            if let Some((version, provider)) = picked {
                tracing::debug!("{};version={} -> {} ({})", bsn, range, version, strategy);
                match provider {
                    Provider::Local(project) => {
                        if let Some(container) = project.deliverable(bsn, attrs) {
                            return Some(container);
                        }
                    }
                    Provider::Probed(fetched) => {
                        return Some(to_container(bsn, &version.to_string(), attrs, fetched));
                    }
                    Provider::Remote(repo) => match repo.get(bsn, &version, attrs) {
                        Ok(Some(fetched)) => {
                            return Some(to_container(bsn, &version.to_string(), attrs, fetched))
                        }
                        Ok(None) => reporter.warning(format!(
                            "repository `{}` lists {} {} but could not provide it",
                            repo.name(),
                            bsn,
                            version
                        )),
                        Err(e) => reporter.warning(format!(
                            "repository `{}` failed to get {} {}: {:#}",
                            repo.name(),
                            bsn,
                            version,
                            e
                        )),
                    },
                }
            }
        }

        if token != Some(RangeToken::Latest) && self.find_project(bsn).is_some() {
            return Some(
                self.failed(
                bsn,
                range,
                format!(
                    "{bsn};version={range} not found because latest was not specified. \
                     It is, however, present in the workspace. \
                     Add '{bsn};version=(latest|snapshot)' to see the bundle in the workspace."
                    ),
                    attrs,
                )
                .with_hint(suggestions::USE_LATEST),
            );
        }

        let names: Vec<&str> = repositories.iter().map(|r| r.name()).collect();
        Some(
            self.failed(
                bsn,
                range,
                format!(
                    "{};version={} not found in repositories [{}]",
                    bsn,
                    range,
                    names.join(", ")
                ),
                attrs,
            )
            .with_hint(suggestions::LIST_REPOS),
        )
    }

    /// Resolve against a workspace project.
    ///
    /// The project whose name equals `bsn` is preferred; otherwise trailing
    /// dot-separated segments are dropped until a valid project matches.
    /// The `project` token yields the project's output directory, the other
    /// tokens its packaged deliverable.
    pub fn from_project(
        &self,
        bsn: &str,
        token: Option<RangeToken>,
        attrs: &BTreeMap<String, String>,
    ) -> Option<Container> {
        let project = self.find_project(bsn)?;
        match token {
            Some(RangeToken::Project) => Some(Container::new(
                Some(project.name()),
                bsn,
                RangeToken::Project.as_str(),
                ContainerKind::Project,
                project.output_dir(),
                attrs.clone(),
            )),
            _ => project.deliverable(bsn, attrs),
        }
    }

    fn find_project(&self, bsn: &str) -> Option<Arc<Project>> {
        let mut name = bsn;
        loop {
            if let Some(project) = self.workspace.project(name) {
                if project.is_valid() {
                    return Some(project);
                }
            }
            match name.rfind('.') {
                Some(n) if n > 0 => name = &name[..n],
                _ => return None,
            }
        }
    }

    fn failed(
        &self,
        bsn: &str,
        range: &str,
        message: String,
        attrs: &BTreeMap<String, String>,
    ) -> Container {
        Container::failed(Some(self.requester), bsn, range, message, attrs.clone())
    }
}

/// Apply a `strategy` attribute; unknown values keep the current strategy.
fn override_strategy(
    attrs: &BTreeMap<String, String>,
    strategy: Strategy,
    reporter: &mut Reporter,
) -> Strategy {
    match attrs.get("strategy") {
        None => strategy,
        Some(value) => value.parse().unwrap_or_else(|e: String| {
            reporter.warning(e);
            strategy
        }),
    }
}

/// Wrap a fetched artifact. A file name ending in `lib` is a library.
fn to_container(
    bsn: &str,
    version: &str,
    attrs: &BTreeMap<String, String>,
    fetched: Fetched,
) -> Container {
    let is_library = fetched
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with("lib"));
    let kind = if is_library {
        ContainerKind::Library
    } else {
        ContainerKind::Repo
    };

    let container = Container::new(None, bsn, version, kind, fetched.path, attrs.clone());
    match fetched.blocker {
        Some(blocker) => container.with_blocker(blocker),
        None => container,
    }
}
