//! Project dependency graph.
//!
//! `traverse` computes a project's dependency closure in post-order.
//! `build_layers` orders a whole workspace into layers that can be built
//! in parallel, each layer depending only on earlier ones.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::core::project::{PrepareContext, Project};
use crate::resolver::errors::PrepareError;

/// Append `project` and everything it depends on to `out`, dependencies first.
///
/// Projects already in `visited` are skipped; cycles are reported by
/// `prepare` through the context trail, not here.
pub fn traverse(
    project: &Arc<Project>,
    ctx: &mut PrepareContext,
    visited: &mut HashSet<String>,
    out: &mut Vec<Arc<Project>>,
) -> Result<()> {
    if !visited.insert(project.name().to_string()) {
        return Ok(());
    }

    let paths = project.prepare_in(ctx)?;
    for dependency in &paths.dependson {
        traverse(dependency, ctx, visited, out)?;
    }

    out.push(project.clone());
    Ok(())
}

/// Group projects into dependency-ordered layers.
///
/// Every project of layer `n` depends only on projects of layers `< n`.
/// Within a layer projects keep the input order.
pub fn build_layers(projects: &[Arc<Project>]) -> Result<Vec<Vec<Arc<Project>>>> {
    let mut graph: DiGraph<Arc<Project>, ()> = DiGraph::new();
    let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

    for project in projects {
        let node = graph.add_node(project.clone());
        nodes.insert(project.name().to_string(), node);
    }

    for project in projects {
        let to = nodes[project.name()];
        let paths = project.prepare()?;
        for dependency in &paths.dependson {
            let Some(&from) = nodes.get(dependency.name()) else {
                continue;
            };
            if !graph.contains_edge(from, to) {
                graph.add_edge(from, to, ());
            }
        }
    }

    let order = match toposort(&graph, None) {
        Ok(order) => order,
        Err(cycle) => {
            let name = graph[cycle.node_id()].name().to_string();
            bail!(PrepareError::CircularDependency {
                trail: vec![name.clone(), name],
            });
        }
    };

    let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
    for node in &order {
        let d = graph
            .neighbors_directed(*node, petgraph::Direction::Incoming)
            .map(|dep| depth[&dep] + 1)
            .max()
            .unwrap_or(0);
        depth.insert(*node, d);
    }

    let layer_count = depth.values().copied().max().map_or(0, |d| d + 1);
    let mut layers: Vec<Vec<Arc<Project>>> = vec![Vec::new(); layer_count];
    for project in projects {
        let node = nodes[project.name()];
        layers[depth[&node]].push(project.clone());
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::WorkspaceFixture;

    fn names(projects: &[Arc<Project>]) -> Vec<String> {
        projects.iter().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn test_traverse_post_order_without_duplicates() {
        let fx = WorkspaceFixture::new();
        fx.project("base", "");
        fx.project("left", "[paths]\ndependson = \"base\"\n");
        fx.project("right", "[paths]\ndependson = \"base\"\n");
        fx.project("top", "[paths]\ndependson = \"left, right\"\n");
        let ws = fx.open();

        let top = ws.project("top").unwrap();
        let mut ctx = PrepareContext::new();
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        traverse(&top, &mut ctx, &mut visited, &mut out).unwrap();

        assert_eq!(names(&out), vec!["base", "left", "right", "top"]);
        assert!(ctx.trail().is_empty());
    }

    #[test]
    fn test_layers() {
        let fx = WorkspaceFixture::new();
        fx.project("base", "");
        fx.project("left", "[paths]\ndependson = \"base\"\n");
        fx.project("right", "[paths]\ndependson = \"base\"\n");
        fx.project("top", "[paths]\ndependson = \"left, right\"\n");
        fx.project("solo", "");
        let ws = fx.open();

        let layers = build_layers(&ws.projects()).unwrap();
        let layers: Vec<_> = layers.iter().map(|l| names(l)).collect();
        assert_eq!(
            layers,
            vec![
                vec!["base".to_string(), "solo".to_string()],
                vec!["left".to_string(), "right".to_string()],
                vec!["top".to_string()],
            ]
        );
    }
}
