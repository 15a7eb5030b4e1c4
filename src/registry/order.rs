//! Priority order of the frozen catalog
//!
//! Ordering constraints become edges of a dependency graph: an edge `y -> x`
//! means `x` must come after `y`. Besides the explicit `before`/`after` names
//! every supertype entry is placed after each of its subtype entries, so a
//! first-match scan of the frozen order finds the most specific entry.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::warn;

use crate::core::TypeHierarchy;
use crate::errors::{RegistrationIssue, RegistryError, UnresolvedEntry};
use crate::registry::entry::TypeEntry;

/// Result of ordering: entry indices in priority order plus the constraints
/// that had to be dropped.
#[derive(Debug)]
pub(crate) struct Ordering {
    pub order: Vec<usize>,
    pub dropped: Vec<RegistrationIssue>,
}

pub(crate) fn resolve_order(
    entries: &[TypeEntry],
    hierarchy: &TypeHierarchy,
    warn_unresolved: bool,
) -> Result<Ordering, RegistryError> {
    let by_name: HashMap<&str, usize> = entries
        .iter()
        .enumerate()
        .map(|(idx, e)| (e.code_name(), idx))
        .collect();

    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(entries.len(), entries.len());
    let nodes: Vec<NodeIndex> = (0..entries.len()).map(|idx| graph.add_node(idx)).collect();
    let mut dropped = Vec::new();

    for (idx, entry) in entries.iter().enumerate() {
        let mut missing = Vec::new();

        for name in entry.after_names() {
            match by_name.get(name.as_str()) {
                Some(&dep) => {
                    graph.update_edge(nodes[dep], nodes[idx], ());
                }
                None => missing.push(name.clone()),
            }
        }
        for name in entry.before_names() {
            match by_name.get(name.as_str()) {
                Some(&dependent) => {
                    graph.update_edge(nodes[idx], nodes[dependent], ());
                }
                None => missing.push(name.clone()),
            }
        }

        if !missing.is_empty() {
            if warn_unresolved {
                warn!(
                    "{} dependency/ies could not be resolved for '{}': {}",
                    missing.len(),
                    entry.code_name(),
                    missing.join(", ")
                );
            }
            dropped.push(RegistrationIssue::UnresolvedDependency {
                code_name: entry.code_name().to_string(),
                missing,
            });
        }
    }

    for (sup_idx, sup) in entries.iter().enumerate() {
        for (sub_idx, sub) in entries.iter().enumerate() {
            if hierarchy.is_strict_subtype(sub.native(), sup.native()) {
                graph.update_edge(nodes[sub_idx], nodes[sup_idx], ());
            }
        }
    }

    let mut pending: Vec<usize> = nodes
        .iter()
        .map(|&n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut emitted = vec![false; entries.len()];
    let mut order = Vec::with_capacity(entries.len());

    // Each pass walks the remaining entries in registration order; an entry
    // freed earlier in a pass can already be emitted later in the same pass.
    loop {
        let mut progress = false;
        for idx in 0..entries.len() {
            if emitted[idx] || pending[idx] != 0 {
                continue;
            }
            emitted[idx] = true;
            order.push(idx);
            progress = true;
            for dependent in graph.neighbors_directed(nodes[idx], Direction::Outgoing) {
                pending[graph[dependent]] -= 1;
            }
        }
        if !progress || order.len() == entries.len() {
            break;
        }
    }

    if order.len() < entries.len() {
        return Err(cycle_error(entries, &graph, &nodes, &emitted));
    }

    Ok(Ordering { order, dropped })
}

fn cycle_error(
    entries: &[TypeEntry],
    graph: &DiGraph<usize, ()>,
    nodes: &[NodeIndex],
    emitted: &[bool],
) -> RegistryError {
    let unresolved = (0..entries.len())
        .filter(|&idx| !emitted[idx])
        .map(|idx| {
            let mut deps: Vec<usize> = graph
                .neighbors_directed(nodes[idx], Direction::Incoming)
                .map(|n| graph[n])
                .filter(|&dep| !emitted[dep])
                .collect();
            deps.sort_unstable();
            UnresolvedEntry {
                code_name: entries[idx].code_name().to_string(),
                pending_after: deps
                    .into_iter()
                    .map(|dep| entries[dep].code_name().to_string())
                    .collect(),
            }
        })
        .collect();

    let cycles = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut members: Vec<usize> = scc.into_iter().map(|n| graph[n]).collect();
            members.sort_unstable();
            members
                .into_iter()
                .map(|idx| entries[idx].code_name().to_string())
                .collect()
        })
        .collect();

    RegistryError::CircularDependency { unresolved, cycles }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HierarchyBuilder, TypeKey};

    fn names(entries: &[TypeEntry], order: &[usize]) -> Vec<String> {
        order
            .iter()
            .map(|&i| entries[i].code_name().to_string())
            .collect()
    }

    #[test]
    fn test_subtypes_sort_first() {
        let mut b = HierarchyBuilder::new();
        let object = b.declare("Object", &[]).unwrap();
        let entity = b.declare("Entity", &[object]).unwrap();
        let player = b.declare("Player", &[entity]).unwrap();
        let h = b.build();

        let entries = vec![
            TypeEntry::new("object", object),
            TypeEntry::new("entity", entity),
            TypeEntry::new("player", player),
        ];
        let ordering = resolve_order(&entries, &h, true).unwrap();
        assert_eq!(names(&entries, &ordering.order), ["player", "entity", "object"]);
    }

    #[test]
    fn test_explicit_constraints() {
        let mut b = HierarchyBuilder::new();
        let keys: Vec<TypeKey> = ["A", "B", "C"]
            .iter()
            .map(|n| b.declare(*n, &[]).unwrap())
            .collect();
        let h = b.build();

        let entries = vec![
            TypeEntry::new("a", keys[0]).with_after(["c"]),
            TypeEntry::new("b", keys[1]),
            TypeEntry::new("c", keys[2]).with_after(["b"]),
        ];
        let ordering = resolve_order(&entries, &h, true).unwrap();
        assert_eq!(names(&entries, &ordering.order), ["b", "c", "a"]);

        let entries = vec![
            TypeEntry::new("a", keys[0]),
            TypeEntry::new("b", keys[1]).with_before(["a"]),
        ];
        let ordering = resolve_order(&entries, &h, true).unwrap();
        assert_eq!(names(&entries, &ordering.order), ["b", "a"]);
    }

    #[test]
    fn test_unknown_constraint_dropped() {
        let mut b = HierarchyBuilder::new();
        let a = b.declare("A", &[]).unwrap();
        let h = b.build();

        let entries = vec![TypeEntry::new("a", a).with_after(["ghost"]).with_before(["phantom"])];
        let ordering = resolve_order(&entries, &h, false).unwrap();
        assert_eq!(ordering.order, vec![0]);
        assert_eq!(
            ordering.dropped,
            vec![RegistrationIssue::UnresolvedDependency {
                code_name: "a".to_string(),
                missing: vec!["ghost".to_string(), "phantom".to_string()],
            }]
        );
    }

    #[test]
    fn test_cycle_reports_members() {
        let mut b = HierarchyBuilder::new();
        let keys: Vec<TypeKey> = ["A", "B", "C", "D"]
            .iter()
            .map(|n| b.declare(*n, &[]).unwrap())
            .collect();
        let h = b.build();

        let entries = vec![
            TypeEntry::new("a", keys[0]).with_after(["c"]),
            TypeEntry::new("b", keys[1]).with_after(["a"]),
            TypeEntry::new("c", keys[2]).with_after(["b"]),
            TypeEntry::new("d", keys[3]),
        ];
        let err = resolve_order(&entries, &h, true).unwrap_err();
        assert_eq!(err.unresolved_names(), vec!["a", "b", "c"]);
        match err {
            RegistryError::CircularDependency { unresolved, cycles } => {
                assert_eq!(unresolved[0].pending_after, vec!["c".to_string()]);
                assert_eq!(cycles, vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_cycle() {
        let mut b = HierarchyBuilder::new();
        let a = b.declare("A", &[]).unwrap();
        let h = b.build();

        let entries = vec![TypeEntry::new("a", a).with_after(["a"])];
        let err = resolve_order(&entries, &h, true).unwrap_err();
        assert_eq!(err.unresolved_names(), vec!["a"]);
    }
}
