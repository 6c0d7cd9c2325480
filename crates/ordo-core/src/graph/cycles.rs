//! Ordering-cycle detection over the expanded relationship graph.
//!
//! # Overview
//!
//! A cycle among ordering edges makes a catalog unschedulable: every
//! resource in the loop waits on another. Detection runs once, after
//! containment expansion and before any resource is evaluated.
//!
//! Each strongly connected component with more than one resource (or a
//! single resource with a self-edge) becomes one [`CycleReport`] carrying
//! the sorted members and one concrete closed path through them.
//!
//! # Complexity
//!
//! O(V+E) for Tarjan's SCC pass, plus a BFS bounded by each component's
//! size to recover a path.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::NodeIndex;
use serde::Serialize;
use tracing::instrument;

use crate::model::{ResourceId, ResourceRef};

use super::build::RelationshipGraph;

// ---------------------------------------------------------------------------
// CycleReport
// ---------------------------------------------------------------------------

/// One ordering cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Every resource in the strongly connected component, sorted.
    pub members: Vec<ResourceRef>,
    /// A closed walk through the cycle: `[A, B, C, A]`.
    pub path: Vec<ResourceRef>,
}

impl CycleReport {
    /// Number of distinct resources on the reported path.
    pub fn cycle_len(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Returns `true` if a resource orders itself.
    pub fn is_self_loop(&self) -> bool {
        self.cycle_len() == 1
    }

    /// Returns `true` for a two-resource cycle (`A → B → A`).
    pub fn is_mutual(&self) -> bool {
        self.cycle_len() == 2
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_self_loop() {
            write!(f, "{} depends on itself", self.path[0])
        } else if self.is_mutual() {
            write!(
                f,
                "{} and {} depend on each other",
                self.path[0], self.path[1]
            )
        } else {
            let path: Vec<String> = self.path.iter().map(ToString::to_string).collect();
            write!(f, "{} resources in a loop: {}", self.cycle_len(), path.join(" → "))?;
            if self.members.len() > self.cycle_len() {
                write!(f, " ({} resources in the component)", self.members.len())?;
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Returns `true` if the ordering edges of `graph` admit a topological order.
pub fn is_acyclic(graph: &RelationshipGraph) -> bool {
    !is_cyclic_directed(graph.inner())
}

/// Find every ordering cycle in `graph`.
///
/// Reports are sorted by their member lists, so the output is deterministic
/// for a given edge set.
#[instrument(skip_all, fields(nodes = graph.node_count(), edges = graph.edge_count()))]
pub fn find_cycles(graph: &RelationshipGraph) -> Vec<CycleReport> {
    let inner = graph.inner();

    let mut reports: Vec<CycleReport> = tarjan_scc(inner)
        .into_iter()
        .filter(|component| {
            component.len() > 1
                || component
                    .first()
                    .is_some_and(|&node| inner.contains_edge(node, node))
        })
        .filter_map(|component| {
            let ids: Vec<ResourceId> = component.iter().map(|&node| inner[node]).collect();
            let path = closed_path(graph, &component)?;

            let mut members: Vec<ResourceRef> =
                ids.iter().filter_map(|&id| graph.name(id).cloned()).collect();
            members.sort_unstable();

            Some(CycleReport {
                members,
                path: path
                    .into_iter()
                    .filter_map(|id| graph.name(id).cloned())
                    .collect(),
            })
        })
        .collect();

    reports.sort_unstable_by(|a, b| a.members.cmp(&b.members));

    for report in &reports {
        tracing::warn!(cycle = %report, "ordering cycle");
    }
    reports
}

/// Shortest closed walk through the earliest-declared member of `component`.
fn closed_path(graph: &RelationshipGraph, component: &[NodeIndex]) -> Option<Vec<ResourceId>> {
    let inner = graph.inner();
    let start = component.iter().copied().min_by_key(|&node| inner[node])?;

    if inner.contains_edge(start, start) {
        return Some(vec![inner[start], inner[start]]);
    }

    let members: HashSet<NodeIndex> = component.iter().copied().collect();
    let mut queue: VecDeque<NodeIndex> = VecDeque::from([start]);
    let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    while let Some(current) = queue.pop_front() {
        let mut next: Vec<NodeIndex> = inner
            .neighbors(current)
            .filter(|n| members.contains(n))
            .collect();
        next.sort_unstable();

        for neighbor in next {
            if neighbor == start {
                let mut path = vec![inner[start]];
                let mut cursor = current;
                let mut reversed = Vec::new();
                while cursor != start {
                    reversed.push(inner[cursor]);
                    cursor = *parent.get(&cursor)?;
                }
                path.extend(reversed.into_iter().rev());
                path.push(inner[start]);
                return Some(path);
            }
            if visited.insert(neighbor) {
                parent.insert(neighbor, current);
                queue.push_back(neighbor);
            }
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Catalog, RelationKind, ResourceDecl};

    fn r(raw: &str) -> ResourceRef {
        ResourceRef::parse(raw).expect("valid ref")
    }

    fn graph(decls: Vec<ResourceDecl>) -> RelationshipGraph {
        let mut catalog = Catalog::new();
        for decl in decls {
            catalog.add_resource(decl).expect("add resource");
        }
        RelationshipGraph::build(&catalog).expect("build")
    }

    #[test]
    fn acyclic_graph_has_no_reports() {
        let g = graph(vec![
            ResourceDecl::new(r("Notify[a]")).before(r("Notify[b]")),
            ResourceDecl::new(r("Notify[b]")).before(r("Notify[c]")),
            ResourceDecl::new(r("Notify[c]")),
        ]);
        assert!(is_acyclic(&g));
        assert!(find_cycles(&g).is_empty());
    }

    #[test]
    fn mutual_before_is_reported() {
        let g = graph(vec![
            ResourceDecl::new(r("Notify[a]")).before(r("Notify[b]")),
            ResourceDecl::new(r("Notify[b]")).before(r("Notify[a]")),
        ]);
        assert!(!is_acyclic(&g));

        let reports = find_cycles(&g);
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.members, vec![r("Notify[a]"), r("Notify[b]")]);
        assert_eq!(report.path, vec![r("Notify[a]"), r("Notify[b]"), r("Notify[a]")]);
        assert!(report.is_mutual());
        assert_eq!(
            report.to_string(),
            "Notify[a] and Notify[b] depend on each other"
        );
    }

    #[test]
    fn self_relationship_is_a_one_node_cycle() {
        let g = graph(vec![ResourceDecl::new(r("Notify[a]")).require(r("Notify[a]"))]);
        let reports = find_cycles(&g);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_self_loop());
        assert_eq!(reports[0].to_string(), "Notify[a] depends on itself");
    }

    #[test]
    fn three_node_loop_reports_concrete_path() {
        let g = graph(vec![
            ResourceDecl::new(r("Notify[a]")).before(r("Notify[b]")),
            ResourceDecl::new(r("Notify[b]")).before(r("Notify[c]")),
            ResourceDecl::new(r("Notify[c]")).before(r("Notify[a]")),
            ResourceDecl::new(r("Notify[free]")),
        ]);
        let reports = find_cycles(&g);
        assert_eq!(reports.len(), 1);
        assert_eq!(
            reports[0].path,
            vec![r("Notify[a]"), r("Notify[b]"), r("Notify[c]"), r("Notify[a]")]
        );
        assert_eq!(
            reports[0].to_string(),
            "3 resources in a loop: Notify[a] → Notify[b] → Notify[c] → Notify[a]"
        );
    }

    #[test]
    fn disjoint_cycles_are_reported_separately_and_sorted() {
        let mut catalog = Catalog::new();
        for name in ["Notify[x]", "Notify[y]", "Notify[a]", "Notify[b]"] {
            catalog.add_resource(ResourceDecl::new(r(name))).expect("add");
        }
        catalog.add_relationship(r("Notify[x]"), RelationKind::Before, r("Notify[y]"));
        catalog.add_relationship(r("Notify[y]"), RelationKind::Before, r("Notify[x]"));
        catalog.add_relationship(r("Notify[a]"), RelationKind::Notify, r("Notify[b]"));
        catalog.add_relationship(r("Notify[a]"), RelationKind::Subscribe, r("Notify[b]"));
        let g = RelationshipGraph::build(&catalog).expect("build");

        let reports = find_cycles(&g);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].members[0], r("Notify[a]"));
        assert_eq!(reports[1].members[0], r("Notify[x]"));
    }
}
