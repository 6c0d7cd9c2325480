//! Containment forest and relationship expansion through containers.
//!
//! # Overview
//!
//! A resource may name one container (`Class[Foo]` contains `Notify[foo]`).
//! The resulting parent links form a forest; a container's *content* is the
//! transitive set of resources whose container chain reaches it.
//!
//! Containment on its own orders nothing. It only matters once a container
//! takes part in a relationship:
//!
//! - `X → Container` expands to `X → c` for every `c` in the content.
//! - `Container → Y` expands to `c → Y` for every `c` in the content.
//!
//! Both rules apply together, so an edge between two containers expands to
//! the full cross product of their contents. Derived edges are always
//! ordering-only: a notification aimed at a container refreshes the
//! container, not each member.
//!
//! # Cycle prevention
//!
//! [`Containment::from_catalog`] rejects a container that (transitively)
//! contains itself before any expansion runs.
//!
//! # Complexity
//!
//! [`expand`] costs O(E · fan-out) where fan-out is the content size of the
//! containers at either end of a declared edge. Edges between two plain
//! resources are skipped outright, so a flat catalog expands in O(E).

#![allow(
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
)]

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::instrument;

use crate::error::CatalogError;
use crate::model::{Catalog, ResourceId, ResourceRef};

use super::build::{EdgeInsert, EdgeKind, EdgeOrigin, RelationshipGraph};

// ---------------------------------------------------------------------------
// Containment
// ---------------------------------------------------------------------------

/// The resolved containment forest of a catalog.
///
/// Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Containment {
    parent: Vec<Option<ResourceId>>,
    children: Vec<Vec<ResourceId>>,
}

impl Containment {
    /// Resolve every declared container into a parent link.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownContainer`] if a container name is not
    /// declared, or [`CatalogError::ContainmentCycle`] if following container
    /// links from some resource leads back to it.
    #[instrument(skip(catalog), fields(resources = catalog.len()))]
    pub fn from_catalog(catalog: &Catalog) -> Result<Self, CatalogError> {
        let mut parent = vec![None; catalog.len()];
        let mut children = vec![Vec::new(); catalog.len()];

        for resource in catalog.resources() {
            let Some(container) = resource.container() else {
                continue;
            };
            let container_id =
                catalog
                    .lookup(container)
                    .ok_or_else(|| CatalogError::UnknownContainer {
                        member: resource.name().clone(),
                        container: container.clone(),
                    })?;
            parent[resource.id().index()] = Some(container_id);
            children[container_id.index()].push(resource.id());
        }

        let containment = Self { parent, children };
        if let Some(cycle) = containment.find_cycle() {
            let members = cycle
                .into_iter()
                .filter_map(|id| catalog.get(id).map(|r| r.name().clone()))
                .collect();
            return Err(CatalogError::ContainmentCycle { members });
        }

        Ok(containment)
    }

    /// Walk every parent chain once; return the first loop found as a closed
    /// chain (`[a, b, a]`).
    fn find_cycle(&self) -> Option<Vec<ResourceId>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.parent.len()];

        for start in 0..self.parent.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }

            let mut path: Vec<usize> = Vec::new();
            let mut cursor = Some(start);
            while let Some(current) = cursor {
                match marks[current] {
                    Mark::Done => break,
                    Mark::OnPath => {
                        let pos = path.iter().position(|&p| p == current).unwrap_or(0);
                        let mut cycle: Vec<ResourceId> =
                            path[pos..].iter().map(|&i| ResourceId::from_index(i)).collect();
                        cycle.push(ResourceId::from_index(current));
                        return Some(cycle);
                    }
                    Mark::Unvisited => {
                        marks[current] = Mark::OnPath;
                        path.push(current);
                        cursor = self.parent[current].map(ResourceId::index);
                    }
                }
            }

            for idx in path {
                marks[idx] = Mark::Done;
            }
        }

        None
    }

    /// Direct container of `id`.
    pub fn parent(&self, id: ResourceId) -> Option<ResourceId> {
        self.parent.get(id.index()).copied().flatten()
    }

    /// Direct members of `id`, in catalog order.
    pub fn children(&self, id: ResourceId) -> &[ResourceId] {
        self.children.get(id.index()).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if `id` contains at least one resource.
    pub fn is_container(&self, id: ResourceId) -> bool {
        !self.children(id).is_empty()
    }

    /// Every resource transitively contained by `id` (breadth-first).
    pub fn descendants(&self, id: ResourceId) -> Vec<ResourceId> {
        let mut out = Vec::new();
        let mut queue: VecDeque<ResourceId> = self.children(id).iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            out.push(current);
            queue.extend(self.children(current).iter().copied());
        }
        out
    }

    /// Container chain of `id`, nearest first.
    pub fn ancestors(&self, id: ResourceId) -> Vec<ResourceId> {
        let mut out = Vec::new();
        let mut cursor = self.parent(id);
        while let Some(current) = cursor {
            out.push(current);
            cursor = self.parent(current);
        }
        out
    }

    /// Returns `true` if `member` is in the transitive content of `container`.
    pub fn contains(&self, container: ResourceId, member: ResourceId) -> bool {
        self.ancestors(member).contains(&container)
    }

    /// Number of resources that contain at least one other resource.
    pub fn container_count(&self) -> usize {
        self.children.iter().filter(|c| !c.is_empty()).count()
    }

    /// Names of the content of `container`, resolved through `catalog`.
    pub fn content_names<'a>(&self, catalog: &'a Catalog, container: ResourceId) -> Vec<&'a ResourceRef> {
        self.descendants(container)
            .into_iter()
            .filter_map(|id| catalog.get(id).map(|r| r.name()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

/// Counters reported by [`expand`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionStats {
    /// Declared edges examined.
    pub declared_edges: usize,
    /// New ordering edges added.
    pub derived_edges: usize,
    /// Distinct containers found at either end of a declared edge.
    pub containers_touched: usize,
}

/// Propagate every declared edge through the containers at its ends.
///
/// For each declared edge `(A, B)`, adds an ordering edge `(a, b)` for every
/// `a` in `{A} ∪ content(A)` and `b` in `{B} ∪ content(B)`. Self-pairs are
/// never added, and no derived edge links a container to its own content in
/// either direction. A declared edge between a container and one of its own
/// members is kept as declared.
///
/// Running `expand` twice adds nothing the second time.
#[instrument(skip_all)]
pub fn expand(graph: &mut RelationshipGraph, containment: &Containment) -> ExpansionStats {
    let declared = graph.edges_with_origin(EdgeOrigin::Declared);
    let mut content: HashMap<ResourceId, Vec<ResourceId>> = HashMap::new();
    let mut stats = ExpansionStats {
        declared_edges: declared.len(),
        ..ExpansionStats::default()
    };

    for (from, to, _kind) in declared {
        if !containment.is_container(from) && !containment.is_container(to) {
            continue;
        }

        let sources = with_content(&mut content, containment, from);
        let targets = with_content(&mut content, containment, to);

        for &source in &sources {
            for &target in &targets {
                if source == target || (source == from && target == to) {
                    continue;
                }
                if containment.contains(source, target) || containment.contains(target, source) {
                    continue;
                }
                if graph.insert_edge(source, target, EdgeKind::Ordering, EdgeOrigin::Derived)
                    == EdgeInsert::Added
                {
                    stats.derived_edges += 1;
                }
            }
        }
    }

    stats.containers_touched = content.keys().filter(|id| containment.is_container(**id)).count();
    tracing::debug!(
        declared = stats.declared_edges,
        derived = stats.derived_edges,
        containers = stats.containers_touched,
        "expanded containment"
    );
    stats
}

fn with_content(
    memo: &mut HashMap<ResourceId, Vec<ResourceId>>,
    containment: &Containment,
    id: ResourceId,
) -> Vec<ResourceId> {
    let content = memo.entry(id).or_insert_with(|| containment.descendants(id));
    let mut out = Vec::with_capacity(content.len() + 1);
    out.push(id);
    out.extend(content.iter().copied());
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
