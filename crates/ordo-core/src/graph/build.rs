//! Relationship graph construction from a [`Catalog`].
//!
//! # Overview
//!
//! Every resource becomes one node; node indices follow catalog declaration
//! order, so a [`ResourceId`] doubles as the petgraph `NodeIndex`.
//!
//! ## Edge Direction
//!
//! An edge `A → B` means "A completes before B begins". Relationship
//! metaparameters are normalized onto that direction:
//!
//! | Declared on `X`       | Edge      | Kind         |
//! |-----------------------|-----------|--------------|
//! | `before => Y`         | `X → Y`   | ordering     |
//! | `require => Y`        | `Y → X`   | ordering     |
//! | `notify => Y`         | `X → Y`   | notification |
//! | `subscribe => Y`      | `Y → X`   | notification |
//!
//! A notification edge is an ordering edge that additionally carries a
//! refresh signal, so the ordering subgraph is simply the whole edge set.
//!
//! ## Duplicates
//!
//! Declaring the same edge twice collapses to one edge. Declaring an
//! ordering edge and a notification edge on the same pair upgrades the edge
//! to a notification. Declared edges win over containment-derived ones.
//!
//! ## Content Hash
//!
//! [`RelationshipGraph::content_hash`] is a BLAKE3 hash of the sorted edge
//! list. Two builds of the same catalog always hash identically.

#![allow(clippy::module_name_repetitions)]

use std::collections::HashMap;
use std::fmt::Write as _;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use tracing::instrument;

use crate::error::CatalogError;
use crate::model::{Catalog, ResourceId, ResourceRef};

// ---------------------------------------------------------------------------
// Edge metadata
// ---------------------------------------------------------------------------

/// What an edge constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Must-happen-before only.
    Ordering,
    /// Must-happen-before plus refresh-on-change.
    Notification,
}

impl EdgeKind {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ordering => "ordering",
            Self::Notification => "notification",
        }
    }
}

/// Where an edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeOrigin {
    /// Declared by a relationship metaparameter or chained arrow.
    Declared,
    /// Added by containment expansion.
    Derived,
}

/// Weight stored on every graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeInfo {
    pub kind: EdgeKind,
    pub origin: EdgeOrigin,
}

/// Result of inserting an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    /// A new edge was created.
    Added,
    /// An existing edge gained notification or declared status.
    Upgraded,
    /// The edge already existed with at least the requested strength.
    Unchanged,
}

/// A borrowed view of one edge, for queries and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphEdge<'a> {
    pub source: &'a ResourceRef,
    pub target: &'a ResourceRef,
    #[serde(skip)]
    pub source_id: ResourceId,
    #[serde(skip)]
    pub target_id: ResourceId,
    pub kind: EdgeKind,
    pub origin: EdgeOrigin,
}

// ---------------------------------------------------------------------------
// RelationshipGraph
// ---------------------------------------------------------------------------

/// Directed graph of ordering and notification edges between resources.
#[derive(Debug, Clone)]
pub struct RelationshipGraph {
    graph: DiGraph<ResourceId, EdgeInfo>,
    names: Vec<ResourceRef>,
    index: HashMap<ResourceRef, ResourceId>,
}

impl RelationshipGraph {
    /// Build the declared-edge graph for `catalog`.
    ///
    /// Processes each resource's metaparameters in declaration order, then
    /// the catalog-level chained relationships.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownResource`] if any relationship names a
    /// resource that is not in the catalog.
    #[instrument(skip(catalog), fields(resources = catalog.len()))]
    pub fn build(catalog: &Catalog) -> Result<Self, CatalogError> {
        let mut graph = DiGraph::with_capacity(catalog.len(), catalog.len());
        let mut names = Vec::with_capacity(catalog.len());
        let mut index = HashMap::with_capacity(catalog.len());

        for resource in catalog.resources() {
            let idx = graph.add_node(resource.id());
            debug_assert_eq!(idx.index(), resource.id().index());
            names.push(resource.name().clone());
            index.insert(resource.name().clone(), resource.id());
        }

        let mut built = Self {
            graph,
            names,
            index,
        };

        for resource in catalog.resources() {
            let declarer = resource.id();
            for rel in resource.relationships() {
                let target = built.resolve(&rel.target, resource.name())?;
                let (from, to) = rel.kind.orient(&declarer, &target);
                built.insert_edge(
                    *from,
                    *to,
                    kind_of(rel.kind.is_notification()),
                    EdgeOrigin::Declared,
                );
            }
        }

        for rel in catalog.relationships() {
            let source = built.resolve(&rel.source, &rel.target)?;
            let target = built.resolve(&rel.target, &rel.source)?;
            let (from, to) = rel.kind.orient(&source, &target);
            built.insert_edge(
                *from,
                *to,
                kind_of(rel.kind.is_notification()),
                EdgeOrigin::Declared,
            );
        }

        tracing::debug!(
            nodes = built.node_count(),
            edges = built.edge_count(),
            "built relationship graph"
        );
        Ok(built)
    }

    fn resolve(
        &self,
        reference: &ResourceRef,
        declared_by: &ResourceRef,
    ) -> Result<ResourceId, CatalogError> {
        self.lookup(reference).ok_or_else(|| CatalogError::UnknownResource {
            reference: reference.clone(),
            declared_by: declared_by.clone(),
        })
    }

    /// Insert (or strengthen) the edge `from → to`.
    ///
    /// Idempotent: repeated inserts of the same edge never create a parallel
    /// edge. Both ids must belong to this graph.
    pub(crate) fn insert_edge(
        &mut self,
        from: ResourceId,
        to: ResourceId,
        kind: EdgeKind,
        origin: EdgeOrigin,
    ) -> EdgeInsert {
        let (a, b) = (node(from), node(to));
        if let Some(edge) = self.graph.find_edge(a, b) {
            let Some(info) = self.graph.edge_weight_mut(edge) else {
                return EdgeInsert::Unchanged;
            };
            let upgraded = EdgeInfo {
                kind: info.kind.max(kind),
                origin: info.origin.min(origin),
            };
            if upgraded == *info {
                return EdgeInsert::Unchanged;
            }
            *info = upgraded;
            return EdgeInsert::Upgraded;
        }

        self.graph.add_edge(a, b, EdgeInfo { kind, origin });
        EdgeInsert::Added
    }

    /// Number of resources (nodes).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns `true` if the graph has no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Look up the id of a resource by name.
    #[must_use]
    pub fn lookup(&self, name: &ResourceRef) -> Option<ResourceId> {
        self.index.get(name).copied()
    }

    /// Name of the resource with the given id.
    #[must_use]
    pub fn name(&self, id: ResourceId) -> Option<&ResourceRef> {
        self.names.get(id.index())
    }

    /// All resource ids, in catalog order.
    pub fn resource_ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.graph.node_weights().copied()
    }

    /// Metadata of the edge `from → to`, if present.
    #[must_use]
    pub fn edge_info(&self, from: ResourceId, to: ResourceId) -> Option<EdgeInfo> {
        self.graph
            .find_edge(node(from), node(to))
            .and_then(|edge| self.graph.edge_weight(edge))
            .copied()
    }

    /// Returns `true` if `from` must complete before `to` begins (direct edge).
    #[must_use]
    pub fn has_edge(&self, from: &ResourceRef, to: &ResourceRef) -> bool {
        self.ids(from, to)
            .is_some_and(|(a, b)| self.edge_info(a, b).is_some())
    }

    /// Returns `true` if `from` notifies `to` directly.
    #[must_use]
    pub fn has_notification(&self, from: &ResourceRef, to: &ResourceRef) -> bool {
        self.ids(from, to).is_some_and(|(a, b)| {
            self.edge_info(a, b)
                .is_some_and(|info| info.kind == EdgeKind::Notification)
        })
    }

    fn ids(&self, from: &ResourceRef, to: &ResourceRef) -> Option<(ResourceId, ResourceId)> {
        Some((self.lookup(from)?, self.lookup(to)?))
    }

    /// Direct ordering predecessors of `id`.
    pub fn predecessors(&self, id: ResourceId) -> impl Iterator<Item = ResourceId> + '_ {
        self.graph
            .neighbors_directed(node(id), Direction::Incoming)
            .map(|idx| self.graph[idx])
    }

    /// Direct ordering successors of `id`.
    pub fn successors(&self, id: ResourceId) -> impl Iterator<Item = ResourceId> + '_ {
        self.graph
            .neighbors_directed(node(id), Direction::Outgoing)
            .map(|idx| self.graph[idx])
    }

    /// Resources notified directly by `id`.
    pub fn notification_targets(&self, id: ResourceId) -> impl Iterator<Item = ResourceId> + '_ {
        self.graph
            .edges_directed(node(id), Direction::Outgoing)
            .filter(|edge| edge.weight().kind == EdgeKind::Notification)
            .map(|edge| self.graph[edge.target()])
    }

    /// Every edge, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = GraphEdge<'_>> + '_ {
        self.graph.edge_references().map(|edge| {
            let source_id = self.graph[edge.source()];
            let target_id = self.graph[edge.target()];
            GraphEdge {
                source: &self.names[source_id.index()],
                target: &self.names[target_id.index()],
                source_id,
                target_id,
                kind: edge.weight().kind,
                origin: edge.weight().origin,
            }
        })
    }

    /// Snapshot of `(source, target, kind)` for edges with the given origin.
    #[must_use]
    pub fn edges_with_origin(&self, origin: EdgeOrigin) -> Vec<(ResourceId, ResourceId, EdgeKind)> {
        self.edges()
            .filter(|edge| edge.origin == origin)
            .map(|edge| (edge.source_id, edge.target_id, edge.kind))
            .collect()
    }

    /// The underlying petgraph structure.
    #[must_use]
    pub const fn inner(&self) -> &DiGraph<ResourceId, EdgeInfo> {
        &self.graph
    }

    /// BLAKE3 hash of the sorted edge list.
    ///
    /// Changes only when the set of edges (or their kinds) changes.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut edges: Vec<(String, String, EdgeKind)> = self
            .edges()
            .map(|edge| (edge.source.to_string(), edge.target.to_string(), edge.kind))
            .collect();
        edges.sort_unstable();

        let mut hasher = blake3::Hasher::new();
        for (source, target, kind) in &edges {
            hasher.update(source.as_bytes());
            hasher.update(b"\x00");
            hasher.update(target.as_bytes());
            hasher.update(b"\x00");
            hasher.update(kind.as_str().as_bytes());
            hasher.update(b"\x00");
        }
        format!("blake3:{}", hasher.finalize())
    }

    /// Render the graph in Graphviz DOT format.
    ///
    /// Notification edges are dashed; derived edges are grey.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph relationships {\n    rankdir=LR;\n");
        for name in &self.names {
            let _ = writeln!(out, "    \"{}\";", escape_dot(&name.to_string()));
        }
        for edge in self.edges() {
            let mut attrs = Vec::new();
            if edge.kind == EdgeKind::Notification {
                attrs.push("style=dashed");
            }
            if edge.origin == EdgeOrigin::Derived {
                attrs.push("color=grey");
            }
            let attrs = if attrs.is_empty() {
                String::new()
            } else {
                format!(" [{}]", attrs.join(", "))
            };
            let _ = writeln!(
                out,
                "    \"{}\" -> \"{}\"{attrs};",
                escape_dot(&edge.source.to_string()),
                escape_dot(&edge.target.to_string()),
            );
        }
        out.push_str("}\n");
        out
    }
}

const fn kind_of(notification: bool) -> EdgeKind {
    if notification {
        EdgeKind::Notification
    } else {
        EdgeKind::Ordering
    }
}

fn node(id: ResourceId) -> NodeIndex {
    NodeIndex::new(id.index())
}

fn escape_dot(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
