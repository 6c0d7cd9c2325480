//! The execution trace of one transaction run.

use std::fmt;

use ordo_core::graph::RelationshipGraph;
use ordo_core::model::{ResourceId, ResourceRef};
use serde::Serialize;

/// Why a resource was not evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// An ordering predecessor failed or was itself skipped for that reason.
    FailedDependency {
        /// The blocking direct predecessors.
        blocked_by: Vec<ResourceRef>,
    },
    /// The evaluator vetoed the resource for this run.
    NotScheduled,
    /// Cancellation was requested or the deadline passed.
    Cancelled,
}

/// Terminal state of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResourceStatus {
    Unchanged,
    Changed,
    Failed { reason: String },
    Skipped { reason: SkipReason },
}

impl ResourceStatus {
    /// Whether dependents of this resource must be skipped.
    #[must_use]
    pub const fn blocks_dependents(&self) -> bool {
        matches!(
            self,
            Self::Failed { .. }
                | Self::Skipped {
                    reason: SkipReason::FailedDependency { .. }
                }
        )
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Changed => "changed",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            Self::Skipped {
                reason: SkipReason::FailedDependency { blocked_by },
            } => {
                let names: Vec<String> = blocked_by.iter().map(ToString::to_string).collect();
                write!(f, "skipped: dependency failed ({})", names.join(", "))
            }
            Self::Skipped {
                reason: SkipReason::NotScheduled,
            } => f.write_str("skipped: not scheduled"),
            Self::Skipped {
                reason: SkipReason::Cancelled,
            } => f.write_str("skipped: cancelled"),
            other => f.write_str(other.label()),
        }
    }
}

/// One resource's entry in the trace, in the order it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub resource: ResourceRef,
    #[serde(skip)]
    pub id: ResourceId,
    #[serde(flatten)]
    pub status: ResourceStatus,
    /// Evaluated with `refresh = true`.
    pub refreshed: bool,
}

/// Ordered, append-only record of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExecutionTrace {
    entries: Vec<TraceEntry>,
}

impl ExecutionTrace {
    pub(crate) fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TraceEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resource names in trace order.
    #[must_use]
    pub fn names(&self) -> Vec<&ResourceRef> {
        self.entries.iter().map(|entry| &entry.resource).collect()
    }

    /// Names of resources actually handed to the evaluator, in order.
    #[must_use]
    pub fn evaluated(&self) -> Vec<&ResourceRef> {
        self.entries
            .iter()
            .filter(|entry| !entry.status.is_skipped())
            .map(|entry| &entry.resource)
            .collect()
    }

    /// Position of `resource` in the trace.
    #[must_use]
    pub fn position(&self, resource: &ResourceRef) -> Option<usize> {
        self.entries.iter().position(|entry| &entry.resource == resource)
    }

    #[must_use]
    pub fn get(&self, resource: &ResourceRef) -> Option<&TraceEntry> {
        self.entries.iter().find(|entry| &entry.resource == resource)
    }

    #[must_use]
    pub fn status(&self, resource: &ResourceRef) -> Option<&ResourceStatus> {
        self.get(resource).map(|entry| &entry.status)
    }

    /// Returns `true` if every edge of `graph` runs forward in this trace
    /// and every resource of `graph` appears exactly once.
    #[must_use]
    pub fn is_linear_extension_of(&self, graph: &RelationshipGraph) -> bool {
        let mut position = vec![None; graph.node_count()];
        for (idx, entry) in self.entries.iter().enumerate() {
            match position.get_mut(entry.id.index()) {
                Some(slot @ None) => *slot = Some(idx),
                _ => return false,
            }
        }
        if position.iter().any(Option::is_none) {
            return false;
        }
        graph
            .edges()
            .all(|edge| position[edge.source_id.index()] < position[edge.target_id.index()])
    }
}

impl<'a> IntoIterator for &'a ExecutionTrace {
    type Item = &'a TraceEntry;
    type IntoIter = std::slice::Iter<'a, TraceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
