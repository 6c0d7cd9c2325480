//! Composable predicates over traces and graphs.
//!
//! Every predicate returns a [`Check`]: a pass/fail flag plus a one-line
//! detail saying what was (or was not) found. Combine with [`all_of`] and
//! [`any_of`].
//!
//! ```rust,ignore
//! let check = all_of([
//!     items_in_order(trace, &[&base, &top]),
//!     has_edge(graph, &base, &top),
//! ]);
//! assert!(check.passed, "{check}");
//! ```

use std::fmt;

use ordo_core::graph::RelationshipGraph;
use ordo_core::model::ResourceRef;

use crate::trace::{ExecutionTrace, ResourceStatus};

/// Result of one predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub passed: bool,
    pub detail: String,
}

impl Check {
    #[must_use]
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "ok" } else { "FAILED" };
        write!(f, "[{mark}] {}", self.detail)
    }
}

// ---------------------------------------------------------------------------
// Trace predicates
// ---------------------------------------------------------------------------

/// Every item appears in the trace, each strictly after the previous one.
/// Other resources may appear in between.
#[must_use]
pub fn items_in_order(trace: &ExecutionTrace, items: &[&ResourceRef]) -> Check {
    let mut last: Option<(usize, &ResourceRef)> = None;
    for &item in items {
        let Some(pos) = trace.position(item) else {
            return Check::fail(format!("{item} not in trace"));
        };
        if let Some((prev_pos, prev)) = last {
            if pos <= prev_pos {
                return Check::fail(format!("{item} (#{pos}) ran before {prev} (#{prev_pos})"));
            }
        }
        last = Some((pos, item));
    }
    Check::pass(format!("{} items in order", items.len()))
}

/// Every item appears somewhere in the trace.
#[must_use]
pub fn contains_all(trace: &ExecutionTrace, items: &[&ResourceRef]) -> Check {
    let missing: Vec<String> = items
        .iter()
        .filter(|item| trace.position(item).is_none())
        .map(ToString::to_string)
        .collect();
    if missing.is_empty() {
        Check::pass(format!("all {} items present", items.len()))
    } else {
        Check::fail(format!("missing: {}", missing.join(", ")))
    }
}

/// `resource` reached the given terminal state label
/// (`unchanged`, `changed`, `failed`, `skipped`).
#[must_use]
pub fn has_status(trace: &ExecutionTrace, resource: &ResourceRef, label: &str) -> Check {
    match trace.status(resource) {
        Some(status) if status.label() == label => Check::pass(format!("{resource} is {status}")),
        Some(status) => Check::fail(format!("{resource} is {status}, expected {label}")),
        None => Check::fail(format!("{resource} not in trace")),
    }
}

/// `resource` was evaluated with `refresh = true`.
#[must_use]
pub fn was_refreshed(trace: &ExecutionTrace, resource: &ResourceRef) -> Check {
    match trace.get(resource) {
        Some(entry) if entry.refreshed => Check::pass(format!("{resource} refreshed")),
        Some(entry) if matches!(entry.status, ResourceStatus::Skipped { .. }) => {
            Check::fail(format!("{resource} was {}", entry.status))
        }
        Some(_) => Check::fail(format!("{resource} was not refreshed")),
        None => Check::fail(format!("{resource} not in trace")),
    }
}

// ---------------------------------------------------------------------------
// Graph predicates
// ---------------------------------------------------------------------------

/// The expanded graph orders `from` directly before `to`.
#[must_use]
pub fn has_edge(graph: &RelationshipGraph, from: &ResourceRef, to: &ResourceRef) -> Check {
    if graph.has_edge(from, to) {
        Check::pass(format!("edge {from} → {to}"))
    } else {
        Check::fail(format!("no edge {from} → {to}"))
    }
}

/// The expanded graph has a notification edge `from ⇒ to`.
#[must_use]
pub fn has_notification(graph: &RelationshipGraph, from: &ResourceRef, to: &ResourceRef) -> Check {
    if graph.has_notification(from, to) {
        Check::pass(format!("notification {from} ⇒ {to}"))
    } else {
        Check::fail(format!("no notification {from} ⇒ {to}"))
    }
}

/// Negation with a detail of its own.
#[must_use]
pub fn not(check: Check) -> Check {
    Check {
        passed: !check.passed,
        detail: format!("not ({})", check.detail),
    }
}

// ---------------------------------------------------------------------------
// Combinators
// ---------------------------------------------------------------------------

/// Passes when every check passes; the detail lists the failures.
#[must_use]
pub fn all_of(checks: impl IntoIterator<Item = Check>) -> Check {
    let checks: Vec<Check> = checks.into_iter().collect();
    let failed: Vec<&str> = checks
        .iter()
        .filter(|c| !c.passed)
        .map(|c| c.detail.as_str())
        .collect();
    if failed.is_empty() {
        Check::pass(format!("all of {} checks passed", checks.len()))
    } else {
        Check::fail(failed.join("; "))
    }
}

/// Passes when at least one check passes.
#[must_use]
pub fn any_of(checks: impl IntoIterator<Item = Check>) -> Check {
    let checks: Vec<Check> = checks.into_iter().collect();
    match checks.iter().find(|c| c.passed) {
        Some(hit) => Check::pass(hit.detail.clone()),
        None => Check::fail(format!(
            "none of: {}",
            checks
                .iter()
                .map(|c| c.detail.as_str())
                .collect::<Vec<_>>()
                .join(" | ")
        )),
    }
}
