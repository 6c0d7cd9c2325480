//! Summary of a finished transaction.

use std::fmt;

use chrono::{DateTime, Utc};
use ordo_core::graph::ExpansionStats;
use serde::Serialize;

use crate::trace::{ExecutionTrace, ResourceStatus, SkipReason};

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Nothing failed and nothing changed.
    Unchanged,
    /// Nothing failed and at least one resource changed.
    Changed,
    /// The run was cancelled (or hit its deadline) before finishing.
    Cancelled,
    /// At least one resource failed.
    Failed,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Changed => "changed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Whether the run should be treated as unsuccessful by callers.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-state resource counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Skips caused by a failed dependency.
    pub skipped_failed_dependency: usize,
    /// Skips caused by an evaluator veto.
    pub skipped_not_scheduled: usize,
    /// Skips caused by cancellation or deadline.
    pub skipped_cancelled: usize,
    /// Resources evaluated with `refresh = true`.
    pub refreshed: usize,
}

impl StatusCounts {
    /// Tally the terminal states of `trace`.
    #[must_use]
    pub fn from_trace(trace: &ExecutionTrace) -> Self {
        let mut counts = Self::default();
        for entry in trace {
            counts.total += 1;
            if entry.refreshed {
                counts.refreshed += 1;
            }
            match &entry.status {
                ResourceStatus::Unchanged => counts.unchanged += 1,
                ResourceStatus::Changed => counts.changed += 1,
                ResourceStatus::Failed { .. } => counts.failed += 1,
                ResourceStatus::Skipped { reason } => {
                    counts.skipped += 1;
                    match reason {
                        SkipReason::FailedDependency { .. } => counts.skipped_failed_dependency += 1,
                        SkipReason::NotScheduled => counts.skipped_not_scheduled += 1,
                        SkipReason::Cancelled => counts.skipped_cancelled += 1,
                    }
                }
            }
        }
        counts
    }

    #[must_use]
    pub const fn run_status(&self) -> RunStatus {
        if self.failed > 0 {
            RunStatus::Failed
        } else if self.skipped_cancelled > 0 {
            RunStatus::Cancelled
        } else if self.changed > 0 {
            RunStatus::Changed
        } else {
            RunStatus::Unchanged
        }
    }
}

/// Machine-readable summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionReport {
    pub status: RunStatus,
    pub noop: bool,
    pub counts: StatusCounts,
    /// Refreshes not queued because the run was in noop mode.
    pub suppressed_refreshes: usize,
    pub expansion: ExpansionStats,
    pub graph_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TransactionReport {
    /// Wall time of the evaluation phase in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

impl fmt::Display for TransactionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counts;
        write!(
            f,
            "{}{}: {} resources ({} changed, {} unchanged, {} failed, {} skipped, {} refreshed) in {}ms",
            self.status,
            if self.noop { " (noop)" } else { "" },
            c.total,
            c.changed,
            c.unchanged,
            c.failed,
            c.skipped,
            c.refreshed,
            self.duration_ms(),
        )
    }
}
