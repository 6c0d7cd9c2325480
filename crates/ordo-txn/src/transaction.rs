//! Deterministic transaction scheduling over an expanded relationship graph.
//!
//! # Overview
//!
//! A [`Transaction`] owns one catalog, its relationship graph (built and
//! containment-expanded on construction), and at most one execution trace.
//!
//! ## States
//!
//! ```text
//! Ready ──evaluate──▶ Running ──first failure/cancel──▶ Draining ──▶ Complete
//!                        └──────────────────────────────────────────▶ Complete
//! ```
//!
//! - **Ready**: graph built and expanded; nothing evaluated. A cycle found
//!   by [`Transaction::evaluate`] leaves the transaction here.
//! - **Running**: resources whose ordering predecessors are all terminal
//!   are selected one at a time.
//! - **Draining**: at least one failure or cancellation was observed.
//!   Dependents of failures are skipped; unaffected branches continue.
//! - **Complete**: every resource is terminal.
//!
//! ## Ordering
//!
//! Kahn's algorithm with a min-heap keyed on [`ResourceId`]: among eligible
//! resources the earliest-declared runs first. Callers should rely only on
//! the partial order.
//!
//! ## Refresh
//!
//! A `Changed` resource flags each direct notification target. A flagged
//! resource is evaluated once with `refresh = true`, however many of its
//! notifiers changed. In noop mode flags are counted, not set.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;
use ordo_core::config::TransactionSettings;
use ordo_core::graph::{
    Containment, CycleReport, ExpansionStats, RelationshipGraph, expand, find_cycles,
};
use ordo_core::model::{Catalog, Resource, ResourceId, ResourceRef};
use ordo_core::timing::time_phase;
use serde::Serialize;
use tracing::instrument;

use crate::error::TransactionError;
use crate::evaluate::{CancelToken, EvalContext, Evaluator, Outcome};
use crate::report::{StatusCounts, TransactionReport};
use crate::trace::{ExecutionTrace, ResourceStatus, SkipReason, TraceEntry};

// ---------------------------------------------------------------------------
// Config / state
// ---------------------------------------------------------------------------

/// Run-time options for one transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Ask evaluators to report changes without making them; suppress refreshes.
    pub noop: bool,
    /// Skip every resource not yet started once this much time has passed.
    pub deadline: Option<Duration>,
}

impl TransactionConfig {
    #[must_use]
    pub fn from_settings(settings: &TransactionSettings) -> Self {
        Self {
            noop: settings.noop,
            deadline: settings.deadline(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Ready,
    Running,
    Draining,
    Complete,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Complete => "complete",
        })
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Transaction {
    catalog: Catalog,
    graph: RelationshipGraph,
    containment: Containment,
    expansion: ExpansionStats,
    config: TransactionConfig,
    state: TransactionState,
    cancel: CancelToken,
    trace: Option<ExecutionTrace>,
    report: Option<TransactionReport>,
}

impl Transaction {
    /// Build and expand the relationship graph for `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::Catalog`] for unknown references,
    /// unknown containers, or containment cycles.
    #[instrument(skip_all, fields(resources = catalog.len(), noop = config.noop))]
    pub fn new(catalog: Catalog, config: TransactionConfig) -> Result<Self, TransactionError> {
        let mut graph = time_phase("txn.build", || RelationshipGraph::build(&catalog))?;
        let containment = Containment::from_catalog(&catalog)?;
        let expansion = time_phase("txn.expand", || expand(&mut graph, &containment));

        Ok(Self {
            catalog,
            graph,
            containment,
            expansion,
            config,
            state: TransactionState::Ready,
            cancel: CancelToken::new(),
            trace: None,
            report: None,
        })
    }

    /// A handle that cancels this transaction from elsewhere.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    #[must_use]
    pub const fn config(&self) -> &TransactionConfig {
        &self.config
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The expanded relationship graph.
    #[must_use]
    pub const fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    #[must_use]
    pub const fn containment(&self) -> &Containment {
        &self.containment
    }

    #[must_use]
    pub const fn expansion_stats(&self) -> ExpansionStats {
        self.expansion
    }

    /// Ordering cycles in the expanded graph (empty when schedulable).
    #[must_use]
    pub fn cycles(&self) -> Vec<CycleReport> {
        find_cycles(&self.graph)
    }

    /// The trace of the completed run, if any.
    #[must_use]
    pub const fn trace(&self) -> Option<&ExecutionTrace> {
        self.trace.as_ref()
    }

    /// The report of the completed run, if any.
    #[must_use]
    pub const fn report(&self) -> Option<&TransactionReport> {
        self.report.as_ref()
    }

    /// Hand the graph and trace over to the caller.
    #[must_use]
    pub fn into_parts(self) -> (RelationshipGraph, Option<ExecutionTrace>) {
        (self.graph, self.trace)
    }

    /// Run every resource once, in dependency order.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::DependencyCycle`] (state stays `Ready`,
    /// nothing evaluated) or [`TransactionError::AlreadyEvaluated`].
    #[instrument(skip_all, fields(resources = self.catalog.len()))]
    pub fn evaluate(
        &mut self,
        evaluator: &mut dyn Evaluator,
    ) -> Result<&TransactionReport, TransactionError> {
        if self.state != TransactionState::Ready {
            return Err(TransactionError::AlreadyEvaluated);
        }

        let cycles = time_phase("txn.cycles", || find_cycles(&self.graph));
        if !cycles.is_empty() {
            tracing::warn!(cycles = cycles.len(), "refusing to evaluate cyclic graph");
            return Err(TransactionError::DependencyCycle { cycles });
        }

        let started_at = Utc::now();
        let run = time_phase("txn.evaluate", || self.run(evaluator));
        let counts = StatusCounts::from_trace(&run.trace);

        let report = TransactionReport {
            status: counts.run_status(),
            noop: self.config.noop,
            counts,
            suppressed_refreshes: run.suppressed_refreshes,
            expansion: self.expansion,
            graph_hash: self.graph.content_hash(),
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            status = %report.status,
            changed = counts.changed,
            failed = counts.failed,
            skipped = counts.skipped,
            "transaction complete"
        );

        self.trace = Some(run.trace);
        Ok(self.report.insert(report))
    }

    fn run(&mut self, evaluator: &mut dyn Evaluator) -> RunOutput {
        let node_count = self.graph.node_count();
        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let mut statuses: Vec<Option<ResourceStatus>> = vec![None; node_count];
        let mut refresh = vec![false; node_count];
        let mut pending: Vec<usize> = vec![0; node_count];
        let mut ready: BinaryHeap<Reverse<ResourceId>> = BinaryHeap::new();
        let mut out = RunOutput::default();

        for id in self.graph.resource_ids() {
            pending[id.index()] = self.graph.predecessors(id).count();
            if pending[id.index()] == 0 {
                ready.push(Reverse(id));
            }
        }

        transition(&mut self.state, TransactionState::Running);

        while let Some(Reverse(id)) = ready.pop() {
            let Some(resource) = self.catalog.get(id) else {
                continue;
            };

            let ctx = EvalContext {
                refresh: refresh[id.index()],
                noop: self.config.noop,
                cancel: self.cancel.clone(),
                deadline,
            };
            let status = self.decide(evaluator, resource, &ctx, &statuses);
            let refreshed = ctx.refresh && !status.is_skipped();

            match &status {
                ResourceStatus::Changed => {
                    for target in self.graph.notification_targets(id) {
                        if self.config.noop {
                            out.suppressed_refreshes += 1;
                            tracing::info!(
                                source = %resource,
                                notified = ?self.graph.name(target),
                                "noop: would refresh"
                            );
                        } else {
                            refresh[target.index()] = true;
                        }
                    }
                }
                ResourceStatus::Failed { .. }
                | ResourceStatus::Skipped {
                    reason: SkipReason::Cancelled,
                } => transition(&mut self.state, TransactionState::Draining),
                _ => {}
            }

            out.trace.push(TraceEntry {
                resource: resource.name().clone(),
                id,
                status: status.clone(),
                refreshed,
            });
            statuses[id.index()] = Some(status);

            for next in self.graph.successors(id) {
                let slot = &mut pending[next.index()];
                *slot = slot.saturating_sub(1);
                if *slot == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        transition(&mut self.state, TransactionState::Complete);
        out
    }

    /// Decide the terminal state of one eligible resource.
    fn decide(
        &self,
        evaluator: &mut dyn Evaluator,
        resource: &Resource,
        ctx: &EvalContext,
        statuses: &[Option<ResourceStatus>],
    ) -> ResourceStatus {
        if ctx.should_stop() {
            tracing::warn!(resource = %resource, "skipped: cancelled");
            return ResourceStatus::Skipped {
                reason: SkipReason::Cancelled,
            };
        }

        let mut blocked_by: Vec<ResourceRef> = self
            .graph
            .predecessors(resource.id())
            .filter(|pred| {
                statuses[pred.index()]
                    .as_ref()
                    .is_some_and(ResourceStatus::blocks_dependents)
            })
            .filter_map(|pred| self.graph.name(pred).cloned())
            .collect();
        if !blocked_by.is_empty() {
            blocked_by.sort_unstable();
            tracing::warn!(
                resource = %resource,
                blocked_by = blocked_by.len(),
                "skipped: dependency failed"
            );
            return ResourceStatus::Skipped {
                reason: SkipReason::FailedDependency { blocked_by },
            };
        }

        if !evaluator.is_scheduled(resource) {
            tracing::debug!(resource = %resource, "skipped: not scheduled");
            return ResourceStatus::Skipped {
                reason: SkipReason::NotScheduled,
            };
        }

        match evaluator.evaluate(resource, ctx) {
            Outcome::NoOp => {
                tracing::debug!(resource = %resource, refresh = ctx.refresh, "unchanged");
                ResourceStatus::Unchanged
            }
            Outcome::Changed => {
                tracing::debug!(resource = %resource, refresh = ctx.refresh, "changed");
                ResourceStatus::Changed
            }
            Outcome::Failed(reason) => {
                tracing::warn!(resource = %resource, %reason, "evaluation failed");
                ResourceStatus::Failed { reason }
            }
        }
    }
}

fn transition(state: &mut TransactionState, next: TransactionState) {
    if *state != next {
        tracing::debug!(from = %state, to = %next, "transaction state");
        *state = next;
    }
}

#[derive(Debug, Default)]
struct RunOutput {
    trace: ExecutionTrace,
    suppressed_refreshes: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
