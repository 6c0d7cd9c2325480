//! The evaluation capability the scheduler drives.
//!
//! An [`Evaluator`] is the seam to resource providers: the scheduler decides
//! *when* a resource is evaluated and with which [`EvalContext`]; the
//! evaluator decides *what* evaluating it means and reports an [`Outcome`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use ordo_core::model::{Resource, ResourceRef};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Outcome / context
// ---------------------------------------------------------------------------

/// Result of evaluating one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum Outcome {
    /// Already in the desired state.
    NoOp,
    /// Brought into the desired state (or would be, in noop mode).
    Changed,
    /// Evaluation failed.
    Failed(String),
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Resources already running finish normally.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-evaluation context handed to the [`Evaluator`].
#[derive(Debug, Clone)]
pub struct EvalContext {
    /// A notifying resource changed; refresh after converging.
    pub refresh: bool,
    /// Report what would change without changing it.
    pub noop: bool,
    /// Transaction-wide cancellation flag.
    pub cancel: CancelToken,
    /// Instant after which no new resource starts.
    pub deadline: Option<Instant>,
}

impl EvalContext {
    /// Returns `true` once cancellation was requested or the deadline passed.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left before the deadline, if one is set.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Evaluates resources on behalf of a transaction.
pub trait Evaluator {
    /// Converge `resource` and report what happened.
    fn evaluate(&mut self, resource: &Resource, ctx: &EvalContext) -> Outcome;

    /// Veto evaluation of `resource` for this run (e.g. outside its
    /// schedule window). Vetoed resources are skipped without failing.
    fn is_scheduled(&self, _resource: &Resource) -> bool {
        true
    }
}

impl<F> Evaluator for F
where
    F: FnMut(&Resource, &EvalContext) -> Outcome,
{
    fn evaluate(&mut self, resource: &Resource, ctx: &EvalContext) -> Outcome {
        self(resource, ctx)
    }
}

// ---------------------------------------------------------------------------
// ScriptedEvaluator
// ---------------------------------------------------------------------------

/// One recorded call to [`ScriptedEvaluator::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalCall {
    pub resource: ResourceRef,
    pub refresh: bool,
    pub noop: bool,
}

/// An evaluator that replays predetermined outcomes and records every call.
///
/// Resources without a scripted outcome report [`Outcome::NoOp`]. Used for
/// dry-run simulation and in tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEvaluator {
    outcomes: HashMap<ResourceRef, Outcome>,
    unscheduled: HashSet<ResourceRef>,
    cancel_after: Option<ResourceRef>,
    calls: Vec<EvalCall>,
}

impl ScriptedEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome of `resource`.
    #[must_use]
    pub fn with_outcome(mut self, resource: ResourceRef, outcome: Outcome) -> Self {
        self.outcomes.insert(resource, outcome);
        self
    }

    /// Veto `resource`.
    #[must_use]
    pub fn unscheduled(mut self, resource: ResourceRef) -> Self {
        self.unscheduled.insert(resource);
        self
    }

    /// Cancel the transaction right after `resource` is evaluated.
    #[must_use]
    pub fn cancel_after(mut self, resource: ResourceRef) -> Self {
        self.cancel_after = Some(resource);
        self
    }

    /// Calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> &[EvalCall] {
        &self.calls
    }

    /// Names of resources evaluated with `refresh = true`.
    #[must_use]
    pub fn refreshed(&self) -> Vec<&ResourceRef> {
        self.calls
            .iter()
            .filter(|call| call.refresh)
            .map(|call| &call.resource)
            .collect()
    }
}

impl Evaluator for ScriptedEvaluator {
    fn evaluate(&mut self, resource: &Resource, ctx: &EvalContext) -> Outcome {
        self.calls.push(EvalCall {
            resource: resource.name().clone(),
            refresh: ctx.refresh,
            noop: ctx.noop,
        });
        if self.cancel_after.as_ref() == Some(resource.name()) {
            ctx.cancel.cancel();
        }
        self.outcomes
            .get(resource.name())
            .cloned()
            .unwrap_or(Outcome::NoOp)
    }

    fn is_scheduled(&self, resource: &Resource) -> bool {
        !self.unscheduled.contains(resource.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn context_stops_after_deadline() {
        let ctx = EvalContext {
            refresh: false,
            noop: false,
            cancel: CancelToken::new(),
            deadline: Some(Instant::now()),
        };
        assert!(ctx.should_stop());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));

        let open = EvalContext {
            deadline: None,
            ..ctx
        };
        assert!(!open.should_stop());
        assert_eq!(open.remaining(), None);
    }

    #[test]
    fn outcome_serializes_with_reason() {
        let json = serde_json::to_value(Outcome::Failed("boom".into())).expect("json");
        assert_eq!(json, serde_json::json!({"outcome": "failed", "reason": "boom"}));
        let noop = serde_json::to_value(Outcome::NoOp).expect("json");
        assert_eq!(noop, serde_json::json!({"outcome": "noop"}));
    }
}
