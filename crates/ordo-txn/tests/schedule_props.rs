use std::collections::HashSet;

use ordo_core::model::{Catalog, RelationKind, ResourceDecl, ResourceRef};
use ordo_txn::{
    Outcome, ResourceStatus, ScriptedEvaluator, SkipReason, Transaction, TransactionConfig,
};
use proptest::prelude::*;
use proptest::sample::Index;

fn name(index: usize) -> ResourceRef {
    ResourceRef::new("notify", format!("r{index}"))
}

#[derive(Debug, Clone)]
struct Scenario {
    catalog: Catalog,
    outcomes: Vec<Outcome>,
}

fn outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        4 => Just(Outcome::NoOp),
        3 => Just(Outcome::Changed),
        1 => Just(Outcome::Failed("scripted".to_string())),
    ]
}

/// Acyclic catalogs: declaration order is a preorder of the containment
/// forest, and relationships only point forward between disjoint subtrees.
fn scenario() -> impl Strategy<Value = Scenario> {
    (1..=14_usize)
        .prop_flat_map(|n| {
            (
                prop::collection::vec(any::<Index>(), n),
                prop::collection::vec((0..n, 0..n, 0..4_usize), 0..=n * 2),
                prop::collection::vec(outcome(), n),
            )
        })
        .prop_map(|(picks, edges, outcomes)| {
            let mut parents: Vec<Option<usize>> = Vec::new();
            let mut chain: Vec<usize> = Vec::new();
            for (i, pick) in picks.iter().enumerate() {
                let choice = pick.index(chain.len() + 1);
                let parent = (choice > 0).then(|| chain[choice - 1]);
                match parent {
                    None => chain.clear(),
                    Some(p) => {
                        let pos = chain.iter().position(|&c| c == p).expect("on chain");
                        chain.truncate(pos + 1);
                    }
                }
                chain.push(i);
                parents.push(parent);
            }

            let related = |a: usize, b: usize| {
                let mut cursor = parents[b];
                while let Some(p) = cursor {
                    if p == a {
                        return true;
                    }
                    cursor = parents[p];
                }
                false
            };

            let mut decls: Vec<ResourceDecl> = (0..picks.len())
                .map(|i| match parents[i] {
                    Some(p) => ResourceDecl::new(name(i)).contained_by(name(p)),
                    None => ResourceDecl::new(name(i)),
                })
                .collect();

            for (a, b, kind) in edges {
                let (first, second) = (a.min(b), a.max(b));
                if first == second || related(first, second) || related(second, first) {
                    continue;
                }
                let kind = RelationKind::ALL[kind];
                // Declare on whichever side makes the edge run first → second.
                let (declarer, target) = if kind.is_reversed() {
                    (second, first)
                } else {
                    (first, second)
                };
                decls[declarer] = decls[declarer].clone().relate(kind, name(target));
            }

            let mut catalog = Catalog::new();
            for decl in decls {
                catalog.add_resource(decl).expect("unique");
            }
            Scenario { catalog, outcomes }
        })
}

fn scripted(scenario: &Scenario) -> ScriptedEvaluator {
    scenario
        .outcomes
        .iter()
        .enumerate()
        .fold(ScriptedEvaluator::new(), |eval, (i, outcome)| {
            eval.with_outcome(name(i), outcome.clone())
        })
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn trace_is_a_linear_extension(scenario in scenario()) {
        let mut txn = Transaction::new(scenario.catalog.clone(), TransactionConfig::default())
            .expect("transaction");
        let mut eval = scripted(&scenario);
        txn.evaluate(&mut eval).expect("acyclic by construction");

        let trace = txn.trace().expect("trace");
        prop_assert_eq!(trace.len(), scenario.catalog.len());
        prop_assert!(trace.is_linear_extension_of(txn.graph()));
    }

    #[test]
    fn failures_skip_exactly_their_dependents(scenario in scenario()) {
        let mut txn = Transaction::new(scenario.catalog.clone(), TransactionConfig::default())
            .expect("transaction");
        let mut eval = scripted(&scenario);
        txn.evaluate(&mut eval).expect("evaluate");
        let trace = txn.trace().expect("trace");
        let graph = txn.graph();

        for entry in trace {
            let blocked = graph.predecessors(entry.id).any(|pred| {
                graph
                    .name(pred)
                    .and_then(|n| trace.status(n))
                    .is_some_and(ResourceStatus::blocks_dependents)
            });
            match &entry.status {
                ResourceStatus::Skipped { reason: SkipReason::FailedDependency { blocked_by } } => {
                    prop_assert!(blocked);
                    prop_assert!(!blocked_by.is_empty());
                }
                ResourceStatus::Skipped { .. } => prop_assert!(false, "no vetoes or cancellation scripted"),
                _ => prop_assert!(!blocked, "{} ran despite a failed dependency", entry.resource),
            }
        }

        let evaluated: HashSet<&ResourceRef> = eval.calls().iter().map(|c| &c.resource).collect();
        prop_assert_eq!(evaluated.len(), eval.calls().len(), "each resource evaluated at most once");
        prop_assert_eq!(evaluated.len(), trace.evaluated().len());
    }

    #[test]
    fn refresh_follows_changed_notifiers(scenario in scenario()) {
        let mut txn = Transaction::new(scenario.catalog.clone(), TransactionConfig::default())
            .expect("transaction");
        let mut eval = scripted(&scenario);
        txn.evaluate(&mut eval).expect("evaluate");
        let trace = txn.trace().expect("trace");
        let graph = txn.graph();

        for entry in trace {
            let notified = graph.predecessors(entry.id).any(|pred| {
                graph.notification_targets(pred).any(|t| t == entry.id)
                    && graph
                        .name(pred)
                        .and_then(|n| trace.status(n))
                        .is_some_and(|s| *s == ResourceStatus::Changed)
            });
            let expected = notified && !entry.status.is_skipped();
            prop_assert_eq!(entry.refreshed, expected, "{}", entry.resource);
        }
    }
}
