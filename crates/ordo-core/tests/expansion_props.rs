use std::collections::HashSet;

use ordo_core::graph::{Containment, EdgeOrigin, RelationshipGraph, expand, find_cycles, is_acyclic};
use proptest::prelude::*;

use generators::*;

fn expanded(generated: &Generated) -> RelationshipGraph {
    let mut graph = RelationshipGraph::build(&generated.catalog).expect("build");
    let containment = Containment::from_catalog(&generated.catalog).expect("containment");
    expand(&mut graph, &containment);
    graph
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn forward_catalogs_stay_acyclic(generated in arb_forward_catalog(14)) {
        let graph = expanded(&generated);
        prop_assert!(is_acyclic(&graph));
        prop_assert!(find_cycles(&graph).is_empty());
        for edge in graph.edges() {
            prop_assert!(edge.source_id < edge.target_id, "{} → {}", edge.source, edge.target);
        }
    }

    #[test]
    fn declared_edges_reach_every_content_pair(generated in arb_any_catalog(12)) {
        let graph = expanded(&generated);
        for &(a, b) in &generated.edges {
            for x in generated.with_content(a) {
                for y in generated.with_content(b) {
                    let nested = generated.is_ancestor(x, y) || generated.is_ancestor(y, x);
                    if x != y && ((x, y) == (a, b) || !nested) {
                        prop_assert!(
                            graph.has_edge(&generated.name(x), &generated.name(y)),
                            "missing {} → {}", x, y
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn every_derived_edge_is_justified(generated in arb_any_catalog(12)) {
        let graph = expanded(&generated);
        let mut justified: HashSet<(usize, usize)> = HashSet::new();
        for &(a, b) in &generated.edges {
            for x in generated.with_content(a) {
                for y in generated.with_content(b) {
                    justified.insert((x, y));
                }
            }
        }

        for (from, to, _) in graph.edges_with_origin(EdgeOrigin::Derived) {
            prop_assert!(from != to, "self-loop derived");
            prop_assert!(justified.contains(&(from.index(), to.index())));
        }
    }

    #[test]
    fn forward_catalogs_never_link_container_and_content(generated in arb_forward_catalog(14)) {
        let graph = expanded(&generated);
        for edge in graph.edges() {
            let (s, t) = (edge.source_id.index(), edge.target_id.index());
            prop_assert!(!generated.is_ancestor(s, t) && !generated.is_ancestor(t, s));
        }
    }

    #[test]
    fn derived_edges_never_link_container_and_content(generated in arb_any_catalog(12)) {
        let graph = expanded(&generated);
        for (from, to, _) in graph.edges_with_origin(EdgeOrigin::Derived) {
            let (s, t) = (from.index(), to.index());
            prop_assert!(
                !generated.is_ancestor(s, t) && !generated.is_ancestor(t, s),
                "{} → {} crosses its own containment chain", generated.name(s), generated.name(t)
            );
        }
    }

    #[test]
    fn expansion_is_idempotent(generated in arb_any_catalog(12)) {
        let mut graph = RelationshipGraph::build(&generated.catalog).expect("build");
        let containment = Containment::from_catalog(&generated.catalog).expect("containment");
        expand(&mut graph, &containment);
        let hash = graph.content_hash();
        let count = graph.edge_count();

        let again = expand(&mut graph, &containment);
        prop_assert_eq!(again.derived_edges, 0);
        prop_assert_eq!(graph.edge_count(), count);
        prop_assert_eq!(graph.content_hash(), hash);
    }
}
