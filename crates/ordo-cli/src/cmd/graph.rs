//! `ordo graph`: print the expanded relationship graph.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use ordo_core::graph::{EdgeKind, EdgeOrigin, GraphEdge};
use ordo_txn::{Transaction, TransactionConfig};
use serde::Serialize;

use crate::output::{OutputMode, pretty_section, render_mode};

/// Arguments for `ordo graph`.
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Catalog document (`.toml` or `.json`).
    pub catalog: PathBuf,

    /// Emit Graphviz DOT instead of an edge list.
    #[arg(long)]
    pub dot: bool,

    /// Leave out edges added by containment expansion.
    #[arg(long)]
    pub declared_only: bool,
}

#[derive(Debug, Serialize)]
struct GraphOutput<'a> {
    graph_hash: String,
    resources: usize,
    edges: Vec<GraphEdge<'a>>,
}

/// Execute `ordo graph`.
pub fn run_graph(args: &GraphArgs, output: OutputMode) -> anyhow::Result<()> {
    let catalog = super::read_catalog(&args.catalog)?;
    let txn = Transaction::new(catalog, TransactionConfig::default())?;
    let graph = txn.graph();

    if args.dot {
        print!("{}", graph.to_dot());
        return Ok(());
    }

    let payload = GraphOutput {
        graph_hash: graph.content_hash(),
        resources: graph.node_count(),
        edges: graph
            .edges()
            .filter(|edge| !args.declared_only || edge.origin == EdgeOrigin::Declared)
            .collect(),
    };

    render_mode(output, &payload, render_graph_text, render_graph_pretty)
}

fn render_graph_text(payload: &GraphOutput<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    for edge in &payload.edges {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            edge.source,
            edge.target,
            edge.kind.as_str(),
            origin_label(edge.origin),
        )?;
    }
    Ok(())
}

fn render_graph_pretty(payload: &GraphOutput<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(
        w,
        &format!(
            "{} resources, {} edges ({})",
            payload.resources,
            payload.edges.len(),
            payload.graph_hash
        ),
    )?;
    if payload.edges.is_empty() {
        writeln!(w, "No edges.")?;
        return Ok(());
    }
    for edge in &payload.edges {
        let arrow = match edge.kind {
            EdgeKind::Ordering => "→",
            EdgeKind::Notification => "⇒",
        };
        let note = match edge.origin {
            EdgeOrigin::Declared => "",
            EdgeOrigin::Derived => "  (containment)",
        };
        writeln!(w, "  {} {arrow} {}{note}", edge.source, edge.target)?;
    }
    Ok(())
}

const fn origin_label(origin: EdgeOrigin) -> &'static str {
    match origin {
        EdgeOrigin::Declared => "declared",
        EdgeOrigin::Derived => "derived",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordo_core::model::{Catalog, ResourceDecl, ResourceRef};

    fn r(raw: &str) -> ResourceRef {
        ResourceRef::parse(raw).expect("valid ref")
    }

    fn txn() -> Transaction {
        let mut catalog = Catalog::new();
        for decl in [
            ResourceDecl::new(r("Class[Base]")),
            ResourceDecl::new(r("Notify[base]")).contained_by(r("Class[Base]")),
            ResourceDecl::new(r("Notify[top]")).require(r("Class[Base]")),
        ] {
            catalog.add_resource(decl).expect("add");
        }
        Transaction::new(catalog, TransactionConfig::default()).expect("txn")
    }

    #[test]
    fn text_rows_name_kind_and_origin() {
        let txn = txn();
        let graph = txn.graph();
        let payload = GraphOutput {
            graph_hash: graph.content_hash(),
            resources: graph.node_count(),
            edges: graph.edges().collect(),
        };
        let mut out = Vec::new();
        render_graph_text(&payload, &mut out).expect("render");
        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.contains("Class[Base]\tNotify[top]\tordering\tdeclared"));
        assert!(rendered.contains("Notify[base]\tNotify[top]\tordering\tderived"));
    }

    #[test]
    fn pretty_marks_containment_edges() {
        let txn = txn();
        let graph = txn.graph();
        let payload = GraphOutput {
            graph_hash: graph.content_hash(),
            resources: graph.node_count(),
            edges: graph.edges().collect(),
        };
        let mut out = Vec::new();
        render_graph_pretty(&payload, &mut out).expect("render");
        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.starts_with("3 resources, 2 edges"));
        assert!(rendered.contains("Notify[base] → Notify[top]  (containment)"));
    }
}
