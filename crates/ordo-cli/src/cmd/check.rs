//! `ordo check`: validate a catalog and report ordering cycles.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use ordo_core::graph::{CycleReport, ExpansionStats};
use ordo_txn::{Transaction, TransactionConfig, TransactionError};
use serde::Serialize;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `ordo check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Catalog document (`.toml` or `.json`).
    pub catalog: PathBuf,
}

#[derive(Debug, Serialize)]
struct CheckOutput {
    catalog: String,
    resources: usize,
    containers: usize,
    expansion: ExpansionStats,
    graph_hash: String,
    cycles: Vec<CycleReport>,
}

/// Execute `ordo check`.
///
/// Fails with a dependency-cycle error after rendering when the expanded
/// graph is not schedulable.
pub fn run_check(args: &CheckArgs, output: OutputMode) -> anyhow::Result<()> {
    let catalog = super::read_catalog(&args.catalog)?;
    let txn = Transaction::new(catalog, TransactionConfig::default())?;

    let payload = CheckOutput {
        catalog: args.catalog.display().to_string(),
        resources: txn.catalog().len(),
        containers: txn.containment().container_count(),
        expansion: txn.expansion_stats(),
        graph_hash: txn.graph().content_hash(),
        cycles: txn.cycles(),
    };

    render_mode(output, &payload, render_check_text, render_check_pretty)?;

    if payload.cycles.is_empty() {
        Ok(())
    } else {
        Err(TransactionError::DependencyCycle {
            cycles: payload.cycles,
        }
        .into())
    }
}

fn render_check_text(payload: &CheckOutput, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "resources={} containers={} declared_edges={} derived_edges={} cycles={} hash={}",
        payload.resources,
        payload.containers,
        payload.expansion.declared_edges,
        payload.expansion.derived_edges,
        payload.cycles.len(),
        payload.graph_hash,
    )?;
    for cycle in &payload.cycles {
        writeln!(w, "cycle\t{cycle}")?;
    }
    Ok(())
}

fn render_check_pretty(payload: &CheckOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Catalog {}", payload.catalog))?;
    pretty_kv(w, "resources", payload.resources.to_string())?;
    pretty_kv(w, "containers", payload.containers.to_string())?;
    pretty_kv(w, "declared edges", payload.expansion.declared_edges.to_string())?;
    pretty_kv(w, "derived edges", payload.expansion.derived_edges.to_string())?;
    pretty_kv(w, "graph hash", &payload.graph_hash)?;

    if payload.cycles.is_empty() {
        writeln!(w, "\nNo dependency cycles found.")?;
        return Ok(());
    }

    writeln!(w, "\nDependency cycles ({})", payload.cycles.len())?;
    for (idx, cycle) in payload.cycles.iter().enumerate() {
        writeln!(w, "  {}. {cycle}", idx + 1)?;
    }
    Ok(())
}
