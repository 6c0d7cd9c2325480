//! `ordo apply`: run a catalog through the scheduler with simulated outcomes.
//!
//! No resource is touched. Every resource reports "unchanged" unless named
//! by `--change` or `--fail`, which makes the command a way to preview the
//! evaluation order, refresh propagation, and failure cascades of a catalog.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use ordo_core::config::TransactionSettings;
use ordo_core::model::ResourceRef;
use ordo_txn::{
    ExecutionTrace, Outcome, ResourceStatus, RunStatus, ScriptedEvaluator, SkipReason,
    Transaction, TransactionConfig, TransactionReport,
};
use serde::Serialize;

use crate::output::{OutputMode, pretty_rule, pretty_section, render_mode};

/// Arguments for `ordo apply`.
#[derive(Args, Debug, Default)]
pub struct ApplyArgs {
    /// Catalog document (`.toml` or `.json`).
    pub catalog: PathBuf,

    /// Report would-be changes without queuing refreshes.
    #[arg(long)]
    pub noop: bool,

    /// Skip resources not yet started after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub deadline_secs: Option<u64>,

    /// Simulate a change on this resource (repeatable).
    #[arg(long, value_name = "REF")]
    pub change: Vec<ResourceRef>,

    /// Simulate a failure on this resource (repeatable).
    #[arg(long, value_name = "REF")]
    pub fail: Vec<ResourceRef>,

    /// Veto this resource as if it were outside its schedule (repeatable).
    #[arg(long, value_name = "REF")]
    pub unscheduled: Vec<ResourceRef>,

    /// Cancel the run right after this resource is evaluated.
    #[arg(long, value_name = "REF")]
    pub cancel_after: Option<ResourceRef>,
}

impl ApplyArgs {
    /// Flags override the project `[transaction]` table.
    fn transaction_config(&self, settings: &TransactionSettings) -> TransactionConfig {
        let mut config = TransactionConfig::from_settings(settings);
        config.noop |= self.noop;
        if let Some(secs) = self.deadline_secs {
            config.deadline = Some(Duration::from_secs(secs));
        }
        config
    }

    fn evaluator(&self) -> ScriptedEvaluator {
        let mut eval = ScriptedEvaluator::new();
        for name in &self.change {
            eval = eval.with_outcome(name.clone(), Outcome::Changed);
        }
        for name in &self.fail {
            eval = eval.with_outcome(name.clone(), Outcome::Failed("simulated failure".to_string()));
        }
        for name in &self.unscheduled {
            eval = eval.unscheduled(name.clone());
        }
        if let Some(name) = &self.cancel_after {
            eval = eval.cancel_after(name.clone());
        }
        eval
    }
}

#[derive(Debug, Serialize)]
struct ApplyOutput<'a> {
    report: &'a TransactionReport,
    trace: &'a ExecutionTrace,
}

/// Execute `ordo apply` and return the overall run status.
pub fn run_apply(
    args: &ApplyArgs,
    settings: &TransactionSettings,
    output: OutputMode,
) -> anyhow::Result<RunStatus> {
    let catalog = super::read_catalog(&args.catalog)?;
    for name in args.change.iter().chain(&args.fail).chain(&args.unscheduled) {
        if catalog.lookup(name).is_none() {
            tracing::warn!(resource = %name, "simulated outcome names a resource not in the catalog");
        }
    }

    let mut txn = Transaction::new(catalog, args.transaction_config(settings))?;
    let mut eval = args.evaluator();
    let status = txn.evaluate(&mut eval)?.status;

    let (Some(report), Some(trace)) = (txn.report(), txn.trace()) else {
        anyhow::bail!("transaction finished without a report");
    };
    render_mode(
        output,
        &ApplyOutput { report, trace },
        render_apply_text,
        render_apply_pretty,
    )?;
    Ok(status)
}

fn skip_detail(reason: &SkipReason) -> String {
    match reason {
        SkipReason::FailedDependency { blocked_by } => {
            let names: Vec<String> = blocked_by.iter().map(ToString::to_string).collect();
            format!("dependency failed: {}", names.join(", "))
        }
        SkipReason::NotScheduled => "not scheduled".to_string(),
        SkipReason::Cancelled => "cancelled".to_string(),
    }
}

fn render_apply_text(payload: &ApplyOutput<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    for entry in payload.trace {
        let detail = match &entry.status {
            ResourceStatus::Failed { reason } => reason.clone(),
            ResourceStatus::Skipped { reason } => skip_detail(reason),
            ResourceStatus::Unchanged | ResourceStatus::Changed => String::new(),
        };
        writeln!(
            w,
            "{}\t{}\t{}\t{detail}",
            entry.status.label(),
            entry.resource,
            if entry.refreshed { "refreshed" } else { "-" },
        )?;
    }
    writeln!(w, "{}", payload.report)
}

fn render_apply_pretty(payload: &ApplyOutput<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    let heading = if payload.report.noop {
        format!("Simulated run of {} resources (noop)", payload.trace.len())
    } else {
        format!("Simulated run of {} resources", payload.trace.len())
    };
    pretty_section(w, &heading)?;

    for (idx, entry) in payload.trace.iter().enumerate() {
        write!(w, "{:>4}. {:<10} {}", idx + 1, entry.status.label(), entry.resource)?;
        if entry.refreshed {
            write!(w, "  (refreshed)")?;
        }
        match &entry.status {
            ResourceStatus::Failed { reason } => write!(w, "  {reason}")?,
            ResourceStatus::Skipped { reason } => write!(w, "  {}", skip_detail(reason))?,
            ResourceStatus::Unchanged | ResourceStatus::Changed => {}
        }
        writeln!(w)?;
    }

    pretty_rule(w)?;
    writeln!(w, "{}", payload.report)?;
    if payload.report.suppressed_refreshes > 0 {
        writeln!(
            w,
            "{} refreshes suppressed by noop",
            payload.report.suppressed_refreshes
        )?;
    }
    Ok(())
}
