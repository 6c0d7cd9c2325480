#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::env;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use ordo_core::config::{EffectiveConfig, resolve_config};
use ordo_core::{ErrorCode, timing};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit status of `ordo apply` when the simulated run failed or was cancelled.
const EXIT_RUN_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ordo: resource dependency graphs and transaction scheduling",
    long_about = None
)]
struct Cli {
    /// Emit a phase timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Validate a catalog",
        long_about = "Build and expand the relationship graph of a catalog and report ordering cycles.",
        after_help = "EXAMPLES:\n    # Check a catalog\n    ordo check site.toml\n\n    # Emit machine-readable output\n    ordo check site.toml --json"
    )]
    Check(cmd::check::CheckArgs),

    #[command(
        about = "Print the expanded relationship graph",
        long_about = "Print every ordering and notification edge after containment expansion.",
        after_help = "EXAMPLES:\n    # List edges\n    ordo graph site.toml\n\n    # Render with Graphviz\n    ordo graph site.toml --dot | dot -Tsvg > graph.svg"
    )]
    Graph(cmd::graph::GraphArgs),

    #[command(
        about = "Simulate a transaction",
        long_about = "Evaluate every resource in dependency order with scripted outcomes and print the trace.",
        after_help = "EXAMPLES:\n    # Preview the evaluation order\n    ordo apply site.toml\n\n    # See what a failure would skip\n    ordo apply site.toml --fail 'Package[nginx]'\n\n    # See which services would be refreshed\n    ordo apply site.toml --change 'File[/etc/nginx.conf]'"
    )]
    Apply(cmd::apply::ApplyArgs),

    #[command(
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    ordo completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ORDO_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "ordo=debug,info"
        } else {
            "ordo=info,warn"
        })
    });

    let format = env::var("ORDO_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let timing_enabled = cli.timing || timing::enabled_from_env();
    timing::set_enabled(timing_enabled);

    let config = match env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|root| resolve_config(&root, cli.json))
    {
        Ok(config) => config,
        Err(err) => {
            let mode = cli.format.unwrap_or(if cli.json {
                OutputMode::Json
            } else {
                OutputMode::Text
            });
            let error = CliError::new(format!("{err:#}")).with_code(ErrorCode::ConfigParseError);
            // Nothing else to report to if stderr itself is gone.
            let _ = render_error(mode, &error);
            return ExitCode::FAILURE;
        }
    };
    let mode = resolve_output_mode(cli.format, &config.resolved_output);

    let result = run(&cli, &config, mode);

    if timing_enabled {
        let report = timing::take_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprint!("{report}");
            if let Ok(json) = serde_json::to_string_pretty(&report) {
                eprintln!("timing report (json):");
                eprintln!("{json}");
            }
        }
    }

    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            let _ = render_error(mode, &CliError::from_anyhow(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &EffectiveConfig, mode: OutputMode) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Commands::Check(args) => cmd::check::run_check(args, mode)?,
        Commands::Graph(args) => cmd::graph::run_graph(args, mode)?,
        Commands::Apply(args) => {
            let status = cmd::apply::run_apply(args, &config.project.transaction, mode)?;
            if status.is_failure() {
                return Ok(ExitCode::from(EXIT_RUN_FAILED));
            }
        }
        Commands::Completions(args) => {
            cmd::completions::run_completions(args.shell, &mut Cli::command())?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
