use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands::{self, CommandReport};

/// Duplicate-aware batch capture for external viewers.
///
/// Drives a source command through a save/advance loop, fingerprints every
/// artifact that lands in the output directory, stops once the same content
/// keeps coming back, and deletes duplicate files afterwards.
#[derive(Parser)]
#[command(name = "snapsweep")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Emit the command report as JSON instead of key=value lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a capture session: trigger saves, watch the output directory,
    /// stop on repeated content, then reconcile duplicates.
    Run(RunArgs),

    /// Deduplicate an existing capture directory without driving a source.
    Reconcile(ReconcileArgs),

    /// Show the effective configuration and recognized environment keys.
    Config,
}

#[derive(Args)]
struct RunArgs {
    /// Directory the source saves artifacts into.
    #[arg(long)]
    out_dir: Option<String>,

    /// Source command: an executable name on PATH or an explicit path.
    #[arg(long)]
    source_cmd: Option<String>,

    /// Upper bound on items to capture this run.
    #[arg(long)]
    max_items: Option<u64>,

    /// Occurrences of one fingerprint that stop the run (minimum 2).
    #[arg(long)]
    repeat_threshold: Option<u64>,

    /// How long to wait for a triggered artifact to appear, in milliseconds.
    #[arg(long)]
    appear_timeout_ms: Option<u64>,
}

#[derive(Args)]
struct ReconcileArgs {
    /// Directory to sweep.
    #[arg(long)]
    out_dir: Option<String>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match &cli.command {
        Commands::Run(args) => commands::run::run(&commands::run::RunOptions {
            out_dir: args.out_dir.clone(),
            source_cmd: args.source_cmd.clone(),
            max_items: args.max_items,
            repeat_threshold: args.repeat_threshold,
            appear_timeout_ms: args.appear_timeout_ms,
        })?,
        Commands::Reconcile(args) => {
            commands::reconcile::run(&commands::reconcile::ReconcileOptions {
                out_dir: args.out_dir.clone(),
            })?
        }
        Commands::Config => commands::config::run()?,
    };

    render(&report, cli.json);
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}

fn render(report: &CommandReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(payload) => println!("{payload}"),
            Err(err) => eprintln!("error: failed to encode report as JSON: {err}"),
        }
        return;
    }

    println!("command={}", report.command);
    println!("ok={}", report.ok);
    for detail in &report.details {
        println!("{detail}");
    }
    for issue in &report.issues {
        eprintln!("issue: {issue}");
    }
}
