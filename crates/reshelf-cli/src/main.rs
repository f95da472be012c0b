mod commands;
mod logging;
mod progress;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{ApplyArgs, Cli, Commands, ScanArgs};
use dotenv::dotenv;
use progress::CliReporter;
use reshelf_core::{AppConfig, RelocationEngine, RunReport};
use tracing::{error, info};

const EXIT_PROBLEMS: i32 = 1;
const EXIT_FATAL: i32 = 2;

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match reshelf_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(EXIT_FATAL);
        }
    };

    let args = Cli::parse();

    let code = match args.command {
        Some(Commands::Scan(scan_args)) => match run_scan(&config, &scan_args) {
            Ok(()) => 0,
            Err(err) => {
                error!("Error: {:#}", err);
                EXIT_FATAL
            }
        },
        Some(Commands::Apply(apply_args)) => match run_apply(&config, &apply_args) {
            Ok(report) if report.has_problems() => EXIT_PROBLEMS,
            Ok(_) => 0,
            Err(err) => {
                error!("Error: {:#}", err);
                EXIT_FATAL
            }
        },
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            0
        }
        None => {
            let _ = Cli::command().print_long_help();
            0
        }
    };

    // Flush the non-blocking file writer before exiting.
    drop(_guard);
    process::exit(code);
}

fn run_scan(config: &AppConfig, args: &ScanArgs) -> anyhow::Result<()> {
    let engine = RelocationEngine::new(config.clone());
    let catalog = engine.scan(&args.root, &CliReporter::new())?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            catalog.to_json(BufWriter::new(file))?;
            info!("Catalog of {} files written to {}", catalog.len(), path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            catalog.to_json(&mut out)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn run_apply(config: &AppConfig, args: &ApplyArgs) -> anyhow::Result<RunReport> {
    let engine = RelocationEngine::new(config.clone())
        .with_dry_run(args.dry_run)
        .with_verify(args.verify || config.verify_after_move)
        .with_catalog_file(args.catalog.clone());
    let reporter = CliReporter::new();

    let report = engine.run(&args.source_root, &args.dest_root, &args.mapping, &reporter)?;

    info!(
        "Catalog: {}, Resolve: {}, Execute: {}, Verify: {}",
        format!("{:.2}s", report.scan_duration.as_secs_f64()).green(),
        format!("{:.2}s", report.resolve_duration.as_secs_f64()).green(),
        format!("{:.2}s", report.execute_duration.as_secs_f64()).green(),
        format!("{:.2}s", report.verify_duration.as_secs_f64()).green(),
    );
    info!(
        "{} moved, {} skipped, {} failed ({} collisions resolved)",
        format!("{}", report.summary.moved).green(),
        format!("{}", report.summary.skipped).yellow(),
        format!("{}", report.summary.failed).red(),
        format!("{}", report.collisions).cyan(),
    );

    if report.summary.has_failures() {
        eprintln!("{}", "Failed items:".red().bold());
        for failure in report.summary.failures() {
            eprintln!(
                "  [{}] {} -> {}: {}",
                failure.id,
                failure.source_path.display(),
                failure.destination.display(),
                failure.detail.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if let Some(audit) = &report.audit {
        info!(
            "{} moved, {} renamed, {} moved and renamed",
            audit.moved, audit.renamed, audit.moved_renamed
        );
        for id in audit.missing.iter().chain(&audit.mismatched) {
            eprintln!("  {} file id {} is missing or altered", "✗".red(), id);
        }
    }

    if let Some(path) = &args.report {
        let file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let document = serde_json::json!({
            "dry_run": args.dry_run,
            "summary": report.summary,
            "audit": report.audit,
        });
        serde_json::to_writer_pretty(BufWriter::new(file), &document)?;
        info!("Run report written to {}", path.display());
    }

    Ok(report)
}
