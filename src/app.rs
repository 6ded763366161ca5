//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - sets up logging
//! - resolves the query and fetches CADPREV data
//! - aggregates and persists the monthly summary
//! - prints reports/plots and writes optional exports

use clap::Parser;
use tracing::{error, info};

use crate::cli::{Command, RunArgs, ShowArgs};
use crate::data::CadprevClient;
use crate::error::AppError;
use crate::logging::LogSinks;

pub mod pipeline;

/// Entry point for the `carteira` binary.
pub fn run() -> Result<(), AppError> {
    // `carteira` and `carteira --cnpj ...` behave like `carteira run ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    let sinks = match cli.command {
        Command::Dashboard(_) => LogSinks::FileOnly,
        Command::Run(_) | Command::Show(_) => LogSinks::FileAndStderr,
    };
    crate::logging::init(&cli.log_file, sinks)?;

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Dashboard(args) => handle_dashboard(args),
        Command::Show(args) => handle_show(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    info!("Starting investment portfolio run");

    let query = crate::config::resolve_query(&args.query_overrides()).inspect_err(|e| error!("{e}"))?;
    let client = CadprevClient::new(&args.endpoint).inspect_err(|e| error!("{e}"))?;
    let run = pipeline::run_fetch(&client, &query, args.period_scheme)?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| crate::cli::default_output_path(query.year));
    pipeline::persist(&run, &output).inspect_err(|e| error!("{e}"))?;

    println!("{}", crate::report::format_run_header(&run.query, run.rows.len()));
    println!("{}", crate::report::format_monthly_summary(&run.monthly));
    println!("{}", crate::report::format_segment_summary(&run.segments));
    println!("{}", crate::report::format_asset_counts(&run.asset_counts));
    println!("{}", crate::report::format_correlation(run.correlation.as_ref()));

    if !args.no_plot {
        println!("{}", crate::plot::render_monthly_plot(&run.monthly, args.width, args.height));
    }
    println!("Summary saved to {}", output.display());

    // Optional exports.
    if let Some(path) = &args.export_segments {
        crate::io::export::write_segments_csv(path, &run.segments)?;
        info!("Segment table exported to {}", path.display());
    }
    if let Some(path) = &args.export_json {
        let report = crate::io::export::RunReport {
            tool: "carteira",
            generated_at: chrono::Local::now().to_rfc3339(),
            query: &run.query,
            monthly: &run.monthly,
            segments: &run.segments,
            correlation: run.correlation.as_ref(),
            asset_counts: &run.asset_counts,
        };
        crate::io::export::write_report_json(path, &report)?;
        info!("Run report exported to {}", path.display());
    }

    Ok(())
}

fn handle_dashboard(args: RunArgs) -> Result<(), AppError> {
    crate::tui::run(args)
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let path = match &args.summary {
        Some(path) => crate::cli::picker::validate_csv_path(path)?,
        None => crate::cli::picker::prompt_for_summary_path(&args.data_dir)?,
    };
    let summary = crate::io::export::read_summary_csv(&path)?;

    println!("{}", path.display());
    println!("{}", crate::report::format_monthly_summary(&summary));
    println!("{}", crate::plot::render_monthly_plot(&summary, args.width, args.height));
    Ok(())
}

/// Rewrite argv so `carteira` defaults to `carteira run`.
///
/// Rules:
/// - `carteira`                        -> `carteira run`
/// - `carteira --cnpj X ...`           -> `carteira run --cnpj X ...`
/// - `carteira --help/--version/-h`    -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "dashboard" | "show");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "run flags".
    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    argv
}
