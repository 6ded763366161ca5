//! Command-line parsing for the RPPS portfolio reporter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fetch/aggregation code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::QueryOverrides;
use crate::data::cadprev::DEFAULT_ENDPOINT;
use crate::domain::PeriodScheme;

pub mod picker;

pub const DEFAULT_DATA_DIR: &str = "data/privado";
pub const DEFAULT_LOG_FILE: &str = "logs/consumir_api.log";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "carteira", version, about = "RPPS investment portfolio reporter (CADPREV DAIR)")]
pub struct Cli {
    /// Append log lines to this file.
    #[arg(long, global = true, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch, aggregate and save the monthly summary, then print the results.
    Run(RunArgs),
    /// Launch the interactive dashboard.
    ///
    /// Uses the same pipeline as `carteira run`, rendered with Ratatui.
    Dashboard(RunArgs),
    /// Print a previously saved monthly summary.
    Show(ShowArgs),
}

/// Query and pipeline options shared by `run` and `dashboard`.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// CNPJ of the entity (overrides CNPJ_ENTIDADE).
    #[arg(long)]
    pub cnpj: Option<String>,

    /// State code (overrides UF_ENTIDADE).
    #[arg(long)]
    pub uf: Option<String>,

    /// Reference year (overrides ANO_CONSULTA).
    #[arg(long)]
    pub ano: Option<String>,

    /// API endpoint.
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// How `dt_mes_bimestre` codes are read.
    #[arg(long, value_enum, default_value_t = PeriodScheme::Monthly)]
    pub period_scheme: PeriodScheme,

    /// Summary CSV path [default: data/privado/investimentos_<ano>_por_mes.csv].
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Also export the per-segment table to CSV.
    #[arg(long)]
    pub export_segments: Option<PathBuf>,

    /// Also export the whole run (summaries, correlation, asset counts) to JSON.
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Directory where the dashboard's download action writes files.
    #[arg(long, default_value = ".")]
    pub download_dir: PathBuf,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 16)]
    pub height: usize,
}

impl RunArgs {
    pub fn query_overrides(&self) -> QueryOverrides {
        QueryOverrides {
            entity_id: self.cnpj.clone(),
            region: self.uf.clone(),
            year: self.ano.clone(),
        }
    }
}

/// Options for printing a saved summary.
#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Summary CSV written by `carteira run` (prompted for when omitted).
    #[arg(long, value_name = "CSV")]
    pub summary: Option<PathBuf>,

    /// Where to look for saved summaries when prompting.
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 16)]
    pub height: usize,
}

/// Default artifact path for a given year.
pub fn default_output_path(year: i32) -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR).join(format!("investimentos_{year}{}", picker::SUMMARY_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_args_parse_overrides() {
        let cli = Cli::parse_from([
            "carteira",
            "run",
            "--cnpj",
            "123",
            "--uf",
            "RJ",
            "--ano",
            "2025",
            "--period-scheme",
            "bimester",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.period_scheme, PeriodScheme::Bimester);
        let o = args.query_overrides();
        assert_eq!(o.entity_id.as_deref(), Some("123"));
        assert_eq!(o.year.as_deref(), Some("2025"));
        assert_eq!(cli.log_file, PathBuf::from(DEFAULT_LOG_FILE));
    }

    #[test]
    fn default_output_follows_year() {
        assert_eq!(
            default_output_path(2025),
            PathBuf::from("data/privado/investimentos_2025_por_mes.csv")
        );
    }
}
