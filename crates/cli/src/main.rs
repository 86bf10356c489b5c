// sanctrack - sanctions-list lifecycle tracking from the command line

mod exit_codes;
mod inspect;
mod logging;
mod pipeline;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use exit_codes::{exit_code_for_io, exit_code_for_recon, EXIT_SUCCESS};
use sanctrack_io::IoError;
use sanctrack_recon::ReconError;

#[derive(Parser)]
#[command(name = "sanctrack")]
#[command(about = "Track sanctions-list entries per country across monthly snapshots")]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only warnings and errors on stderr
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the tracked list from every merged snapshot file
    #[command(after_help = "\
Examples:
  sanctrack history
  sanctrack history --data-dir data --panel
  sanctrack history --config monthly.toml --json")]
    History {
        /// Run configuration (TOML)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Directory holding ofac_full_<date>.csv files
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Tracked list to write
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Also write the country panel
        #[arg(long)]
        panel: bool,

        /// Panel file (implies --panel)
        #[arg(long)]
        panel_out: Option<PathBuf>,

        /// Accept snapshots with no entries
        #[arg(long)]
        allow_empty: bool,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Fold one raw snapshot directory into the tracked list
    #[command(after_help = "\
Examples:
  sanctrack update downloads/2024-11
  sanctrack update downloads/2024-11 --date 2024-11-30 --panel
  sanctrack update downloads/2024-11 --strict --json")]
    Update {
        /// Directory with sdn.csv, add.csv, alt.csv, sdn_comments.csv and the cons_* files
        snapshot_dir: PathBuf,

        /// Report date of the snapshot (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        /// Run configuration (TOML)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Tracked list to read and rewrite
        #[arg(long, short = 't')]
        tracked: Option<PathBuf>,

        /// Also rebuild the country panel
        #[arg(long)]
        panel: bool,

        /// Panel file (implies --panel)
        #[arg(long)]
        panel_out: Option<PathBuf>,

        /// Accept a snapshot with no entries (every open lifecycle is removed)
        #[arg(long)]
        allow_empty: bool,

        /// Fail without writing if any source row was rejected
        #[arg(long)]
        strict: bool,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Rebuild the country panel from a tracked list
    #[command(after_help = "\
Examples:
  sanctrack panel
  sanctrack panel --tracked data/ofac_list.csv --out panel.csv")]
    Panel {
        /// Run configuration (TOML)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Tracked list to read
        #[arg(long, short = 't')]
        tracked: Option<PathBuf>,

        /// Panel file to write
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Summarize a tracked list
    Inspect {
        /// Run configuration (TOML)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Tracked list to read
        #[arg(long, short = 't')]
        tracked: Option<PathBuf>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse and validate a run configuration without running
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::History {
            config,
            data_dir,
            out,
            panel,
            panel_out,
            allow_empty,
            json,
        } => pipeline::cmd_history(pipeline::HistoryArgs {
            config,
            data_dir,
            out,
            panel: panel || panel_out.is_some(),
            panel_out,
            allow_empty,
            json,
        }),
        Commands::Update {
            snapshot_dir,
            date,
            config,
            tracked,
            panel,
            panel_out,
            allow_empty,
            strict,
            json,
        } => pipeline::cmd_update(pipeline::UpdateArgs {
            snapshot_dir,
            date,
            config,
            tracked,
            panel: panel || panel_out.is_some(),
            panel_out,
            allow_empty,
            strict,
            json,
        }),
        Commands::Panel {
            config,
            tracked,
            out,
            json,
        } => pipeline::cmd_panel(config, tracked, out, json),
        Commands::Inspect {
            config,
            tracked,
            json,
        } => inspect::cmd_inspect(config, tracked, json),
        Commands::Validate { config } => inspect::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn recon_hint(err: &ReconError) -> Option<&'static str> {
    match err {
        ReconError::EmptySnapshot { .. } => {
            Some("re-run with --allow-empty if the list really is empty")
        }
        ReconError::StaleSnapshot { .. } | ReconError::DuplicateReportDate { .. } => {
            Some("check --date; each update must be newer than the tracked list")
        }
        ReconError::EmptyHistory => Some("no merged snapshot files matched the history pattern"),
        _ => None,
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = recon_hint(&err).map(str::to_string);
        Self {
            code: exit_code_for_recon(&err),
            message: err.to_string(),
            hint,
        }
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Recon(inner) => inner.into(),
            other => Self::new(exit_code_for_io(&other), other.to_string()),
        }
    }
}
