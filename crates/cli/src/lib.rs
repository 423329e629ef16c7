pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fieldops_core::config::LoadOptions;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "fieldops",
    about = "Fieldops operator CLI",
    long_about = "Apply migrations, inspect configuration, import field reports, and run payment polls.",
    after_help = "Examples:\n  fieldops doctor --json\n  fieldops import submissions.csv\n  fieldops poll"
)]
pub struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Config file to load (must exist)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, integration readiness, DB connectivity, and schema")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Reconcile a CSV export of field reports into customers and jobs")]
    Import {
        #[arg(value_name = "CSV")]
        path: PathBuf,
    },
    #[command(about = "Run one billing poll cycle and record it as a sync run")]
    Poll,
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config.clone(),
            ..LoadOptions::default()
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match &cli.command {
        Command::Migrate => commands::migrate::run(&options),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(&options, *json) }
        }
        Command::Import { path } => {
            init_logging();
            commands::import::run(&options, path)
        }
        Command::Poll => {
            init_logging();
            commands::poll::run(&options)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Diagnostics go to stderr so stdout stays a single JSON envelope.
fn init_logging() {
    let filter = EnvFilter::try_from_env("FIELDOPS_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
