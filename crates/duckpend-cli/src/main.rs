//! duckpend CLI - load newline-delimited JSON into DuckDB through a
//! disk-staged appender.

use anyhow::Result;
use clap::{Parser, Subcommand};
use duckpend_core::config::LogFormat;
use duckpend_core::Config;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit codes for CLI operations.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// Configuration error (invalid config file, bad threshold)
    ConfigError = 1,
    /// Target table missing or rejected by DuckDB
    TargetError = 2,
    /// Staging buffer could not be created, written or drained
    StagingError = 3,
    /// Malformed input line
    InputError = 4,
    /// General runtime error
    RuntimeError = 10,
}

impl ExitCode {
    /// Map an error to an exit code, preferring the core error kind when
    /// one is in the chain.
    fn from_error(error: &anyhow::Error) -> Self {
        use duckpend_core::Error;

        for cause in error.chain() {
            if let Some(err) = cause.downcast_ref::<Error>() {
                return match err {
                    Error::Config(_) => ExitCode::ConfigError,
                    Error::InvalidTarget(_)
                    | Error::Target(_)
                    | Error::AppendRejected { .. }
                    | Error::RowArity { .. } => ExitCode::TargetError,
                    Error::Staging(_) | Error::ReleasedBuffer => ExitCode::StagingError,
                    Error::Serialization(_) => ExitCode::InputError,
                    Error::ClosedSession | Error::Io(_) => ExitCode::RuntimeError,
                };
            }
        }

        let error_str = error.to_string().to_lowercase();
        if error_str.contains("config") || error_str.contains("toml") {
            ExitCode::ConfigError
        } else if error_str.contains("duckdb") || error_str.contains("table") {
            ExitCode::TargetError
        } else if error_str.contains("json") || error_str.contains("line") {
            ExitCode::InputError
        } else {
            ExitCode::RuntimeError
        }
    }
}

mod commands;

#[derive(Parser)]
#[command(name = "duckpend")]
#[command(about = "Buffered bulk loading into DuckDB", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Load newline-delimited JSON rows into a table
    Load {
        /// DuckDB database file
        #[arg(long)]
        db: PathBuf,

        /// Target table
        #[arg(long)]
        table: String,

        /// Target schema
        #[arg(long, default_value = "main")]
        schema: String,

        /// Override the flush threshold
        #[arg(long)]
        threshold: Option<usize>,

        /// Input file (stdin when omitted)
        input: Option<PathBuf>,
    },

    /// Show the columns of a table
    Describe {
        /// DuckDB database file
        #[arg(long)]
        db: PathBuf,

        /// Target table
        #[arg(long)]
        table: String,

        /// Target schema
        #[arg(long, default_value = "main")]
        schema: String,
    },

    /// Validate configuration file
    Validate,
}

fn main() {
    let exit_code = run_cli();
    std::process::exit(exit_code as i32);
}

/// Main CLI execution logic with proper error handling.
fn run_cli() -> ExitCode {
    let cli = Cli::parse();

    // Logging settings come from the config file when it parses; otherwise defaults
    let logging = cli
        .config
        .as_ref()
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| toml::from_str::<Config>(&content).ok())
        .map(|config| config.logging)
        .unwrap_or_default();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new(logging.log_level.as_filter()),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr; stdout carries command output
    match logging.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }

    match execute_command(cli) {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Command failed");
            ExitCode::from_error(&e)
        }
    }
}

/// Execute the CLI command.
fn execute_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Load {
            db,
            table,
            schema,
            threshold,
            input,
        } => {
            let config = load_config_or_default(&cli.config)?;
            commands::load::run(
                &config,
                commands::load::LoadOptions {
                    db,
                    schema,
                    table,
                    threshold,
                    input,
                },
            )?;
        }

        Commands::Describe { db, table, schema } => {
            commands::describe::run(&db, &schema, &table)?;
        }

        Commands::Validate => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from("config.toml"));
            // from_file validates
            Config::from_file(&path)?;
            println!("Configuration is valid");
        }
    }

    Ok(())
}

fn load_config_or_default(path: &Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::from_file(path)?),
        None => Ok(Config::default()),
    }
}
