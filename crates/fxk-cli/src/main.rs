//! fxk CLI - command-line client for the FXiaoKe CRM open API
//!
//! Entry point: parses arguments, sets up logging, opens the profile store
//! and dispatches to the command handlers. Failures map to exit codes by
//! error kind.

mod cli;
mod error;
mod handlers;
mod logging;
mod output;

use cli::{Cli, Commands};
use colored::control;
use error::Result;
use fxk_core::{CorruptConfigPolicy, ProfileStore};
use logging::{timing::Timer, LoggingConfig};
use output::OutputWriter;
use std::process;
use tracing::instrument;
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    control::set_override(cli.use_color());

    let log_guard = match init_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::debug!(error = %e, exit_code = e.exit_code(), "Command failed");
            eprintln!("{}", error::format_error(&e, control::SHOULD_COLORIZE.should_colorize()));
            e.exit_code()
        }
    };

    // flush file logs before exiting
    drop(log_guard);
    process::exit(exit_code);
}

/// Main application logic
#[instrument(skip(cli), fields(command = ?cli.command))]
async fn run(cli: Cli) -> Result<()> {
    let _timer = Timer::new("cli_execution");

    if let Commands::Completions(args) = cli.command {
        return handlers::handle_completions(args);
    }

    let store = open_store(&cli)?;
    let mut output = OutputWriter::new(cli.output, cli.use_color(), cli.quiet);

    tracing::info!(
        config = %store.path().display(),
        output = ?output.format(),
        verbosity = cli.verbosity_level(),
        "Executing command"
    );

    match cli.command {
        Commands::Config(args) => handlers::handle_config(args, &store, &mut output),
        Commands::Auth(args) => handlers::handle_auth(args, &store, &mut output).await,
        Commands::Object(args) => handlers::handle_object(args, &store, &mut output).await,
        Commands::Completions(_) => Ok(()),
    }
}

/// Profile store from `--config`/`FXK_CONFIG` or the default location
fn open_store(cli: &Cli) -> Result<ProfileStore> {
    let store = match &cli.config {
        Some(path) => ProfileStore::new(path),
        None => ProfileStore::open_default()?,
    };
    let policy = if cli.strict_config {
        CorruptConfigPolicy::Fail
    } else {
        CorruptConfigPolicy::UseDefaults
    };
    Ok(store.with_corrupt_policy(policy))
}

/// Initialize the logging system
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let mut logging_config = LoggingConfig::from_verbosity(cli.verbosity_level());
    logging_config.merge_with_env();

    if cli.quiet {
        logging_config.level = "error".to_string();
        logging_config.console = false;
    }

    logging::init_logging(logging_config)
}
