//! fragsrc - ring-buffer fragment source for event building
//!
//! # Usage
//!
//! ```bash
//! # Drain a ring into event-builder fragments on stdout (default)
//! fragsrc serve --ring tcp://daq-host:30000 --ids 1,2 --timestamp-extractor payload-word
//!
//! # Pass raw records through to another consumer
//! fragsrc relay --ring tcp://daq-host:30000 --output tcp://evb-host:4000
//!
//! # Validate a configuration file
//! fragsrc check --config configs/fragsrc.toml
//! ```

mod cmd;

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fragsrc_config::{Config, LogFormat};

/// fragsrc - ring-buffer fragment source for event building
#[derive(Parser, Debug)]
#[command(name = "fragsrc")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    // Global args that apply to serve when no subcommand given
    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drain a ring into event-builder fragments (default)
    Serve(cmd::serve::ServeArgs),

    /// Pass raw records through to an output sink across the bounded queue
    Relay(cmd::relay::RelayArgs),

    /// Load and validate the configuration, print the resolved settings
    Check(cmd::check::CheckArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Serve(mut args)) => {
            if args.config.is_none() && cli.config.is_some() {
                args.config = cli.config;
            }
            let (level, format) = resolve_logging(cli.log_level.as_deref(), args.config.as_deref());
            init_logging(&level, format)?;
            cmd::serve::run(args).await
        }
        Some(Command::Relay(mut args)) => {
            if args.config.is_none() && cli.config.is_some() {
                args.config = cli.config;
            }
            let (level, format) = resolve_logging(cli.log_level.as_deref(), args.config.as_deref());
            init_logging(&level, format)?;
            cmd::relay::run(args).await
        }
        Some(Command::Check(mut args)) => {
            if args.config.is_none() && cli.config.is_some() {
                args.config = cli.config;
            }
            // Check reports on stdout; no logging needed.
            cmd::check::run(args).await
        }
        // No subcommand = drain the ring (default behavior)
        None => {
            let (level, format) = resolve_logging(cli.log_level.as_deref(), cli.config.as_deref());
            init_logging(&level, format)?;
            let args = cmd::serve::ServeArgs {
                config: cli.config,
                ..Default::default()
            };
            cmd::serve::run(args).await
        }
    }
}

/// Resolve log settings: CLI flag > config file > default "info"/console
fn resolve_logging(cli_level: Option<&str>, config_path: Option<&Path>) -> (String, LogFormat) {
    let mut level = "info".to_string();
    let mut format = LogFormat::Console;

    if let Some(path) = config_path
        && path.exists()
        && let Ok(config) = Config::read_file(path)
    {
        level = config.log.level.as_str().to_string();
        format = config.log.format;
    }

    if let Some(cli) = cli_level {
        level = cli.to_string();
    }

    (level, format)
}

/// Initialize the tracing subscriber for logging
///
/// Logs always go to stderr: in relay mode (and serve's default wiring)
/// stdout is the data sink itself.
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Console => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    Ok(())
}
