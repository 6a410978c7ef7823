//! `autoupdate` binary entry point.

use std::process::ExitCode;

use autoupdate_cli::{Cli, LogLevel};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let silent = cli.silent;
    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !silent {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins, then `AUTOUPDATE_LOG_LEVEL`, then `--log-level`.
/// Silent mode caps output at errors.
fn init_logging(cli: &Cli) {
    let log_level = if cli.silent {
        LogLevel::Error
    } else if let Some(level) = std::env::var("AUTOUPDATE_LOG_LEVEL")
        .ok()
        .and_then(|value| LogLevel::from_str_loose(&value))
    {
        level
    } else {
        cli.log_level
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_filter_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
