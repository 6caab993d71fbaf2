//! crashwatch CLI entry point.
//!
//! `crashwatch <CONFIG> <PROGRAM> [ARGS]...` runs `PROGRAM` under
//! supervision and exits with its exit code.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crashwatch::config::load_config;
use crashwatch::report::Reporter;
use crashwatch::supervisor::{self, ChildCommand};

/// crashwatch: supervise a process and alert when it crashes.
#[derive(Parser, Debug)]
#[command(name = "crashwatch", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    config: PathBuf,

    /// Program to run.
    program: OsString,

    /// Arguments passed to the program verbatim.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<OsString>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let exit_code = run(cli).await?;
    std::process::exit(exit_code);
}

/// Load config, start logging, and supervise the child.
async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    // Keep the guard alive until the child has exited so file logs flush.
    let _logging_guard = match &config.logging.dir {
        Some(dir) => Some(crashwatch::logging::init_production(dir)?),
        None => {
            crashwatch::logging::init_cli();
            None
        }
    };

    info!(
        config = %cli.config.display(),
        record_file = %config.report.record_file.display(),
        channels = config.channels.len(),
        "crashwatch starting"
    );

    let reporter = Reporter::from_config(&config);
    let command = ChildCommand::new(cli.program, cli.args);
    let run = supervisor::supervise(&command, &reporter).await?;

    Ok(run.exit_code)
}
